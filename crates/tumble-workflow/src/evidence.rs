//! Evidence submitted with step completions.

use crate::{StepDefinition, WorkflowError};
use serde::{Deserialize, Serialize};
use tumble_types::PhotoRef;

/// What the operator attaches when completing a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepEvidence {
	/// No evidence; only valid for ungated steps.
	None,
	/// A stored photo reference for photo-gated steps.
	Photo { photo: PhotoRef },
	/// A positive bag count for the bag-count step.
	BagCount { count: u32 },
}

impl StepEvidence {
	/// Returns the photo reference, if this is photo evidence.
	pub fn photo(&self) -> Option<&PhotoRef> {
		match self {
			StepEvidence::Photo { photo } => Some(photo),
			_ => None,
		}
	}

	/// Returns the bag count, if this is bag-count evidence.
	pub fn bag_count(&self) -> Option<u32> {
		match self {
			StepEvidence::BagCount { count } => Some(*count),
			_ => None,
		}
	}
}

/// Validates submitted evidence against a step's requirements.
///
/// Gated steps must carry exactly the evidence they require; ungated
/// steps must carry none. A failed validation leaves the order untouched;
/// the engine only persists a transition after this check passes.
pub fn validate_evidence(
	def: &StepDefinition,
	evidence: &StepEvidence,
) -> Result<(), WorkflowError> {
	if def.requires_photo {
		return match evidence {
			StepEvidence::Photo { .. } => Ok(()),
			_ => Err(WorkflowError::PhotoRequired(def.number)),
		};
	}

	if def.requires_bag_count {
		return match evidence {
			StepEvidence::BagCount { count: 0 } => Err(WorkflowError::InvalidBagCount),
			StepEvidence::BagCount { .. } => Ok(()),
			_ => Err(WorkflowError::BagCountRequired(def.number)),
		};
	}

	match evidence {
		StepEvidence::None => Ok(()),
		_ => Err(WorkflowError::UnexpectedEvidence(def.number)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::steps::step;
	use tumble_types::StepNumber;

	fn photo() -> StepEvidence {
		StepEvidence::Photo {
			photo: PhotoRef {
				digest: "d1".into(),
				size_bytes: 4,
			},
		}
	}

	#[test]
	fn test_photo_gated_step() {
		let def = step(StepNumber::new(4).unwrap());
		assert_eq!(
			validate_evidence(def, &StepEvidence::None),
			Err(WorkflowError::PhotoRequired(def.number))
		);
		assert_eq!(
			validate_evidence(def, &StepEvidence::BagCount { count: 2 }),
			Err(WorkflowError::PhotoRequired(def.number))
		);
		assert_eq!(validate_evidence(def, &photo()), Ok(()));
	}

	#[test]
	fn test_bag_count_step() {
		let def = step(StepNumber::new(3).unwrap());
		assert_eq!(
			validate_evidence(def, &StepEvidence::None),
			Err(WorkflowError::BagCountRequired(def.number))
		);
		assert_eq!(
			validate_evidence(def, &StepEvidence::BagCount { count: 0 }),
			Err(WorkflowError::InvalidBagCount)
		);
		assert_eq!(
			validate_evidence(def, &StepEvidence::BagCount { count: 2 }),
			Ok(())
		);
	}

	#[test]
	fn test_ungated_step_rejects_stray_evidence() {
		let def = step(StepNumber::new(5).unwrap());
		assert_eq!(validate_evidence(def, &StepEvidence::None), Ok(()));
		assert_eq!(
			validate_evidence(def, &photo()),
			Err(WorkflowError::UnexpectedEvidence(def.number))
		);
	}
}
