//! Workflow definition module for the Tumble fulfillment system.
//!
//! This module owns the canonical 13-step fulfillment checklist: the
//! per-step titles and instructions operators see, which steps are gated
//! on photo evidence or a bag count, and which steps show navigation to
//! the pickup or delivery address. The table here is the single source of
//! truth; the engine and the API both read it rather than hard-coding
//! step numbers.

pub mod evidence;
pub mod steps;

pub use evidence::{validate_evidence, StepEvidence};
pub use steps::{step, steps, NavigationTarget, StepDefinition};

use tumble_types::StepNumber;
use thiserror::Error;

/// Errors that can occur while validating step completions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
	/// A photo-gated step was submitted without a stored photo reference.
	#[error("Step {0} requires a photo")]
	PhotoRequired(StepNumber),
	/// A bag-count step was submitted without a count.
	#[error("Step {0} requires a bag count")]
	BagCountRequired(StepNumber),
	/// A bag count of zero was submitted.
	#[error("Bag count must be a positive integer")]
	InvalidBagCount,
	/// Evidence was attached to a step that does not take it.
	#[error("Step {0} does not accept the submitted evidence")]
	UnexpectedEvidence(StepNumber),
}
