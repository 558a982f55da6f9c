//! The milestone trigger map.
//!
//! Translates step transitions into customer-facing notifications. Only a
//! handful of transitions are announced; everything else is silent so
//! customers see phase changes, not checklist minutiae.

use tumble_types::{FulfillmentState, NotificationStatus};

/// Returns the milestone announced by arriving in `state_after`, if any.
///
/// The mapping on entered steps is 7 → picked_up, 8 → washing,
/// 9 → drying, 10 → folded, 12 → delivered. Entering the terminal step 13
/// is deliberately silent: the `completed` milestone belongs to the
/// terminal completion itself (the handoff photo being recorded), so it
/// fires exactly once and never before the handoff happened.
pub fn milestone_for_transition(state_after: &FulfillmentState) -> Option<NotificationStatus> {
	match state_after {
		FulfillmentState::Completed => Some(NotificationStatus::Completed),
		FulfillmentState::Claimed { step } => match step.get() {
			7 => Some(NotificationStatus::PickedUp),
			8 => Some(NotificationStatus::Washing),
			9 => Some(NotificationStatus::Drying),
			10 => Some(NotificationStatus::Folded),
			12 => Some(NotificationStatus::Delivered),
			_ => None,
		},
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tumble_types::StepNumber;

	fn entered(step: u8) -> FulfillmentState {
		FulfillmentState::Claimed {
			step: StepNumber::new(step).unwrap(),
		}
	}

	#[test]
	fn test_mapped_transitions() {
		assert_eq!(
			milestone_for_transition(&entered(7)),
			Some(NotificationStatus::PickedUp)
		);
		assert_eq!(
			milestone_for_transition(&entered(8)),
			Some(NotificationStatus::Washing)
		);
		assert_eq!(
			milestone_for_transition(&entered(9)),
			Some(NotificationStatus::Drying)
		);
		assert_eq!(
			milestone_for_transition(&entered(10)),
			Some(NotificationStatus::Folded)
		);
		assert_eq!(
			milestone_for_transition(&entered(12)),
			Some(NotificationStatus::Delivered)
		);
		assert_eq!(
			milestone_for_transition(&FulfillmentState::Completed),
			Some(NotificationStatus::Completed)
		);
	}

	#[test]
	fn test_silent_transitions() {
		for step in [2, 3, 4, 5, 6, 11, 13] {
			assert_eq!(milestone_for_transition(&entered(step)), None, "step {}", step);
		}
		assert_eq!(milestone_for_transition(&FulfillmentState::Unclaimed), None);
		assert_eq!(milestone_for_transition(&FulfillmentState::Cancelled), None);
	}
}
