//! Order types for the fulfillment system.
//!
//! This module defines the central `Order` entity, the tagged
//! `FulfillmentState` that tracks progress through the 13-step checklist,
//! and the coarser `OrderStatus` vocabulary projected from it for
//! dashboards and the API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::utils::order_number;

/// Number of steps in the fulfillment checklist.
pub const STEP_COUNT: u8 = 13;

/// A step number within the fulfillment checklist, always in `[1, 13]`.
///
/// The newtype makes out-of-range step numbers unrepresentable; storage,
/// events, and the API all move `StepNumber` values rather than raw
/// integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StepNumber(u8);

impl StepNumber {
	/// The first step of a freshly claimed order.
	pub const FIRST: StepNumber = StepNumber(1);
	/// The terminal handoff step.
	pub const LAST: StepNumber = StepNumber(STEP_COUNT);

	/// Creates a step number, rejecting values outside `[1, 13]`.
	pub fn new(n: u8) -> Option<Self> {
		(1..=STEP_COUNT).contains(&n).then_some(StepNumber(n))
	}

	/// Returns the raw step value.
	pub fn get(&self) -> u8 {
		self.0
	}

	/// Returns the following step, or `None` at the terminal step.
	pub fn next(&self) -> Option<Self> {
		StepNumber::new(self.0 + 1)
	}

	/// Whether this is the terminal step of the checklist.
	pub fn is_last(&self) -> bool {
		self.0 == STEP_COUNT
	}

	/// Iterates all step numbers in checklist order.
	pub fn all() -> impl Iterator<Item = Self> {
		(1..=STEP_COUNT).map(StepNumber)
	}
}

impl TryFrom<u8> for StepNumber {
	type Error = String;

	fn try_from(n: u8) -> Result<Self, Self::Error> {
		StepNumber::new(n).ok_or_else(|| format!("step number {} out of range 1..=13", n))
	}
}

impl From<StepNumber> for u8 {
	fn from(step: StepNumber) -> u8 {
		step.0
	}
}

impl fmt::Display for StepNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// How the customer's laundry is exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupType {
	/// Dropped in and collected from a locker.
	Locker,
	/// Picked up at and delivered to the customer's address.
	PickupDelivery,
}

/// The service the customer ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
	WashFold,
	DelicatesAirdry,
	WashHangDry,
	Express,
}

/// A content-addressed reference to a stored step-evidence photo.
///
/// The digest is the SHA3-256 of the image bytes, so re-uploading the
/// same photo after a failed step write resolves to the same reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
	/// Hex-encoded SHA3-256 digest of the image bytes.
	pub digest: String,
	/// Size of the stored image in bytes.
	pub size_bytes: u64,
}

/// Fulfillment progress as a single tagged state.
///
/// Progress used to be split across a status string and a separate step
/// counter that could disagree; collapsing them into one variant type
/// makes the pair inexpressible. `OrderStatus` is derived from this, never
/// stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum FulfillmentState {
	/// Created by the customer, payment not yet confirmed.
	Placed,
	/// Listed in the claim pool, visible to operators.
	Unclaimed,
	/// Owned by an operator, working through the checklist.
	Claimed { step: StepNumber },
	/// All 13 steps recorded, terminal.
	Completed,
	/// Cancelled outside the step engine, terminal.
	Cancelled,
}

impl FulfillmentState {
	/// Returns the step the operator is currently on, if claimed.
	pub fn current_step(&self) -> Option<StepNumber> {
		match self {
			FulfillmentState::Claimed { step } => Some(*step),
			_ => None,
		}
	}

	/// Whether the order can still be claimed from the pool.
	pub fn is_claimable(&self) -> bool {
		matches!(self, FulfillmentState::Placed | FulfillmentState::Unclaimed)
	}

	/// Whether this state admits no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, FulfillmentState::Completed | FulfillmentState::Cancelled)
	}

	/// Whether the order counts against its operator's concurrent cap.
	pub fn is_active(&self) -> bool {
		matches!(self, FulfillmentState::Claimed { .. })
	}

	/// Projects the state onto the coarse dashboard status vocabulary.
	///
	/// The projection is total and canonical: steps 1 through 13 map onto
	/// the customer-facing phase the operator is working in. `Washed`
	/// remains in the vocabulary for API compatibility but is not produced
	/// by this projection.
	pub fn status(&self) -> OrderStatus {
		match self {
			FulfillmentState::Placed => OrderStatus::Placed,
			FulfillmentState::Unclaimed => OrderStatus::Unclaimed,
			FulfillmentState::Claimed { step } => match step.get() {
				1 => OrderStatus::Claimed,
				2..=6 => OrderStatus::InProgress,
				7 => OrderStatus::PickedUp,
				8 => OrderStatus::Washing,
				9 => OrderStatus::Drying,
				10 | 11 => OrderStatus::Folded,
				12 => OrderStatus::Delivering,
				_ => OrderStatus::Returned,
			},
			FulfillmentState::Completed => OrderStatus::Completed,
			FulfillmentState::Cancelled => OrderStatus::Cancelled,
		}
	}
}

/// Coarse order status used for dashboard grouping and API responses.
///
/// This is a projection of `FulfillmentState`; it carries no transition
/// logic of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Placed,
	Unclaimed,
	Claimed,
	InProgress,
	PickedUp,
	Washing,
	Washed,
	Drying,
	Folded,
	Delivering,
	Returned,
	Completed,
	Cancelled,
}

impl OrderStatus {
	/// Returns the snake_case wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Placed => "placed",
			OrderStatus::Unclaimed => "unclaimed",
			OrderStatus::Claimed => "claimed",
			OrderStatus::InProgress => "in_progress",
			OrderStatus::PickedUp => "picked_up",
			OrderStatus::Washing => "washing",
			OrderStatus::Washed => "washed",
			OrderStatus::Drying => "drying",
			OrderStatus::Folded => "folded",
			OrderStatus::Delivering => "delivering",
			OrderStatus::Returned => "returned",
			OrderStatus::Completed => "completed",
			OrderStatus::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single customer laundry order tracked through pickup, processing,
/// and delivery.
///
/// Orders are created by the intake flow, mutated exclusively by the
/// claiming operator through the step engine, and terminated at step 13
/// or by external cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// The customer who placed the order. Immutable after creation.
	pub customer_id: String,
	/// How the laundry is exchanged with the customer.
	pub pickup_type: PickupType,
	/// The service the customer ordered.
	pub service_type: ServiceType,
	/// Whether express turnaround was requested.
	pub is_express: bool,
	/// The operator fulfilling this order. Set exactly once by a claim.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub washer_id: Option<String>,
	/// Fulfillment progress.
	pub state: FulfillmentState,
	/// Evidence photos keyed by the step that recorded them. Append-only.
	#[serde(default)]
	pub step_photos: BTreeMap<u8, PhotoRef>,
	/// Bag count confirmed at pickup.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bag_count: Option<u32>,
	/// Total charged to the customer, in cents.
	pub total_amount_cents: u64,
	/// Discount applied at creation, in cents.
	pub discount_amount_cents: u64,
	/// Marketplace share of the post-discount total, in cents.
	pub business_cut_cents: u64,
	/// Operator payout, in cents.
	pub operator_payout_cents: u64,
	/// Timestamp when this order was created (unix seconds).
	pub created_at: u64,
	/// Timestamp when this order was last updated (unix seconds).
	pub updated_at: u64,
	/// Timestamp when this order was claimed. Set exactly once.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub claimed_at: Option<u64>,
	/// Timestamp when this order completed. Set exactly once.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<u64>,
	/// Where the laundry is collected.
	pub pickup_address: String,
	/// Where the laundry is returned; pickup address when absent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_address: Option<String>,
	/// Service-area zip code.
	pub zip_code: String,
	/// Locker identifier for locker orders.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub locker_id: Option<String>,
}

impl Order {
	/// Returns the coarse status projected from the fulfillment state.
	pub fn status(&self) -> OrderStatus {
		self.state.status()
	}

	/// Returns the step the operator is currently on, if claimed.
	pub fn current_step(&self) -> Option<StepNumber> {
		self.state.current_step()
	}

	/// The human-readable order number shown to customers.
	pub fn order_number(&self) -> String {
		order_number(&self.id)
	}

	/// The address the laundry is returned to.
	///
	/// Falls back to the pickup address when no separate delivery address
	/// was provided.
	pub fn delivery_target(&self) -> &str {
		self.delivery_address.as_deref().unwrap_or(&self.pickup_address)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn claimed(step: u8) -> FulfillmentState {
		FulfillmentState::Claimed {
			step: StepNumber::new(step).unwrap(),
		}
	}

	#[test]
	fn test_step_number_bounds() {
		assert!(StepNumber::new(0).is_none());
		assert!(StepNumber::new(14).is_none());
		assert_eq!(StepNumber::new(1), Some(StepNumber::FIRST));
		assert_eq!(StepNumber::new(13), Some(StepNumber::LAST));
		assert_eq!(StepNumber::LAST.next(), None);
		assert_eq!(StepNumber::FIRST.next(), StepNumber::new(2));
		assert_eq!(StepNumber::all().count(), 13);
	}

	#[test]
	fn test_status_projection_table() {
		assert_eq!(FulfillmentState::Placed.status(), OrderStatus::Placed);
		assert_eq!(FulfillmentState::Unclaimed.status(), OrderStatus::Unclaimed);
		assert_eq!(claimed(1).status(), OrderStatus::Claimed);
		for step in 2..=6 {
			assert_eq!(claimed(step).status(), OrderStatus::InProgress);
		}
		assert_eq!(claimed(7).status(), OrderStatus::PickedUp);
		assert_eq!(claimed(8).status(), OrderStatus::Washing);
		assert_eq!(claimed(9).status(), OrderStatus::Drying);
		assert_eq!(claimed(10).status(), OrderStatus::Folded);
		assert_eq!(claimed(11).status(), OrderStatus::Folded);
		assert_eq!(claimed(12).status(), OrderStatus::Delivering);
		assert_eq!(claimed(13).status(), OrderStatus::Returned);
		assert_eq!(FulfillmentState::Completed.status(), OrderStatus::Completed);
		assert_eq!(FulfillmentState::Cancelled.status(), OrderStatus::Cancelled);
	}

	#[test]
	fn test_state_predicates() {
		assert!(FulfillmentState::Placed.is_claimable());
		assert!(FulfillmentState::Unclaimed.is_claimable());
		assert!(!claimed(3).is_claimable());
		assert!(claimed(3).is_active());
		assert!(!FulfillmentState::Completed.is_active());
		assert!(FulfillmentState::Completed.is_terminal());
		assert!(FulfillmentState::Cancelled.is_terminal());
		assert!(!claimed(13).is_terminal());
	}
}
