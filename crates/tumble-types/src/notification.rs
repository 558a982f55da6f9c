//! Customer notification payloads.
//!
//! Notifications are fire-and-forget from the workflow's point of view:
//! the engine queues them on a durable outbox and a background worker
//! delivers them, so a dispatch failure never blocks or rolls back a
//! step transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milestone statuses pushed to customers.
///
/// This is the customer-facing subset of the order vocabulary; every
/// value corresponds to exactly one step transition (see the milestone
/// map in `tumble-notify`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
	Claimed,
	PickedUp,
	Washing,
	Drying,
	Folded,
	Delivered,
	Completed,
}

impl NotificationStatus {
	/// Returns the snake_case wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			NotificationStatus::Claimed => "claimed",
			NotificationStatus::PickedUp => "picked_up",
			NotificationStatus::Washing => "washing",
			NotificationStatus::Drying => "drying",
			NotificationStatus::Folded => "folded",
			NotificationStatus::Delivered => "delivered",
			NotificationStatus::Completed => "completed",
		}
	}
}

impl fmt::Display for NotificationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single customer-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	/// The order this notification is about.
	pub order_id: String,
	/// The customer to notify.
	pub customer_id: String,
	/// The milestone reached.
	pub status: NotificationStatus,
	/// Human-readable order number (last 8 characters of the id,
	/// upper-cased).
	pub order_number: String,
	/// The step the order is on after the transition, when applicable.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_step: Option<u8>,
}
