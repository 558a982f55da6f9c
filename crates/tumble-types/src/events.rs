//! Event types for inter-service communication.
//!
//! This module defines the event system used by the fulfillment engine for
//! asynchronous communication between components. Events flow through a
//! single broadcast bus per engine; customer and operator views consume
//! the same channel instead of wiring their own subscriptions.

use crate::{FulfillmentState, NotificationStatus, Order, StepNumber};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all fulfillment events.
///
/// Events are categorized by the subsystem that produces them, allowing
/// consumers to filter and handle specific event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FulfillmentEvent {
	/// Events from the order lifecycle.
	Order(OrderEvent),
	/// Events from the notification outbox.
	Notify(NotifyEvent),
}

/// Events related to order lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A customer placed a new order (payment pending).
	Placed { order: Order },
	/// A placed order became visible in the claim pool.
	Listed { order_id: String },
	/// An operator claimed an order from the pool.
	Claimed {
		order_id: String,
		washer_id: String,
	},
	/// A checklist step was completed.
	StepCompleted {
		order_id: String,
		step: StepNumber,
		state: FulfillmentState,
	},
	/// The terminal step was recorded and the order completed.
	Completed { order_id: String },
	/// The order was cancelled outside the step engine.
	Cancelled { order_id: String, reason: String },
}

/// Events related to customer notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotifyEvent {
	/// A milestone notification was queued on the outbox.
	Queued {
		order_id: String,
		status: NotificationStatus,
	},
	/// A queued notification was dispatched successfully.
	Dispatched {
		order_id: String,
		status: NotificationStatus,
	},
	/// A notification exhausted its retry budget and was dropped.
	Abandoned {
		order_id: String,
		status: NotificationStatus,
		attempts: u32,
	},
}
