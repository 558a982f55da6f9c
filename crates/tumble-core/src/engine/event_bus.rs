//! Broadcast event bus for fulfillment events.
//!
//! One bus per engine. Customer dashboards, operator dashboards, and the
//! engine's own logging all subscribe to the same channel, so every view
//! of an order observes the same sequence of changes.

use tumble_types::FulfillmentEvent;
use tokio::sync::broadcast;

/// Broadcast channel for fulfillment events.
///
/// Publishing never blocks; slow subscribers miss events rather than
/// backpressuring the workflow.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<FulfillmentEvent>,
}

impl EventBus {
	/// Creates a new event bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error only when there are no subscribers; callers treat
	/// publishing as fire-and-forget and ignore it.
	pub fn publish(
		&self,
		event: FulfillmentEvent,
	) -> Result<usize, broadcast::error::SendError<FulfillmentEvent>> {
		self.sender.send(event)
	}

	/// Creates a new subscription starting at the current position.
	pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tumble_types::OrderEvent;

	#[tokio::test]
	async fn test_all_subscribers_see_events() {
		let bus = EventBus::new(16);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		bus.publish(FulfillmentEvent::Order(OrderEvent::Listed {
			order_id: "o1".into(),
		}))
		.unwrap();

		for rx in [&mut first, &mut second] {
			match rx.recv().await.unwrap() {
				FulfillmentEvent::Order(OrderEvent::Listed { order_id }) => {
					assert_eq!(order_id, "o1")
				}
				other => panic!("unexpected event: {:?}", other),
			}
		}
	}

	#[tokio::test]
	async fn test_publish_without_subscribers_is_an_error() {
		let bus = EventBus::new(16);
		assert!(bus
			.publish(FulfillmentEvent::Order(OrderEvent::Listed {
				order_id: "o1".into(),
			}))
			.is_err());
	}
}
