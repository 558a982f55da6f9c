//! Fulfillment engine orchestrating the order lifecycle.
//!
//! This module contains the main FulfillmentEngine struct which owns the
//! shared services (storage, media, notifications, intake), drives claim
//! arbitration and step completion, and runs the background workers for
//! storage cleanup and the notification outbox.

pub mod event_bus;

use crate::outbox::NotificationOutbox;
use crate::state::{OrderStateError, OrderStateMachine};
use event_bus::EventBus;
use tumble_config::Config;
use tumble_intake::{IntakeError, IntakeService, NewOrder, PlacedOrder};
use tumble_media::{MediaError, MediaService};
use tumble_notify::milestone_for_transition;
use tumble_types::{
	short_order_id, unix_now, FulfillmentEvent, FulfillmentState, Notification,
	NotificationStatus, NotifyEvent, Order, OrderEvent, PhotoRef, StepNumber,
};
use tumble_workflow::{validate_evidence, StepEvidence, WorkflowError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Upper bound on reload-and-retry rounds for contended transitions.
const MAX_TRANSITION_RETRIES: usize = 4;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// The order does not exist.
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The order is no longer claimable or workable.
	#[error("Order unavailable")]
	OrderUnavailable,
	/// The operator is at the concurrent-order cap.
	#[error("Operator limit reached")]
	LimitReached,
	/// The acting operator does not hold the order.
	#[error("Order {order_id} is not held by operator {washer_id}")]
	NotOrderOperator {
		order_id: String,
		washer_id: String,
	},
	/// A step was submitted out of order.
	#[error("Step {requested} cannot be completed while the order is on step {current}")]
	StepOutOfOrder { requested: u8, current: u8 },
	/// Photo evidence references an object that is not stored.
	#[error("Photo evidence has not been stored")]
	PhotoNotStored,
	/// Evidence validation failed.
	#[error(transparent)]
	Workflow(#[from] WorkflowError),
	/// Order intake failed.
	#[error("Intake error: {0}")]
	Intake(#[from] IntakeError),
	/// Media storage failed.
	#[error("Media error: {0}")]
	Media(#[from] MediaError),
	/// Order state management failed.
	#[error("State error: {0}")]
	State(String),
	/// A transition kept losing to concurrent writers.
	#[error("Concurrent modification on order {0}")]
	Contention(String),
}

impl From<OrderStateError> for EngineError {
	fn from(err: OrderStateError) -> Self {
		match err {
			OrderStateError::OrderNotFound(id) => EngineError::OrderNotFound(id),
			other => EngineError::State(other.to_string()),
		}
	}
}

/// Result of a step-completion request.
#[derive(Debug, Clone)]
pub enum StepOutcome {
	/// The step was recorded and the order advanced to the next step.
	Advanced(Order),
	/// The terminal step was recorded and the order completed.
	Completed(Order),
	/// The step had already been recorded; nothing was written.
	Duplicate(Order),
}

impl StepOutcome {
	/// Returns the order snapshot carried by the outcome.
	pub fn order(&self) -> &Order {
		match self {
			StepOutcome::Advanced(order)
			| StepOutcome::Completed(order)
			| StepOutcome::Duplicate(order) => order,
		}
	}
}

/// Main fulfillment engine.
///
/// The engine coordinates between the services:
/// - Intake: prices and places customer orders
/// - Storage: persists orders, indexes, and the outbox
/// - Media: stores step-evidence photos
/// - Notify: delivers customer milestone notifications (via the outbox)
pub struct FulfillmentEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Storage service for persisting state.
	pub(crate) storage: Arc<tumble_storage::StorageService>,
	/// Media service for step-evidence photos.
	pub(crate) media: Arc<MediaService>,
	/// Intake service for the customer ordering flow.
	pub(crate) intake: Arc<IntakeService>,
	/// Order state machine.
	pub(crate) state_machine: Arc<OrderStateMachine>,
	/// Durable notification outbox.
	pub(crate) outbox: Arc<NotificationOutbox>,
	/// Event bus for inter-service communication.
	pub(crate) event_bus: EventBus,
}

impl FulfillmentEngine {
	/// Places a new customer order and persists it.
	///
	/// Free orders enter the claim pool immediately; paid orders wait in
	/// `Placed` for payment confirmation.
	#[instrument(skip_all)]
	pub async fn place_order(&self, new_order: NewOrder) -> Result<PlacedOrder, EngineError> {
		let placed = self.intake.place_order(new_order).await?;
		self.state_machine.store_order(&placed.order).await?;

		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::Placed {
				order: placed.order.clone(),
			}))
			.ok();
		if placed.order.state == FulfillmentState::Unclaimed {
			self.event_bus
				.publish(FulfillmentEvent::Order(OrderEvent::Listed {
					order_id: placed.order.id.clone(),
				}))
				.ok();
		}

		Ok(placed)
	}

	/// Confirms payment for a placed order, listing it in the claim pool.
	///
	/// Idempotent: an order that has already moved past `Placed` is
	/// returned unchanged.
	#[instrument(skip_all, fields(order_id = %short_order_id(order_id)))]
	pub async fn confirm_payment(&self, order_id: &str) -> Result<Order, EngineError> {
		for _ in 0..MAX_TRANSITION_RETRIES {
			let order = self.state_machine.get_order(order_id).await?;
			match order.state {
				FulfillmentState::Placed => {}
				FulfillmentState::Cancelled => return Err(EngineError::OrderUnavailable),
				_ => return Ok(order),
			}

			let mut next = order.clone();
			next.state = FulfillmentState::Unclaimed;
			next.updated_at = unix_now();

			if self.state_machine.apply(&order, &next).await? {
				tracing::info!(order_number = %next.order_number(), "Order listed");
				self.event_bus
					.publish(FulfillmentEvent::Order(OrderEvent::Listed {
						order_id: next.id.clone(),
					}))
					.ok();
				return Ok(next);
			}
		}

		Err(EngineError::Contention(order_id.to_string()))
	}

	/// Claims an unclaimed order for an operator.
	///
	/// The operator cap is checked first with no write attempted; the
	/// claim itself is a conditional write, so of two operators racing on
	/// the same order exactly one wins and the loser is told the order is
	/// unavailable.
	#[instrument(skip_all, fields(order_id = %short_order_id(order_id), washer_id = %washer_id))]
	pub async fn claim(&self, order_id: &str, washer_id: &str) -> Result<Order, EngineError> {
		let active = self.state_machine.active_orders(washer_id).await?;
		if active.len() >= self.config.service.max_active_orders {
			return Err(EngineError::LimitReached);
		}

		let order = self.state_machine.get_order(order_id).await?;
		if !order.state.is_claimable() {
			return Err(EngineError::OrderUnavailable);
		}

		let mut next = order.clone();
		next.washer_id = Some(washer_id.to_string());
		next.state = FulfillmentState::Claimed {
			step: StepNumber::FIRST,
		};
		let now = unix_now();
		next.claimed_at = Some(now);
		next.updated_at = now;

		if !self.state_machine.apply(&order, &next).await? {
			// Lost the race; someone else claimed or the order was pulled
			return Err(EngineError::OrderUnavailable);
		}

		self.state_machine
			.add_active_order(washer_id, order_id)
			.await?;

		tracing::info!(order_number = %next.order_number(), "Order claimed");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::Claimed {
				order_id: next.id.clone(),
				washer_id: washer_id.to_string(),
			}))
			.ok();
		self.queue_notification(&next, NotificationStatus::Claimed)
			.await;

		Ok(next)
	}

	/// Completes the current checklist step of a claimed order.
	///
	/// Only the claiming operator may complete steps, steps complete
	/// strictly in order, and gated steps demand their evidence before
	/// anything is written. Duplicate submissions of an already-recorded
	/// step succeed without side effects, so client retries after a
	/// successful-but-unacknowledged write cannot advance an order twice.
	#[instrument(skip_all, fields(order_id = %short_order_id(order_id), step = %step))]
	pub async fn complete_step(
		&self,
		order_id: &str,
		washer_id: &str,
		step: StepNumber,
		evidence: StepEvidence,
	) -> Result<StepOutcome, EngineError> {
		for _ in 0..MAX_TRANSITION_RETRIES {
			let order = self.state_machine.get_order(order_id).await?;

			if order.washer_id.as_deref() != Some(washer_id) {
				return Err(EngineError::NotOrderOperator {
					order_id: order_id.to_string(),
					washer_id: washer_id.to_string(),
				});
			}

			let current = match order.state {
				FulfillmentState::Claimed { step } => step,
				// A retry of the terminal step after the order completed
				FulfillmentState::Completed => return Ok(StepOutcome::Duplicate(order)),
				_ => return Err(EngineError::OrderUnavailable),
			};

			if step < current {
				return Ok(StepOutcome::Duplicate(order));
			}
			if step > current {
				return Err(EngineError::StepOutOfOrder {
					requested: step.get(),
					current: current.get(),
				});
			}

			let definition = tumble_workflow::step(step);
			validate_evidence(definition, &evidence)?;
			if let Some(photo) = evidence.photo() {
				if !self.media.contains(photo).await? {
					return Err(EngineError::PhotoNotStored);
				}
			}

			let mut next = order.clone();
			next.updated_at = unix_now();
			if let Some(photo) = evidence.photo() {
				next.step_photos.insert(step.get(), photo.clone());
			}
			if let Some(count) = evidence.bag_count() {
				next.bag_count = Some(count);
			}
			next.state = match step.next() {
				Some(following) => FulfillmentState::Claimed { step: following },
				None => {
					next.completed_at = Some(next.updated_at);
					FulfillmentState::Completed
				}
			};

			if !self.state_machine.apply(&order, &next).await? {
				// A concurrent duplicate advanced the order first; reload
				// and re-evaluate so the retry resolves idempotently
				continue;
			}

			if let Some(status) = milestone_for_transition(&next.state) {
				self.queue_notification(&next, status).await;
			}

			if next.state == FulfillmentState::Completed {
				self.state_machine
					.remove_active_order(washer_id, order_id)
					.await?;
				tracing::info!(order_number = %next.order_number(), "Order completed");
				self.event_bus
					.publish(FulfillmentEvent::Order(OrderEvent::Completed {
						order_id: next.id.clone(),
					}))
					.ok();
				return Ok(StepOutcome::Completed(next));
			}

			self.event_bus
				.publish(FulfillmentEvent::Order(OrderEvent::StepCompleted {
					order_id: next.id.clone(),
					step,
					state: next.state.clone(),
				}))
				.ok();
			return Ok(StepOutcome::Advanced(next));
		}

		Err(EngineError::Contention(order_id.to_string()))
	}

	/// Cancels an order outside the step engine.
	///
	/// Support-side escape hatch for stalled or abandoned orders. A
	/// claimed order is released from its operator's active list.
	#[instrument(skip_all, fields(order_id = %short_order_id(order_id)))]
	pub async fn cancel_order(&self, order_id: &str, reason: &str) -> Result<Order, EngineError> {
		for _ in 0..MAX_TRANSITION_RETRIES {
			let order = self.state_machine.get_order(order_id).await?;
			match order.state {
				FulfillmentState::Cancelled => return Ok(order),
				FulfillmentState::Completed => return Err(EngineError::OrderUnavailable),
				_ => {}
			}

			let mut next = order.clone();
			next.state = FulfillmentState::Cancelled;
			next.updated_at = unix_now();

			if self.state_machine.apply(&order, &next).await? {
				if let Some(washer_id) = next.washer_id.as_deref() {
					self.state_machine
						.remove_active_order(washer_id, order_id)
						.await?;
				}
				tracing::info!(order_number = %next.order_number(), reason, "Order cancelled");
				self.event_bus
					.publish(FulfillmentEvent::Order(OrderEvent::Cancelled {
						order_id: next.id.clone(),
						reason: reason.to_string(),
					}))
					.ok();
				return Ok(next);
			}
		}

		Err(EngineError::Contention(order_id.to_string()))
	}

	/// Retrieves an order snapshot.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		Ok(self.state_machine.get_order(order_id).await?)
	}

	/// Stores a step-evidence photo and returns its reference.
	pub async fn store_photo(&self, bytes: &[u8]) -> Result<PhotoRef, EngineError> {
		Ok(self.media.store_photo(bytes).await?)
	}

	/// Queues a customer notification, best-effort.
	///
	/// Outbox failures are logged and swallowed: notifications never
	/// block or roll back the workflow.
	async fn queue_notification(&self, order: &Order, status: NotificationStatus) {
		let notification = Notification {
			order_id: order.id.clone(),
			customer_id: order.customer_id.clone(),
			status,
			order_number: order.order_number(),
			current_step: order.current_step().map(|s| s.get()),
		};

		if let Err(e) = self.outbox.queue(notification).await {
			tracing::warn!(
				order_id = %short_order_id(&order.id),
				status = %status,
				error = %e,
				"Failed to queue notification"
			);
		}
	}

	/// Main execution loop for the fulfillment engine.
	///
	/// This method:
	/// 1. Starts the storage cleanup interval task
	/// 2. Starts the notification outbox drain worker
	/// 3. Logs order lifecycle events from the bus
	/// 4. Handles graceful shutdown on Ctrl+C
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut event_receiver = self.event_bus.subscribe();

		// Start storage cleanup task
		let storage = self.storage.clone();
		let cleanup_interval = Duration::from_secs(self.config.storage.cleanup_interval_seconds);
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = tokio::time::interval(cleanup_interval);
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					}
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					}
					_ => {} // No expired entries
				}
			}
		});

		// Start outbox drain worker
		let outbox = self.outbox.clone();
		let poll_interval = Duration::from_secs(self.config.notify.outbox.poll_seconds);
		let outbox_handle = tokio::spawn(async move {
			let mut interval = tokio::time::interval(poll_interval);
			loop {
				interval.tick().await;
				match outbox.drain_due().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Outbox drained {} notifications", count);
					}
					Err(e) => {
						tracing::warn!("Outbox drain failed: {}", e);
					}
					_ => {} // Nothing due
				}
			}
		});

		loop {
			tokio::select! {
				Ok(event) = event_receiver.recv() => {
					log_event(&event);
				}

				// Shutdown signal
				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		// Cleanup
		cleanup_handle.abort();
		outbox_handle.abort();

		Ok(())
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<tumble_storage::StorageService> {
		&self.storage
	}

	/// Returns a reference to the media service.
	pub fn media(&self) -> &Arc<MediaService> {
		&self.media
	}
}

/// Writes one structured log line per lifecycle event.
fn log_event(event: &FulfillmentEvent) {
	match event {
		FulfillmentEvent::Order(OrderEvent::Placed { order }) => {
			tracing::info!(order_id = %short_order_id(&order.id), "Order placed");
		}
		FulfillmentEvent::Order(OrderEvent::Listed { order_id }) => {
			tracing::debug!(order_id = %short_order_id(order_id), "Order listed");
		}
		FulfillmentEvent::Order(OrderEvent::Claimed { order_id, washer_id }) => {
			tracing::info!(
				order_id = %short_order_id(order_id),
				washer_id = %washer_id,
				"Order claimed"
			);
		}
		FulfillmentEvent::Order(OrderEvent::StepCompleted { order_id, step, .. }) => {
			tracing::debug!(
				order_id = %short_order_id(order_id),
				step = %step,
				"Step completed"
			);
		}
		FulfillmentEvent::Order(OrderEvent::Completed { order_id }) => {
			tracing::info!(order_id = %short_order_id(order_id), "Order completed");
		}
		FulfillmentEvent::Order(OrderEvent::Cancelled { order_id, reason }) => {
			tracing::info!(
				order_id = %short_order_id(order_id),
				reason = %reason,
				"Order cancelled"
			);
		}
		FulfillmentEvent::Notify(NotifyEvent::Abandoned {
			order_id,
			status,
			attempts,
		}) => {
			tracing::warn!(
				order_id = %short_order_id(order_id),
				status = %status,
				attempts,
				"Notification abandoned"
			);
		}
		FulfillmentEvent::Notify(_) => {}
	}
}
