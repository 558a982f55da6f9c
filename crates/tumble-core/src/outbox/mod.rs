//! Durable notification outbox.
//!
//! Step completions never call the dispatcher directly: they append an
//! entry here, inside the same storage the order write went to, and a
//! background worker drains due entries with exponential backoff. This
//! decouples notification delivery from the workflow's success; a dead
//! webhook endpoint delays notifications, never step transitions.

use crate::engine::event_bus::EventBus;
use tumble_config::OutboxConfig;
use tumble_notify::NotificationService;
use tumble_storage::{StorageError, StorageService};
use tumble_types::{unix_now, FulfillmentEvent, Notification, NotifyEvent, StorageTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Storage id of the pending-entry index.
const PENDING_INDEX: &str = "pending";

/// Upper bound on CAS retries for index maintenance.
const MAX_CAS_RETRIES: usize = 16;

/// Errors that can occur during outbox operations.
#[derive(Debug, Error)]
pub enum OutboxError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Concurrent modification on outbox index")]
	Contention,
}

impl From<StorageError> for OutboxError {
	fn from(err: StorageError) -> Self {
		OutboxError::Storage(err.to_string())
	}
}

/// A queued notification awaiting delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
	/// Entry id: `<order_id>:<status>`, which also dedupes milestones.
	pub id: String,
	/// The notification to deliver.
	pub notification: Notification,
	/// Delivery attempts made so far.
	pub attempts: u32,
	/// Unix timestamp before which the entry is not due.
	pub next_attempt_at: u64,
	/// Unix timestamp when the entry was queued.
	pub queued_at: u64,
}

/// Durable outbox with a retrying drain worker.
pub struct NotificationOutbox {
	storage: Arc<StorageService>,
	notifier: Arc<NotificationService>,
	event_bus: EventBus,
	config: OutboxConfig,
}

impl NotificationOutbox {
	/// Creates a new outbox over the given storage and dispatcher.
	pub fn new(
		storage: Arc<StorageService>,
		notifier: Arc<NotificationService>,
		event_bus: EventBus,
		config: OutboxConfig,
	) -> Self {
		Self {
			storage,
			notifier,
			event_bus,
			config,
		}
	}

	/// Queues a notification for delivery.
	///
	/// Entries are keyed by `(order, status)`, so re-queueing the same
	/// milestone (a duplicate step submission, a crashed retry) is a
	/// no-op and each milestone is attempted for delivery at most once
	/// per transition.
	pub async fn queue(&self, notification: Notification) -> Result<(), OutboxError> {
		let id = format!("{}:{}", notification.order_id, notification.status);
		let now = unix_now();
		let entry = OutboxEntry {
			id: id.clone(),
			notification: notification.clone(),
			attempts: 0,
			next_attempt_at: now,
			queued_at: now,
		};

		let inserted = self
			.storage
			.insert_if_absent(StorageTable::Outbox, &id, &entry)
			.await?;
		if !inserted {
			return Ok(());
		}

		self.index_add(&id).await?;
		self.event_bus
			.publish(FulfillmentEvent::Notify(NotifyEvent::Queued {
				order_id: notification.order_id,
				status: notification.status,
			}))
			.ok();

		Ok(())
	}

	/// Returns the ids of currently pending entries.
	pub async fn pending(&self) -> Result<Vec<String>, OutboxError> {
		match self
			.storage
			.retrieve::<Vec<String>>(StorageTable::OutboxIndex, PENDING_INDEX)
			.await
		{
			Ok(ids) => Ok(ids),
			Err(StorageError::NotFound) => Ok(Vec::new()),
			Err(e) => Err(e.into()),
		}
	}

	/// Makes one delivery attempt for every due entry.
	///
	/// Returns the number of entries delivered. Failed entries are
	/// rescheduled with exponential backoff until the attempt budget runs
	/// out, after which they are dropped and announced as abandoned.
	pub async fn drain_due(&self) -> Result<usize, OutboxError> {
		let ids = self.pending().await?;
		let now = unix_now();
		let mut dispatched = 0;

		for id in ids {
			let mut entry: OutboxEntry = match self.storage.retrieve(StorageTable::Outbox, &id).await
			{
				Ok(entry) => entry,
				Err(StorageError::NotFound) => {
					// Entry already delivered elsewhere; drop the index row
					self.index_remove(&id).await?;
					continue;
				}
				Err(e) => return Err(e.into()),
			};

			if entry.next_attempt_at > now {
				continue;
			}

			match self.notifier.dispatch(&entry.notification).await {
				Ok(()) => {
					self.storage.remove(StorageTable::Outbox, &id).await?;
					self.index_remove(&id).await?;
					self.event_bus
						.publish(FulfillmentEvent::Notify(NotifyEvent::Dispatched {
							order_id: entry.notification.order_id.clone(),
							status: entry.notification.status,
						}))
						.ok();
					dispatched += 1;
				}
				Err(e) => {
					entry.attempts += 1;
					if entry.attempts >= self.config.max_attempts {
						tracing::warn!(
							order_id = %entry.notification.order_id,
							status = %entry.notification.status,
							attempts = entry.attempts,
							error = %e,
							"Dropping notification after exhausting retries"
						);
						self.storage.remove(StorageTable::Outbox, &id).await?;
						self.index_remove(&id).await?;
						self.event_bus
							.publish(FulfillmentEvent::Notify(NotifyEvent::Abandoned {
								order_id: entry.notification.order_id.clone(),
								status: entry.notification.status,
								attempts: entry.attempts,
							}))
							.ok();
					} else {
						// Exponential backoff: base * 2^(attempts-1)
						let delay = self
							.config
							.base_delay_seconds
							.saturating_mul(1u64 << (entry.attempts - 1).min(32));
						entry.next_attempt_at = now.saturating_add(delay);
						tracing::warn!(
							order_id = %entry.notification.order_id,
							status = %entry.notification.status,
							attempts = entry.attempts,
							retry_in_secs = delay,
							error = %e,
							"Notification dispatch failed, will retry"
						);
						self.storage.store(StorageTable::Outbox, &id, &entry).await?;
					}
				}
			}
		}

		Ok(dispatched)
	}

	async fn index_add(&self, id: &str) -> Result<(), OutboxError> {
		for _ in 0..MAX_CAS_RETRIES {
			let current = self.pending().await?;
			if current.iter().any(|existing| existing == id) {
				return Ok(());
			}

			let mut next = current.clone();
			next.push(id.to_string());

			let swapped = if current.is_empty() {
				match self
					.storage
					.insert_if_absent(StorageTable::OutboxIndex, PENDING_INDEX, &next)
					.await?
				{
					true => true,
					false => {
						self.storage
							.update_if(StorageTable::OutboxIndex, PENDING_INDEX, &current, &next)
							.await?
					}
				}
			} else {
				self.storage
					.update_if(StorageTable::OutboxIndex, PENDING_INDEX, &current, &next)
					.await?
			};

			if swapped {
				return Ok(());
			}
		}

		Err(OutboxError::Contention)
	}

	async fn index_remove(&self, id: &str) -> Result<(), OutboxError> {
		for _ in 0..MAX_CAS_RETRIES {
			let current = self.pending().await?;
			if !current.iter().any(|existing| existing == id) {
				return Ok(());
			}

			let next: Vec<String> = current
				.iter()
				.filter(|existing| existing.as_str() != id)
				.cloned()
				.collect();

			if self
				.storage
				.update_if(StorageTable::OutboxIndex, PENDING_INDEX, &current, &next)
				.await?
			{
				return Ok(());
			}
		}

		Err(OutboxError::Contention)
	}
}
