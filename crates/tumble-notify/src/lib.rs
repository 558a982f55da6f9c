//! Customer notification module for the Tumble fulfillment system.
//!
//! This module handles delivery of milestone notifications to customers.
//! It provides the dispatch abstraction and the milestone trigger map;
//! durability and retry live in the engine's outbox, which calls into the
//! `NotificationService` here. Dispatch failures never propagate into the
//! workflow: the engine logs them and the outbox retries.

pub mod milestone;

use async_trait::async_trait;
use tumble_types::{ConfigSchema, ImplementationRegistry, Notification};
use thiserror::Error;

pub use milestone::milestone_for_transition;

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur during notification dispatch.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when the downstream dispatcher rejects the payload.
	#[error("Dispatch rejected: {0}")]
	Rejected(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for notification dispatchers.
///
/// A dispatcher makes a single delivery attempt; at-most-once semantics
/// per call. Retry policy is owned by the caller.
#[async_trait]
pub trait NotifyInterface: Send + Sync {
	/// Attempts to deliver one notification.
	async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for notification factory functions.
pub type NotifyFactory = fn(&toml::Value) -> Result<Box<dyn NotifyInterface>, NotifyError>;

/// Registry trait for notification implementations.
pub trait NotifyRegistry: ImplementationRegistry<Factory = NotifyFactory> {}

/// Get all registered notification implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotifyFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Service wrapping a notification dispatcher.
pub struct NotificationService {
	/// The underlying dispatcher implementation.
	backend: Box<dyn NotifyInterface>,
}

impl NotificationService {
	/// Creates a new NotificationService with the specified backend.
	pub fn new(backend: Box<dyn NotifyInterface>) -> Self {
		Self { backend }
	}

	/// Makes one delivery attempt for the notification.
	pub async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
		self.backend.dispatch(notification).await
	}
}
