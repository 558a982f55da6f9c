//! Log-only notification dispatcher.
//!
//! Writes each notification to the structured log instead of an external
//! channel. The default for development and tests.

use crate::{NotifyError, NotifyFactory, NotifyInterface};
use async_trait::async_trait;
use tumble_types::{ConfigSchema, ImplementationRegistry, Notification, Schema, ValidationError};

/// Dispatcher that records notifications in the log.
pub struct LogNotifier;

#[async_trait]
impl NotifyInterface for LogNotifier {
	async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
		tracing::info!(
			order_number = %notification.order_number,
			customer_id = %notification.customer_id,
			status = %notification.status,
			"Customer notification"
		);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}
}

/// Configuration schema for LogNotifier.
pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Log dispatch has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry entry for the log dispatcher.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotifyFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl crate::NotifyRegistry for Registry {}

/// Factory function to create a log dispatcher from configuration.
pub fn create_notifier(_config: &toml::Value) -> Result<Box<dyn NotifyInterface>, NotifyError> {
	Ok(Box::new(LogNotifier))
}
