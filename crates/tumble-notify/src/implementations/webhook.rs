//! Webhook notification dispatcher.
//!
//! Posts each notification as JSON to a configured endpoint, typically a
//! managed function that fans out to push and email. One HTTP attempt per
//! dispatch call; the outbox owns retries.

use crate::{NotifyError, NotifyFactory, NotifyInterface};
use async_trait::async_trait;
use tumble_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Notification, Schema, ValidationError,
};
use std::time::Duration;

/// Dispatcher that POSTs notifications to a webhook endpoint.
pub struct WebhookNotifier {
	client: reqwest::Client,
	endpoint_url: String,
}

impl WebhookNotifier {
	/// Creates a new WebhookNotifier for the given endpoint.
	pub fn new(endpoint_url: String, timeout: Duration) -> Result<Self, NotifyError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotifyError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			endpoint_url,
		})
	}
}

#[async_trait]
impl NotifyInterface for WebhookNotifier {
	async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
		let response = self
			.client
			.post(&self.endpoint_url)
			.json(notification)
			.send()
			.await
			.map_err(|e| NotifyError::Network(e.to_string()))?;

		if !response.status().is_success() {
			return Err(NotifyError::Rejected(format!(
				"endpoint returned {}",
				response.status()
			)));
		}

		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookNotifierSchema)
	}
}

/// Configuration schema for WebhookNotifier.
pub struct WebhookNotifierSchema;

impl ConfigSchema for WebhookNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("endpoint_url", FieldType::String).with_validator(|v| {
				let url = v.as_str().unwrap_or_default();
				if url.starts_with("http://") || url.starts_with("https://") {
					Ok(())
				} else {
					Err("endpoint_url must be an http(s) URL".to_string())
				}
			})],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Registry entry for the webhook dispatcher.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = NotifyFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl crate::NotifyRegistry for Registry {}

/// Factory function to create a webhook dispatcher from configuration.
///
/// Configuration parameters:
/// - `endpoint_url`: URL to POST notifications to (required)
/// - `timeout_seconds`: request timeout (default: 10)
pub fn create_notifier(config: &toml::Value) -> Result<Box<dyn NotifyInterface>, NotifyError> {
	let endpoint_url = config
		.get("endpoint_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotifyError::Configuration("endpoint_url is required".into()))?
		.to_string();

	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.unwrap_or(10) as u64;

	Ok(Box::new(WebhookNotifier::new(
		endpoint_url,
		Duration::from_secs(timeout),
	)?))
}
