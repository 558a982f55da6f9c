//! Offline payment provider.
//!
//! Creates deterministic sessions without talking to a processor. Zero
//! amounts short-circuit to the free-order path, mirroring the behavior
//! of the hosted payment function this stands in for.

use crate::{IntakeError, PaymentFactory, PaymentInterface, PaymentOutcome, PaymentRequest};
use async_trait::async_trait;
use tumble_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};

/// Payment provider that fabricates sessions locally.
pub struct OfflinePayments {
	session_base_url: String,
}

impl OfflinePayments {
	/// Creates a new OfflinePayments with the given session base URL.
	pub fn new(session_base_url: String) -> Self {
		Self { session_base_url }
	}
}

#[async_trait]
impl PaymentInterface for OfflinePayments {
	async fn create_session(
		&self,
		request: &PaymentRequest,
	) -> Result<PaymentOutcome, IntakeError> {
		if request.amount_cents == 0 {
			return Ok(PaymentOutcome::Free);
		}

		let session_id = format!("sess_{}", request.order_id);
		let redirect_url = format!("{}/{}", self.session_base_url, session_id);
		Ok(PaymentOutcome::Session {
			session_id,
			redirect_url,
		})
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(OfflinePaymentsSchema)
	}
}

/// Configuration schema for OfflinePayments.
pub struct OfflinePaymentsSchema;

impl ConfigSchema for OfflinePaymentsSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("session_base_url", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Registry entry for the offline payment provider.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "offline";
	type Factory = PaymentFactory;

	fn factory() -> Self::Factory {
		create_payments
	}
}

impl crate::PaymentRegistry for Registry {}

/// Factory function to create an offline payment provider from
/// configuration.
///
/// Configuration parameters:
/// - `session_base_url`: base URL for fabricated redirect URLs
///   (default: "https://pay.tumble.test/session")
pub fn create_payments(config: &toml::Value) -> Result<Box<dyn PaymentInterface>, IntakeError> {
	let session_base_url = config
		.get("session_base_url")
		.and_then(|v| v.as_str())
		.unwrap_or("https://pay.tumble.test/session")
		.to_string();

	Ok(Box::new(OfflinePayments::new(session_base_url)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_zero_amount_is_free() {
		let payments = OfflinePayments::new("https://pay.test".into());
		let outcome = payments
			.create_session(&PaymentRequest {
				order_id: "o1".into(),
				customer_id: "c1".into(),
				amount_cents: 0,
				description: "free order".into(),
			})
			.await
			.unwrap();
		assert_eq!(outcome, PaymentOutcome::Free);
	}

	#[tokio::test]
	async fn test_session_is_deterministic() {
		let payments = OfflinePayments::new("https://pay.test".into());
		let request = PaymentRequest {
			order_id: "o1".into(),
			customer_id: "c1".into(),
			amount_cents: 2_495,
			description: "1 bag laundry order".into(),
		};
		let first = payments.create_session(&request).await.unwrap();
		let second = payments.create_session(&request).await.unwrap();
		assert_eq!(first, second);
		assert!(matches!(first, PaymentOutcome::Session { session_id, .. } if session_id == "sess_o1"));
	}
}
