//! Order intake module for the Tumble fulfillment system.
//!
//! This module implements the customer ordering flow: validating the
//! request, pricing it, resolving the pickup address to coordinates, and
//! creating a payment session. Geocoding and payment are external
//! collaborators behind pluggable interfaces; intake stops at the session
//! boundary and never captures payment itself.

pub mod pricing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tumble_types::{
	unix_now, ConfigSchema, FulfillmentState, ImplementationRegistry, Order, PickupType,
	ServiceType,
};
use thiserror::Error;
use tracing::instrument;

pub use pricing::{PricingConfig, Quote};

/// Re-export implementations
pub mod implementations {
	pub mod fixed_geocode;
	pub mod offline_payment;
}

/// Errors that can occur during order intake.
#[derive(Debug, Error)]
pub enum IntakeError {
	/// Error that occurs when the order request is invalid.
	#[error("Validation error: {0}")]
	Validation(String),
	/// Error that occurs while resolving an address.
	#[error("Geocoding error: {0}")]
	Geocode(String),
	/// Error that occurs while creating a payment session.
	#[error("Payment error: {0}")]
	Payment(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Geographic coordinates resolved from an address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
	pub latitude: f64,
	pub longitude: f64,
}

/// Trait defining the interface for geocoding providers.
#[async_trait]
pub trait GeocodeInterface: Send + Sync {
	/// Resolves an address to coordinates.
	async fn geocode(&self, address: &str) -> Result<Coordinates, IntakeError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// A payment-session request assembled from a priced order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
	pub order_id: String,
	pub customer_id: String,
	pub amount_cents: u64,
	pub description: String,
}

/// Result of creating a payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentOutcome {
	/// The customer must complete payment through the session.
	Session {
		session_id: String,
		redirect_url: String,
	},
	/// Nothing to charge; the order proceeds immediately.
	Free,
}

/// Trait defining the interface for payment providers.
#[async_trait]
pub trait PaymentInterface: Send + Sync {
	/// Creates a payment session for the given request.
	async fn create_session(&self, request: &PaymentRequest)
		-> Result<PaymentOutcome, IntakeError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for geocode factory functions.
pub type GeocodeFactory = fn(&toml::Value) -> Result<Box<dyn GeocodeInterface>, IntakeError>;
/// Type alias for payment factory functions.
pub type PaymentFactory = fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, IntakeError>;

/// Registry trait for geocode implementations.
pub trait GeocodeRegistry: ImplementationRegistry<Factory = GeocodeFactory> {}
/// Registry trait for payment implementations.
pub trait PaymentRegistry: ImplementationRegistry<Factory = PaymentFactory> {}

/// Get all registered geocode implementations.
pub fn get_all_geocode_implementations() -> Vec<(&'static str, GeocodeFactory)> {
	use implementations::fixed_geocode;

	vec![(
		fixed_geocode::Registry::NAME,
		fixed_geocode::Registry::factory(),
	)]
}

/// Get all registered payment implementations.
pub fn get_all_payment_implementations() -> Vec<(&'static str, PaymentFactory)> {
	use implementations::offline_payment;

	vec![(
		offline_payment::Registry::NAME,
		offline_payment::Registry::factory(),
	)]
}

/// A new-order request from the customer flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
	pub customer_id: String,
	pub pickup_type: PickupType,
	pub service_type: ServiceType,
	#[serde(default)]
	pub is_express: bool,
	pub bag_estimate: u32,
	#[serde(default)]
	pub discount_cents: u64,
	pub pickup_address: String,
	#[serde(default)]
	pub delivery_address: Option<String>,
	pub zip_code: String,
	#[serde(default)]
	pub locker_id: Option<String>,
}

/// A placed order together with its payment outcome.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
	pub order: Order,
	pub payment: PaymentOutcome,
	pub pickup_coordinates: Coordinates,
}

/// Service implementing the customer ordering flow.
pub struct IntakeService {
	geocoder: Box<dyn GeocodeInterface>,
	payments: Box<dyn PaymentInterface>,
	pricing: PricingConfig,
}

impl IntakeService {
	/// Creates a new IntakeService with the given collaborators.
	pub fn new(
		geocoder: Box<dyn GeocodeInterface>,
		payments: Box<dyn PaymentInterface>,
		pricing: PricingConfig,
	) -> Self {
		Self {
			geocoder,
			payments,
			pricing,
		}
	}

	fn validate(new_order: &NewOrder) -> Result<(), IntakeError> {
		if new_order.customer_id.trim().is_empty() {
			return Err(IntakeError::Validation("customer_id is required".into()));
		}
		if new_order.pickup_address.trim().is_empty() {
			return Err(IntakeError::Validation("pickup_address is required".into()));
		}
		if new_order.zip_code.trim().is_empty() {
			return Err(IntakeError::Validation("zip_code is required".into()));
		}
		if new_order.pickup_type == PickupType::Locker && new_order.locker_id.is_none() {
			return Err(IntakeError::Validation(
				"locker orders require a locker_id".into(),
			));
		}
		Ok(())
	}

	/// Places a new order: validates, prices, geocodes, and opens a
	/// payment session.
	///
	/// Free orders (fully discounted) skip payment and enter the claim
	/// pool immediately; everything else starts as `Placed` until payment
	/// is confirmed.
	#[instrument(skip_all, fields(customer_id = %new_order.customer_id))]
	pub async fn place_order(&self, new_order: NewOrder) -> Result<PlacedOrder, IntakeError> {
		Self::validate(&new_order)?;

		let quote = pricing::quote(
			new_order.service_type,
			new_order.is_express,
			new_order.bag_estimate,
			new_order.discount_cents,
			&self.pricing,
		)?;

		let pickup_coordinates = self.geocoder.geocode(&new_order.pickup_address).await?;

		let order_id = uuid::Uuid::new_v4().to_string();
		let payment = self
			.payments
			.create_session(&PaymentRequest {
				order_id: order_id.clone(),
				customer_id: new_order.customer_id.clone(),
				amount_cents: quote.total_amount_cents - quote.discount_amount_cents,
				description: format!("{} bag laundry order", new_order.bag_estimate),
			})
			.await?;

		let state = match payment {
			PaymentOutcome::Free => FulfillmentState::Unclaimed,
			PaymentOutcome::Session { .. } => FulfillmentState::Placed,
		};

		let now = unix_now();
		let order = Order {
			id: order_id,
			customer_id: new_order.customer_id,
			pickup_type: new_order.pickup_type,
			service_type: new_order.service_type,
			is_express: new_order.is_express,
			washer_id: None,
			state,
			step_photos: Default::default(),
			bag_count: None,
			total_amount_cents: quote.total_amount_cents,
			discount_amount_cents: quote.discount_amount_cents,
			business_cut_cents: quote.business_cut_cents,
			operator_payout_cents: quote.operator_payout_cents,
			created_at: now,
			updated_at: now,
			claimed_at: None,
			completed_at: None,
			pickup_address: new_order.pickup_address,
			delivery_address: new_order.delivery_address,
			zip_code: new_order.zip_code,
			locker_id: new_order.locker_id,
		};

		tracing::info!(
			order_number = %order.order_number(),
			total_cents = order.total_amount_cents,
			"Placed order"
		);

		Ok(PlacedOrder {
			order,
			payment,
			pickup_coordinates,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::{fixed_geocode::FixedGeocoder, offline_payment::OfflinePayments};

	fn service() -> IntakeService {
		IntakeService::new(
			Box::new(FixedGeocoder::with_default(Coordinates {
				latitude: 40.0,
				longitude: -74.0,
			})),
			Box::new(OfflinePayments::new("https://pay.test".into())),
			PricingConfig::default(),
		)
	}

	fn request() -> NewOrder {
		NewOrder {
			customer_id: "cust-1".into(),
			pickup_type: PickupType::PickupDelivery,
			service_type: ServiceType::WashFold,
			is_express: false,
			bag_estimate: 2,
			discount_cents: 0,
			pickup_address: "12 Spring St".into(),
			delivery_address: None,
			zip_code: "07030".into(),
			locker_id: None,
		}
	}

	#[tokio::test]
	async fn test_paid_order_starts_placed() {
		let placed = service().place_order(request()).await.unwrap();
		assert_eq!(placed.order.state, FulfillmentState::Placed);
		assert!(matches!(placed.payment, PaymentOutcome::Session { .. }));
		assert_eq!(placed.order.total_amount_cents, 4_990);
	}

	#[tokio::test]
	async fn test_free_order_enters_pool_directly() {
		let mut req = request();
		req.bag_estimate = 1;
		req.discount_cents = 2_495;
		let placed = service().place_order(req).await.unwrap();
		assert_eq!(placed.order.state, FulfillmentState::Unclaimed);
		assert_eq!(placed.payment, PaymentOutcome::Free);
	}

	#[tokio::test]
	async fn test_locker_orders_need_locker_id() {
		let mut req = request();
		req.pickup_type = PickupType::Locker;
		assert!(matches!(
			service().place_order(req).await,
			Err(IntakeError::Validation(_))
		));
	}
}
