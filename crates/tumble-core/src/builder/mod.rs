//! Builder for constructing a FulfillmentEngine with pluggable
//! implementations.
//!
//! The builder uses the factory pattern to allow different implementations
//! of each service to be plugged in based on configuration. Every selected
//! implementation validates its own configuration section before the
//! engine is assembled, so misconfiguration fails at startup.

use crate::engine::{event_bus::EventBus, EngineError, FulfillmentEngine};
use crate::outbox::NotificationOutbox;
use crate::state::OrderStateMachine;
use tumble_config::Config;
use tumble_intake::{GeocodeFactory, IntakeService, PaymentFactory, PricingConfig};
use tumble_media::{MediaFactory, MediaService};
use tumble_notify::{NotificationService, NotifyFactory};
use tumble_storage::{StorageFactory, StorageService};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves one implementation section: looks up the factory for the
/// configured primary, creates the instance, and validates its raw
/// configuration against the instance's schema.
macro_rules! resolve_implementation {
	($component:literal, $primary:expr, $configs:expr, $factories:expr) => {{
		let primary = $primary;
		let section_config = $configs.get(primary).ok_or_else(|| {
			EngineError::Config(format!(
				"{} implementation '{}' has no configuration",
				$component, primary
			))
		})?;
		let factory = $factories.get(primary).ok_or_else(|| {
			EngineError::Config(format!(
				"Unknown {} implementation '{}'",
				$component, primary
			))
		})?;
		let instance = factory(section_config).map_err(|e| {
			EngineError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				$component, primary, e
			))
		})?;
		instance.config_schema().validate(section_config).map_err(|e| {
			EngineError::Config(format!(
				"Invalid configuration for {} implementation '{}': {}",
				$component, primary, e
			))
		})?;
		tracing::info!(component = $component, implementation = %primary, "Loaded");
		instance
	}};
}

/// Builder assembling a FulfillmentEngine from registered factories.
pub struct FulfillmentBuilder {
	config: Config,
	storage_factories: HashMap<String, StorageFactory>,
	media_factories: HashMap<String, MediaFactory>,
	notify_factories: HashMap<String, NotifyFactory>,
	geocode_factories: HashMap<String, GeocodeFactory>,
	payment_factories: HashMap<String, PaymentFactory>,
}

impl FulfillmentBuilder {
	/// Creates a new builder with the given configuration and no
	/// registered factories.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factories: HashMap::new(),
			media_factories: HashMap::new(),
			notify_factories: HashMap::new(),
			geocode_factories: HashMap::new(),
			payment_factories: HashMap::new(),
		}
	}

	/// Registers every implementation shipped with the workspace crates.
	pub fn with_all_implementations(mut self) -> Self {
		for (name, factory) in tumble_storage::get_all_implementations() {
			self.storage_factories.insert(name.to_string(), factory);
		}
		for (name, factory) in tumble_media::get_all_implementations() {
			self.media_factories.insert(name.to_string(), factory);
		}
		for (name, factory) in tumble_notify::get_all_implementations() {
			self.notify_factories.insert(name.to_string(), factory);
		}
		for (name, factory) in tumble_intake::get_all_geocode_implementations() {
			self.geocode_factories.insert(name.to_string(), factory);
		}
		for (name, factory) in tumble_intake::get_all_payment_implementations() {
			self.payment_factories.insert(name.to_string(), factory);
		}
		self
	}

	/// Registers a storage backend factory under the given name.
	pub fn with_storage_factory(mut self, name: &str, factory: StorageFactory) -> Self {
		self.storage_factories.insert(name.to_string(), factory);
		self
	}

	/// Registers a media backend factory under the given name.
	pub fn with_media_factory(mut self, name: &str, factory: MediaFactory) -> Self {
		self.media_factories.insert(name.to_string(), factory);
		self
	}

	/// Registers a notification dispatcher factory under the given name.
	pub fn with_notify_factory(mut self, name: &str, factory: NotifyFactory) -> Self {
		self.notify_factories.insert(name.to_string(), factory);
		self
	}

	/// Registers a geocoder factory under the given name.
	pub fn with_geocode_factory(mut self, name: &str, factory: GeocodeFactory) -> Self {
		self.geocode_factories.insert(name.to_string(), factory);
		self
	}

	/// Registers a payment provider factory under the given name.
	pub fn with_payment_factory(mut self, name: &str, factory: PaymentFactory) -> Self {
		self.payment_factories.insert(name.to_string(), factory);
		self
	}

	/// Builds the FulfillmentEngine using the configured factories.
	///
	/// This method:
	/// 1. Creates all service instances using the registered factories
	/// 2. Validates each implementation's configuration section
	/// 3. Wires up the services with proper dependencies
	/// 4. Returns a fully configured engine ready to run
	pub fn build(self) -> Result<FulfillmentEngine, EngineError> {
		let config = self.config;

		let storage_backend = resolve_implementation!(
			"storage",
			&config.storage.primary,
			config.storage.implementations,
			self.storage_factories
		);
		let storage = Arc::new(StorageService::new(storage_backend));

		let media_backend = resolve_implementation!(
			"media",
			&config.media.primary,
			config.media.implementations,
			self.media_factories
		);
		let media = Arc::new(MediaService::new(media_backend));

		let notify_backend = resolve_implementation!(
			"notify",
			&config.notify.primary,
			config.notify.implementations,
			self.notify_factories
		);
		let notifier = Arc::new(NotificationService::new(notify_backend));

		let geocoder = resolve_implementation!(
			"geocode",
			&config.intake.geocode.primary,
			config.intake.geocode.implementations,
			self.geocode_factories
		);
		let payments = resolve_implementation!(
			"payment",
			&config.intake.payment.primary,
			config.intake.payment.implementations,
			self.payment_factories
		);
		let intake = Arc::new(IntakeService::new(
			geocoder,
			payments,
			PricingConfig {
				business_cut_bps: config.intake.business_cut_bps,
			},
		));

		let event_bus = EventBus::new(1000);
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		let outbox = Arc::new(NotificationOutbox::new(
			storage.clone(),
			notifier,
			event_bus.clone(),
			config.notify.outbox.clone(),
		));

		Ok(FulfillmentEngine {
			config,
			storage,
			media,
			intake,
			state_machine,
			outbox,
			event_bus,
		})
	}
}
