//! Table-backed geocoder.
//!
//! Resolves addresses from a configured lookup table, with an optional
//! fallback coordinate for everything else. Stands in for a real mapping
//! API in development and single-region deployments.

use crate::{Coordinates, GeocodeFactory, GeocodeInterface, IntakeError};
use async_trait::async_trait;
use tumble_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;

/// Geocoder backed by a fixed address table.
pub struct FixedGeocoder {
	addresses: HashMap<String, Coordinates>,
	default: Option<Coordinates>,
}

impl FixedGeocoder {
	/// Creates a geocoder with an explicit table and optional fallback.
	pub fn new(addresses: HashMap<String, Coordinates>, default: Option<Coordinates>) -> Self {
		Self { addresses, default }
	}

	/// Creates a geocoder that resolves every address to one coordinate.
	pub fn with_default(default: Coordinates) -> Self {
		Self::new(HashMap::new(), Some(default))
	}
}

#[async_trait]
impl GeocodeInterface for FixedGeocoder {
	async fn geocode(&self, address: &str) -> Result<Coordinates, IntakeError> {
		self.addresses
			.get(address)
			.copied()
			.or(self.default)
			.ok_or_else(|| IntakeError::Geocode(format!("unknown address: {}", address)))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FixedGeocoderSchema)
	}
}

/// Configuration schema for FixedGeocoder.
pub struct FixedGeocoderSchema;

impl ConfigSchema for FixedGeocoderSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// The address table is free-form; only the shape of entries is
		// checked by the factory.
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry entry for the fixed geocoder.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "fixed";
	type Factory = GeocodeFactory;

	fn factory() -> Self::Factory {
		create_geocoder
	}
}

impl crate::GeocodeRegistry for Registry {}

fn parse_pair(value: &toml::Value) -> Option<Coordinates> {
	let pair = value.as_array()?;
	if pair.len() != 2 {
		return None;
	}
	Some(Coordinates {
		latitude: pair[0].as_float()?,
		longitude: pair[1].as_float()?,
	})
}

/// Factory function to create a fixed geocoder from configuration.
///
/// Configuration parameters:
/// - `default`: fallback `[lat, lon]` pair for unlisted addresses
/// - `[..addresses]`: table of address string to `[lat, lon]` pair
pub fn create_geocoder(config: &toml::Value) -> Result<Box<dyn GeocodeInterface>, IntakeError> {
	let default = match config.get("default") {
		Some(value) => Some(parse_pair(value).ok_or_else(|| {
			IntakeError::Configuration("default must be a [lat, lon] pair".into())
		})?),
		None => None,
	};

	let mut addresses = HashMap::new();
	if let Some(table) = config.get("addresses").and_then(|v| v.as_table()) {
		for (address, value) in table {
			let coords = parse_pair(value).ok_or_else(|| {
				IntakeError::Configuration(format!(
					"address '{}' must map to a [lat, lon] pair",
					address
				))
			})?;
			addresses.insert(address.clone(), coords);
		}
	}

	Ok(Box::new(FixedGeocoder::new(addresses, default)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_lookup_and_fallback() {
		let config: toml::Value = toml::from_str(
			r#"
default = [40.7, -74.0]

[addresses]
"12 Spring St" = [40.72, -74.01]
"#,
		)
		.unwrap();

		let geocoder = create_geocoder(&config).unwrap();

		let hit = geocoder.geocode("12 Spring St").await.unwrap();
		assert_eq!(hit.latitude, 40.72);

		let miss = geocoder.geocode("99 Elsewhere Ave").await.unwrap();
		assert_eq!(miss.latitude, 40.7);
	}

	#[tokio::test]
	async fn test_unknown_address_without_fallback() {
		let geocoder = FixedGeocoder::new(HashMap::new(), None);
		assert!(matches!(
			geocoder.geocode("nowhere").await,
			Err(IntakeError::Geocode(_))
		));
	}
}
