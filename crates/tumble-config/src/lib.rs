//! Configuration module for the Tumble fulfillment system.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files with
//! `${VAR}` environment-variable resolution and validates that every
//! section references implementations that actually exist before the
//! service starts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the Tumble service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for photo storage.
	pub media: ImplementationSection,
	/// Configuration for customer notifications.
	pub notify: NotifyConfig,
	/// Configuration for the order intake flow.
	pub intake: IntakeConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance.
	pub id: String,
	/// Maximum orders an operator may hold in non-terminal states.
	#[serde(default = "default_max_active_orders")]
	pub max_active_orders: usize,
}

/// Returns the default operator concurrent-order cap.
fn default_max_active_orders() -> usize {
	5
}

/// A generic implementation-selection section.
///
/// Each pluggable service picks a primary implementation from a map of
/// raw per-implementation TOML configurations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImplementationSection {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

impl ImplementationSection {
	/// Returns the raw configuration of the primary implementation.
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

/// Returns the default storage cleanup interval in seconds.
fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Configuration for customer notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
	/// Which dispatcher implementation to use as primary.
	pub primary: String,
	/// Map of dispatcher implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Outbox worker settings.
	#[serde(default)]
	pub outbox: OutboxConfig,
}

/// Settings for the durable notification outbox.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutboxConfig {
	/// How often the drain worker wakes up, in seconds.
	#[serde(default = "default_outbox_poll_seconds")]
	pub poll_seconds: u64,
	/// Delivery attempts before an entry is abandoned.
	#[serde(default = "default_outbox_max_attempts")]
	pub max_attempts: u32,
	/// Base delay for exponential retry backoff, in seconds.
	#[serde(default = "default_outbox_base_delay_seconds")]
	pub base_delay_seconds: u64,
}

impl Default for OutboxConfig {
	fn default() -> Self {
		Self {
			poll_seconds: default_outbox_poll_seconds(),
			max_attempts: default_outbox_max_attempts(),
			base_delay_seconds: default_outbox_base_delay_seconds(),
		}
	}
}

fn default_outbox_poll_seconds() -> u64 {
	5
}

fn default_outbox_max_attempts() -> u32 {
	8
}

fn default_outbox_base_delay_seconds() -> u64 {
	5
}

/// Configuration for the order intake flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntakeConfig {
	/// Marketplace share of the post-discount total, in basis points.
	#[serde(default = "default_business_cut_bps")]
	pub business_cut_bps: u32,
	/// Geocoding provider selection.
	pub geocode: ImplementationSection,
	/// Payment provider selection.
	pub payment: ImplementationSection,
}

/// Returns the default marketplace cut in basis points (25%).
fn default_business_cut_bps() -> u32 {
	2500
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable
/// VAR_NAME. Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).expect("capture 0 always present");
		let var_name = cap.get(1).expect("capture 1 always present").as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

fn validate_section(
	section_name: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section_name
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section_name
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section_name, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let raw = tokio::fs::read_to_string(path).await?;
		raw.parse()
	}

	/// Validates the configuration to ensure all required fields are
	/// properly set.
	///
	/// Checks that the service id is present, every pluggable section
	/// selects an implementation that exists, and interval/limit values
	/// are within sane bounds.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}
		if self.service.max_active_orders == 0 {
			return Err(ConfigError::Validation(
				"max_active_orders must be at least 1".into(),
			));
		}

		validate_section("storage", &self.storage.primary, &self.storage.implementations)?;
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		validate_section("media", &self.media.primary, &self.media.implementations)?;
		validate_section("notify", &self.notify.primary, &self.notify.implementations)?;

		if self.notify.outbox.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"Outbox max_attempts must be at least 1".into(),
			));
		}
		if self.notify.outbox.poll_seconds == 0 {
			return Err(ConfigError::Validation(
				"Outbox poll_seconds must be greater than 0".into(),
			));
		}

		if self.intake.business_cut_bps > 10_000 {
			return Err(ConfigError::Validation(
				"business_cut_bps cannot exceed 10000".into(),
			));
		}
		validate_section(
			"geocode",
			&self.intake.geocode.primary,
			&self.intake.geocode.implementations,
		)?;
		validate_section(
			"payment",
			&self.intake.payment.primary,
			&self.intake.payment.implementations,
		)?;

		Ok(())
	}
}

/// Implementation of FromStr for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is
/// automatically validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[service]
id = "tumble-dev"

[storage]
primary = "memory"
[storage.implementations.memory]

[media]
primary = "memory"
[media.implementations.memory]

[notify]
primary = "log"
[notify.implementations.log]

[intake.geocode]
primary = "fixed"
[intake.geocode.implementations.fixed]
default = [40.7, -74.0]

[intake.payment]
primary = "offline"
[intake.payment.implementations.offline]
"#;

	#[test]
	fn test_parse_minimal_config() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.service.id, "tumble-dev");
		assert_eq!(config.service.max_active_orders, 5);
		assert_eq!(config.storage.cleanup_interval_seconds, 3600);
		assert_eq!(config.notify.outbox.max_attempts, 8);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_TUMBLE_HOST", "localhost");
		std::env::set_var("TEST_TUMBLE_PORT", "5432");

		let input = "host = \"${TEST_TUMBLE_HOST}:${TEST_TUMBLE_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("TEST_TUMBLE_HOST");
		std::env::remove_var("TEST_TUMBLE_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_TUMBLE_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_TUMBLE_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_TUMBLE_VAR"));
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("TEST_TUMBLE_SERVICE_ID", "tumble-test");

		let config_str = BASE_CONFIG.replace("\"tumble-dev\"", "\"${TEST_TUMBLE_SERVICE_ID}\"");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.service.id, "tumble-test");

		std::env::remove_var("TEST_TUMBLE_SERVICE_ID");
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let config_str = BASE_CONFIG.replace(
			"[storage]\nprimary = \"memory\"",
			"[storage]\nprimary = \"redis\"",
		);
		let result: Result<Config, _> = config_str.parse();
		let err = result.unwrap_err();
		assert!(err.to_string().contains("Primary storage 'redis' not found"));
	}

	#[test]
	fn test_zero_cleanup_interval_rejected() {
		let config_str = BASE_CONFIG.replace(
			"[storage]\nprimary = \"memory\"",
			"[storage]\nprimary = \"memory\"\ncleanup_interval_seconds = 0",
		);
		let result: Result<Config, _> = config_str.parse();
		assert!(result.is_err());
	}

	#[test]
	fn test_excessive_business_cut_rejected() {
		let config_str = format!("{}\n[intake]\nbusiness_cut_bps = 10001\n", BASE_CONFIG);
		let result: Result<Config, _> = config_str.parse();
		assert!(result.is_err());
	}
}
