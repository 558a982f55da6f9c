//! Main entry point for the Tumble fulfillment service.
//!
//! This binary provides a complete marketplace fulfillment implementation
//! that places, claims, and works customer laundry orders through the
//! 13-step checklist. It uses a modular architecture with pluggable
//! implementations for storage, media, notifications, geocoding, and
//! payments.

use clap::Parser;
use tumble_config::Config;
use tumble_core::{EngineError, FulfillmentBuilder, FulfillmentEngine};
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Command-line arguments for the fulfillment service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the fulfillment service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the fulfillment engine with all implementations
/// 5. Runs the engine (and API server, when enabled) until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started tumble");

	// Load configuration
	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	// Build the engine with all implementations registered
	let api_config = config.api.clone();
	let engine = Arc::new(build_engine(config)?);

	let api_enabled = api_config.as_ref().is_some_and(|api| api.enabled);

	if api_enabled {
		let api_config = api_config.expect("checked above");
		let api_engine = Arc::clone(&engine);

		// Run the engine loop and the API server concurrently
		tokio::select! {
			result = engine.run() => {
				tracing::info!("Engine finished");
				result?;
			}
			result = server::start_server(api_config, api_engine) => {
				tracing::info!("API server finished");
				result?;
			}
		}
	} else {
		tracing::info!("Starting engine only");
		engine.run().await?;
	}

	tracing::info!("Stopped tumble");
	Ok(())
}

/// Builds the fulfillment engine with all necessary implementations.
///
/// This function registers the concrete implementations shipped by the
/// individual crates (storage backends, media stores, notification
/// dispatchers, geocoders, payment providers) and lets the builder select
/// and validate the ones named in the configuration.
fn build_engine(config: Config) -> Result<FulfillmentEngine, EngineError> {
	let mut builder = FulfillmentBuilder::new(config);

	for (name, factory) in tumble_storage::get_all_implementations() {
		builder = builder.with_storage_factory(name, factory);
	}
	for (name, factory) in tumble_media::get_all_implementations() {
		builder = builder.with_media_factory(name, factory);
	}
	for (name, factory) in tumble_notify::get_all_implementations() {
		builder = builder.with_notify_factory(name, factory);
	}
	for (name, factory) in tumble_intake::get_all_geocode_implementations() {
		builder = builder.with_geocode_factory(name, factory);
	}
	for (name, factory) in tumble_intake::get_all_payment_implementations() {
		builder = builder.with_payment_factory(name, factory);
	}

	builder.build()
}
