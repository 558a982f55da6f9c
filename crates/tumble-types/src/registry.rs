//! Registry trait for self-registering implementations.
//!
//! Each pluggable implementation (storage backend, media store, notifier,
//! payment provider, geocoder) declares its configuration name and a
//! factory function through this trait, so the service binary can build
//! factory maps without hand-maintained name lists.

/// Base trait for implementation registries.
///
/// Each implementation module must provide a `Registry` struct that
/// implements this trait. The name must match the key used in the TOML
/// configuration, for example "memory" for
/// `storage.implementations.memory`.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
