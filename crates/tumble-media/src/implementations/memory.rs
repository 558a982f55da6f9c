//! In-memory media backend for testing and development.

use crate::{MediaError, MediaFactory, MediaInterface};
use async_trait::async_trait;
use tumble_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory media implementation.
///
/// Objects live in a HashMap keyed by digest; nothing survives a restart.
pub struct MemoryMedia {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryMedia {
	/// Creates a new MemoryMedia instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryMedia {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl MediaInterface for MemoryMedia {
	async fn put_bytes(&self, digest: &str, bytes: &[u8]) -> Result<(), MediaError> {
		let mut store = self.store.write().await;
		store.insert(digest.to_string(), bytes.to_vec());
		Ok(())
	}

	async fn get_bytes(&self, digest: &str) -> Result<Vec<u8>, MediaError> {
		let store = self.store.read().await;
		store.get(digest).cloned().ok_or(MediaError::NotFound)
	}

	async fn exists(&self, digest: &str) -> Result<bool, MediaError> {
		let store = self.store.read().await;
		Ok(store.contains_key(digest))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryMediaSchema)
	}
}

/// Configuration schema for MemoryMedia.
pub struct MemoryMediaSchema;

impl ConfigSchema for MemoryMediaSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory media has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry entry for the memory media backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = MediaFactory;

	fn factory() -> Self::Factory {
		create_media
	}
}

impl crate::MediaRegistry for Registry {}

/// Factory function to create a memory media backend from configuration.
pub fn create_media(_config: &toml::Value) -> Result<Box<dyn MediaInterface>, MediaError> {
	Ok(Box::new(MemoryMedia::new()))
}
