//! In-memory storage backend implementation for the fulfillment service.
//!
//! This module provides a memory-based implementation of the
//! StorageInterface trait, useful for testing and development scenarios
//! where persistence is not required.

use crate::{StorageError, StorageFactory, StorageInterface};
use async_trait::async_trait;
use tumble_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// In-memory storage implementation.
///
/// This implementation stores data in a HashMap in memory, providing fast
/// access but no persistence across restarts. TTL is ignored. All writes,
/// including compare-and-swap, are serialized behind a single mutex so
/// conditional updates are atomic with respect to each other.
pub struct MemoryStorage {
	/// The in-memory store protected by a mutex.
	store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(Mutex::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.lock().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		_ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		// TTL is ignored for memory storage
		let mut store = self.store.lock().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.lock().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.lock().await;
		Ok(store.contains_key(key))
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		let mut store = self.store.lock().await;
		let current = store.get(key).map(|v| v.as_slice());
		if current != expected {
			return Ok(false);
		}
		store.insert(key.to_string(), value);
		Ok(true)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry entry for the memory storage backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "orders:test";
		let value = b"test_value".to_vec();
		storage.set_bytes(key, value.clone(), None).await.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_compare_and_swap_create() {
		let storage = MemoryStorage::new();

		// Creating against an absent key succeeds exactly once
		assert!(storage
			.compare_and_swap("k", None, b"first".to_vec())
			.await
			.unwrap());
		assert!(!storage
			.compare_and_swap("k", None, b"second".to_vec())
			.await
			.unwrap());
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"first");
	}

	#[tokio::test]
	async fn test_compare_and_swap_replace() {
		let storage = MemoryStorage::new();
		storage.set_bytes("k", b"v1".to_vec(), None).await.unwrap();

		// Stale expectation loses
		assert!(!storage
			.compare_and_swap("k", Some(b"v0"), b"v2".to_vec())
			.await
			.unwrap());
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"v1");

		// Current expectation wins
		assert!(storage
			.compare_and_swap("k", Some(b"v1"), b"v2".to_vec())
			.await
			.unwrap());
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"v2");
	}

	#[tokio::test]
	async fn test_compare_and_swap_single_winner() {
		let storage = Arc::new(MemoryStorage::new());
		storage.set_bytes("k", b"base".to_vec(), None).await.unwrap();

		let mut handles = Vec::new();
		for i in 0..8u8 {
			let storage = storage.clone();
			handles.push(tokio::spawn(async move {
				storage
					.compare_and_swap("k", Some(b"base"), vec![i])
					.await
					.unwrap()
			}));
		}

		let mut winners = 0;
		for handle in handles {
			if handle.await.unwrap() {
				winners += 1;
			}
		}
		assert_eq!(winners, 1);
	}
}
