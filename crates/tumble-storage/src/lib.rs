//! Storage module for the Tumble fulfillment system.
//!
//! This module provides abstractions for persistent storage of order and
//! workflow data, supporting different backend implementations such as
//! in-memory or file-based stores. Beyond plain key-value operations the
//! interface exposes a compare-and-swap primitive; claim arbitration and
//! all state-machine writes are built on it, so two clients racing on the
//! same record resolve to exactly one winner without in-process locks.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tumble_types::{ConfigSchema, ImplementationRegistry, StorageTable};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the fulfillment system. It provides basic key-value
/// operations with optional TTL support plus an atomic conditional write.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Atomically writes `value` only if the currently stored bytes equal
	/// `expected` (`None` means the key must not exist).
	///
	/// Returns `Ok(true)` when the write happened and `Ok(false)` when the
	/// comparison failed. Backends must guarantee that the compare and the
	/// swap are not interleaved with other writers.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from storage (optional operation).
	/// Returns the number of entries removed.
	/// Implementations that don't support expiration can return Ok(0).
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must
/// provide to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage
/// implementations, used by the service binary to build its factory map.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic JSON serialization. Keys are formed as `table:id`.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(table: StorageTable, id: &str) -> String {
		format!("{}:{}", table.as_str(), id)
	}

	fn to_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
		serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Stores a serializable value with optional time-to-live.
	pub async fn store_with_ttl<T: Serialize>(
		&self,
		table: StorageTable,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.backend
			.set_bytes(&Self::key(table, id), Self::to_bytes(data)?, ttl)
			.await
	}

	/// Stores a serializable value without time-to-live.
	pub async fn store<T: Serialize>(
		&self,
		table: StorageTable,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(table, id, data, None).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		table: StorageTable,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(table, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Removes a value from storage.
	pub async fn remove(&self, table: StorageTable, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(table, id)).await
	}

	/// Updates an existing value in storage.
	///
	/// Returns an error if the key doesn't exist, making it semantically
	/// different from store() which will create or overwrite.
	pub async fn update<T: Serialize>(
		&self,
		table: StorageTable,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::key(table, id);
		if !self.backend.exists(&key).await? {
			return Err(StorageError::NotFound);
		}
		self.backend
			.set_bytes(&key, Self::to_bytes(data)?, None)
			.await
	}

	/// Conditionally replaces a value, comparing against its expected
	/// current contents.
	///
	/// The expected value is re-serialized and compared byte-for-byte
	/// against the stored bytes; since both sides come from the same
	/// serializer this is an exact currency check. Returns `Ok(false)`
	/// when another writer got there first.
	pub async fn update_if<T: Serialize>(
		&self,
		table: StorageTable,
		id: &str,
		expected: &T,
		data: &T,
	) -> Result<bool, StorageError> {
		let expected_bytes = Self::to_bytes(expected)?;
		self.backend
			.compare_and_swap(
				&Self::key(table, id),
				Some(&expected_bytes),
				Self::to_bytes(data)?,
			)
			.await
	}

	/// Stores a value only if the key does not exist yet.
	///
	/// Returns `Ok(false)` when the key was already present.
	pub async fn insert_if_absent<T: Serialize>(
		&self,
		table: StorageTable,
		id: &str,
		data: &T,
	) -> Result<bool, StorageError> {
		self.backend
			.compare_and_swap(&Self::key(table, id), None, Self::to_bytes(data)?)
			.await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, table: StorageTable, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(table, id)).await
	}

	/// Removes expired entries from storage.
	///
	/// Returns the number of entries that were removed.
	/// This is a no-op for backends that don't support TTL.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}
