//! Storage-related types for the fulfillment system.

use std::str::FromStr;

/// Storage tables for different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTable {
	/// Table for order records.
	Orders,
	/// Table mapping operator ids to their active order-id lists.
	ActiveByWasher,
	/// Table for pending notification outbox entries.
	Outbox,
	/// Table holding the outbox drain index.
	OutboxIndex,
}

impl StorageTable {
	/// Returns the string representation of the storage table.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageTable::Orders => "orders",
			StorageTable::ActiveByWasher => "active_by_washer",
			StorageTable::Outbox => "outbox",
			StorageTable::OutboxIndex => "outbox_index",
		}
	}

	/// Returns an iterator over all StorageTable variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::ActiveByWasher,
			Self::Outbox,
			Self::OutboxIndex,
		]
		.into_iter()
	}
}

impl FromStr for StorageTable {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"active_by_washer" => Ok(Self::ActiveByWasher),
			"outbox" => Ok(Self::Outbox),
			"outbox_index" => Ok(Self::OutboxIndex),
			_ => Err(()),
		}
	}
}

impl From<StorageTable> for &'static str {
	fn from(table: StorageTable) -> Self {
		table.as_str()
	}
}
