//! Order state machine implementation.
//!
//! Manages order state transitions with validation, ensuring orders move
//! through valid lifecycle states: Placed -> Unclaimed -> Claimed(1..13)
//! -> Completed, with Cancelled reachable from any non-terminal state.
//! Every mutation is a compare-and-swap against the bytes the caller
//! read, so concurrent writers resolve to exactly one winner and the
//! step counter can never move backwards or skip.

use tumble_storage::{StorageError, StorageService};
use tumble_types::{FulfillmentState, Order, StepNumber, StorageTable};
use std::sync::Arc;
use thiserror::Error;

/// Upper bound on CAS retries for index maintenance.
const MAX_CAS_RETRIES: usize = 16;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: String, to: String },
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Concurrent modification on {0}")]
	Contention(String),
}

impl OrderStateError {
	fn from_storage(order_id: &str, err: StorageError) -> Self {
		match err {
			StorageError::NotFound => OrderStateError::OrderNotFound(order_id.to_string()),
			other => OrderStateError::Storage(other.to_string()),
		}
	}
}

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Checks if a state transition is valid.
	///
	/// Beyond the coarse lifecycle ordering this enforces the step
	/// refinements: claims start at step 1, the step counter advances by
	/// exactly one, and only the terminal step reaches Completed.
	pub fn is_valid_transition(from: &FulfillmentState, to: &FulfillmentState) -> bool {
		use FulfillmentState::*;

		match (from, to) {
			(Placed, Unclaimed) => true,
			(Placed, Cancelled) | (Unclaimed, Cancelled) | (Claimed { .. }, Cancelled) => true,
			(Placed, Claimed { step }) | (Unclaimed, Claimed { step }) => {
				*step == StepNumber::FIRST
			}
			(Claimed { step: a }, Claimed { step: b }) => b.get() == a.get() + 1,
			(Claimed { step }, Completed) => step.is_last(),
			_ => false,
		}
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderStateError> {
		self.storage
			.retrieve(StorageTable::Orders, order_id)
			.await
			.map_err(|e| OrderStateError::from_storage(order_id, e))
	}

	/// Stores a new order.
	pub async fn store_order(&self, order: &Order) -> Result<(), OrderStateError> {
		self.storage
			.store(StorageTable::Orders, &order.id, order)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}

	/// Validates and atomically applies a transition computed from a
	/// previously read order.
	///
	/// Returns `Ok(false)` when the stored order no longer matches
	/// `current`; the caller reloads and re-evaluates. An invalid
	/// transition is an error regardless of currency.
	pub async fn apply(&self, current: &Order, next: &Order) -> Result<bool, OrderStateError> {
		if !Self::is_valid_transition(&current.state, &next.state) {
			return Err(OrderStateError::InvalidTransition {
				from: current.status().to_string(),
				to: next.status().to_string(),
			});
		}

		self.storage
			.update_if(StorageTable::Orders, &current.id, current, next)
			.await
			.map_err(|e| OrderStateError::from_storage(&current.id, e))
	}

	/// Returns the ids of an operator's active orders.
	pub async fn active_orders(&self, washer_id: &str) -> Result<Vec<String>, OrderStateError> {
		match self
			.storage
			.retrieve::<Vec<String>>(StorageTable::ActiveByWasher, washer_id)
			.await
		{
			Ok(list) => Ok(list),
			Err(StorageError::NotFound) => Ok(Vec::new()),
			Err(e) => Err(OrderStateError::Storage(e.to_string())),
		}
	}

	/// Adds an order to an operator's active list.
	pub async fn add_active_order(
		&self,
		washer_id: &str,
		order_id: &str,
	) -> Result<(), OrderStateError> {
		for _ in 0..MAX_CAS_RETRIES {
			let current = self.active_orders(washer_id).await?;
			if current.iter().any(|id| id == order_id) {
				return Ok(());
			}

			let mut next = current.clone();
			next.push(order_id.to_string());

			let swapped = if current.is_empty() {
				// The list may not exist yet; creating and replacing an
				// empty list are distinct operations to the backend.
				match self
					.storage
					.insert_if_absent(StorageTable::ActiveByWasher, washer_id, &next)
					.await
				{
					Ok(true) => true,
					Ok(false) => self
						.storage
						.update_if(StorageTable::ActiveByWasher, washer_id, &current, &next)
						.await
						.map_err(|e| OrderStateError::Storage(e.to_string()))?,
					Err(e) => return Err(OrderStateError::Storage(e.to_string())),
				}
			} else {
				self.storage
					.update_if(StorageTable::ActiveByWasher, washer_id, &current, &next)
					.await
					.map_err(|e| OrderStateError::Storage(e.to_string()))?
			};

			if swapped {
				return Ok(());
			}
		}

		Err(OrderStateError::Contention(format!(
			"active list for {}",
			washer_id
		)))
	}

	/// Removes an order from an operator's active list.
	pub async fn remove_active_order(
		&self,
		washer_id: &str,
		order_id: &str,
	) -> Result<(), OrderStateError> {
		for _ in 0..MAX_CAS_RETRIES {
			let current = self.active_orders(washer_id).await?;
			if !current.iter().any(|id| id == order_id) {
				return Ok(());
			}

			let next: Vec<String> = current
				.iter()
				.filter(|id| id.as_str() != order_id)
				.cloned()
				.collect();

			let swapped = self
				.storage
				.update_if(StorageTable::ActiveByWasher, washer_id, &current, &next)
				.await
				.map_err(|e| OrderStateError::Storage(e.to_string()))?;

			if swapped {
				return Ok(());
			}
		}

		Err(OrderStateError::Contention(format!(
			"active list for {}",
			washer_id
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tumble_storage::implementations::memory::MemoryStorage;

	fn machine() -> OrderStateMachine {
		OrderStateMachine::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	fn claimed(step: u8) -> FulfillmentState {
		FulfillmentState::Claimed {
			step: StepNumber::new(step).unwrap(),
		}
	}

	#[test]
	fn test_transition_table() {
		use FulfillmentState::*;
		let valid = OrderStateMachine::is_valid_transition;

		assert!(valid(&Placed, &Unclaimed));
		assert!(valid(&Placed, &claimed(1)));
		assert!(valid(&Unclaimed, &claimed(1)));
		assert!(valid(&claimed(1), &claimed(2)));
		assert!(valid(&claimed(12), &claimed(13)));
		assert!(valid(&claimed(13), &Completed));
		assert!(valid(&claimed(7), &Cancelled));
		assert!(valid(&Unclaimed, &Cancelled));

		// No claims landing past step 1
		assert!(!valid(&Unclaimed, &claimed(2)));
		// No skipping, no going back
		assert!(!valid(&claimed(3), &claimed(5)));
		assert!(!valid(&claimed(3), &claimed(2)));
		assert!(!valid(&claimed(3), &claimed(3)));
		// Only the terminal step completes
		assert!(!valid(&claimed(12), &Completed));
		// Terminal states stay terminal
		assert!(!valid(&Completed, &Cancelled));
		assert!(!valid(&Cancelled, &Unclaimed));
		assert!(!valid(&Completed, &claimed(1)));
	}

	#[tokio::test]
	async fn test_active_list_round_trip() {
		let machine = machine();

		assert!(machine.active_orders("w1").await.unwrap().is_empty());

		machine.add_active_order("w1", "o1").await.unwrap();
		machine.add_active_order("w1", "o2").await.unwrap();
		// Re-adding is a no-op
		machine.add_active_order("w1", "o1").await.unwrap();
		assert_eq!(machine.active_orders("w1").await.unwrap(), vec!["o1", "o2"]);

		machine.remove_active_order("w1", "o1").await.unwrap();
		assert_eq!(machine.active_orders("w1").await.unwrap(), vec!["o2"]);
		// Removing an absent id is a no-op
		machine.remove_active_order("w1", "o9").await.unwrap();
	}
}
