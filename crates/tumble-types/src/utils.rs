//! Utility functions shared across crates.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current unix timestamp in seconds.
pub fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}

/// Derives the human-readable order number from an order id.
///
/// Customers see the last 8 characters of the opaque id, upper-cased.
pub fn order_number(id: &str) -> String {
	let tail = if id.len() <= 8 { id } else { &id[id.len() - 8..] };
	tail.to_uppercase()
}

/// Truncates an order id for display in logs.
///
/// Shows only the first 8 characters followed by ".." for longer ids.
pub fn short_order_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_order_number_uses_id_tail() {
		assert_eq!(order_number("4f9a02cd-77aa-4f05-9c2b-1d2e3f4a5b6c"), "3F4A5B6C");
		assert_eq!(order_number("abc"), "ABC");
	}

	#[test]
	fn test_short_order_id() {
		assert_eq!(short_order_id("abcdef"), "abcdef");
		assert_eq!(short_order_id("abcdefghij"), "abcdefgh..");
	}
}
