//! Order pricing.
//!
//! All amounts are integer cents. The split is computed once at placement
//! and never touched by the workflow engine afterwards.

use crate::IntakeError;
use serde::{Deserialize, Serialize};
use tumble_types::ServiceType;

/// Basis points denominator for the business-cut split.
const BPS_DENOMINATOR: u64 = 10_000;

/// Pricing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
	/// Marketplace share of the post-discount total, in basis points.
	pub business_cut_bps: u32,
}

impl Default for PricingConfig {
	fn default() -> Self {
		Self {
			business_cut_bps: 2_500,
		}
	}
}

/// The computed commercial split for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
	pub total_amount_cents: u64,
	pub discount_amount_cents: u64,
	pub business_cut_cents: u64,
	pub operator_payout_cents: u64,
}

/// Per-bag base price in cents for each service type.
pub fn base_price_cents(service: ServiceType) -> u64 {
	match service {
		ServiceType::WashFold => 2_495,
		ServiceType::DelicatesAirdry => 2_995,
		ServiceType::WashHangDry => 2_795,
		ServiceType::Express => 3_495,
	}
}

/// Computes the commercial split for an order.
///
/// The express surcharge adds 50% when express turnaround is requested on
/// a service that is not already express-priced. The discount must not
/// exceed the surcharged total. Integer division on the business cut
/// rounds in the operator's favor; payout + cut always equals the
/// post-discount total.
pub fn quote(
	service: ServiceType,
	is_express: bool,
	bag_count: u32,
	discount_cents: u64,
	config: &PricingConfig,
) -> Result<Quote, IntakeError> {
	if bag_count == 0 {
		return Err(IntakeError::Validation(
			"order must contain at least one bag".into(),
		));
	}
	if config.business_cut_bps as u64 > BPS_DENOMINATOR {
		return Err(IntakeError::Configuration(
			"business_cut_bps cannot exceed 10000".into(),
		));
	}

	let mut total = base_price_cents(service) * bag_count as u64;
	if is_express && service != ServiceType::Express {
		total += total / 2;
	}

	if discount_cents > total {
		return Err(IntakeError::Validation(format!(
			"discount {} exceeds order total {}",
			discount_cents, total
		)));
	}

	let net = total - discount_cents;
	let business_cut = net * config.business_cut_bps as u64 / BPS_DENOMINATOR;
	let payout = net - business_cut;

	Ok(Quote {
		total_amount_cents: total,
		discount_amount_cents: discount_cents,
		business_cut_cents: business_cut,
		operator_payout_cents: payout,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_basic_split() {
		let q = quote(ServiceType::WashFold, false, 2, 0, &PricingConfig::default()).unwrap();
		assert_eq!(q.total_amount_cents, 4_990);
		assert_eq!(q.business_cut_cents, 1_247);
		assert_eq!(q.operator_payout_cents, 3_743);
		assert_eq!(
			q.business_cut_cents + q.operator_payout_cents,
			q.total_amount_cents - q.discount_amount_cents
		);
	}

	#[test]
	fn test_express_surcharge() {
		let q = quote(ServiceType::WashFold, true, 1, 0, &PricingConfig::default()).unwrap();
		assert_eq!(q.total_amount_cents, 2_495 + 1_247);

		// Express-priced service carries no extra surcharge
		let q = quote(ServiceType::Express, true, 1, 0, &PricingConfig::default()).unwrap();
		assert_eq!(q.total_amount_cents, 3_495);
	}

	#[test]
	fn test_discount_bounds() {
		let q = quote(ServiceType::WashFold, false, 1, 2_495, &PricingConfig::default()).unwrap();
		assert_eq!(q.total_amount_cents, 2_495);
		assert_eq!(q.business_cut_cents, 0);
		assert_eq!(q.operator_payout_cents, 0);

		assert!(matches!(
			quote(ServiceType::WashFold, false, 1, 2_496, &PricingConfig::default()),
			Err(IntakeError::Validation(_))
		));
	}

	#[test]
	fn test_zero_bags_rejected() {
		assert!(matches!(
			quote(ServiceType::WashFold, false, 0, 0, &PricingConfig::default()),
			Err(IntakeError::Validation(_))
		));
	}

	#[test]
	fn test_split_is_exact_across_remainders() {
		let config = PricingConfig {
			business_cut_bps: 3_333,
		};
		for bags in 1..=5u32 {
			let q = quote(ServiceType::WashHangDry, false, bags, 199, &config).unwrap();
			assert_eq!(
				q.business_cut_cents + q.operator_payout_cents,
				q.total_amount_cents - q.discount_amount_cents
			);
		}
	}
}
