//! The canonical 13-step fulfillment checklist.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tumble_types::{Order, StepNumber};

/// Which address a step's navigation map points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTarget {
	/// Navigate to the pickup address.
	Pickup,
	/// Navigate to the delivery address, falling back to the pickup
	/// address when the order has no separate one.
	Delivery,
}

impl NavigationTarget {
	/// Resolves the concrete address for an order.
	pub fn resolved_address<'a>(&self, order: &'a Order) -> &'a str {
		match self {
			NavigationTarget::Pickup => &order.pickup_address,
			NavigationTarget::Delivery => order.delivery_target(),
		}
	}
}

/// One step of the fulfillment checklist.
#[derive(Debug, Clone, Serialize)]
pub struct StepDefinition {
	/// Position in the checklist.
	pub number: StepNumber,
	/// Short title shown in the operator's step list.
	pub title: &'static str,
	/// One-line summary of the step.
	pub description: &'static str,
	/// Detailed instructions shown when the step is active.
	pub instructions: &'static str,
	/// Whether completion requires a stored photo reference.
	pub requires_photo: bool,
	/// Whether completion requires a positive bag count.
	pub requires_bag_count: bool,
	/// Navigation target shown while the step is active.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub navigation: Option<NavigationTarget>,
}

struct StepSpec {
	title: &'static str,
	description: &'static str,
	instructions: &'static str,
	requires_photo: bool,
	requires_bag_count: bool,
	navigation: Option<NavigationTarget>,
}

const fn plain(
	title: &'static str,
	description: &'static str,
	instructions: &'static str,
) -> StepSpec {
	StepSpec {
		title,
		description,
		instructions,
		requires_photo: false,
		requires_bag_count: false,
		navigation: None,
	}
}

const fn with_nav(target: NavigationTarget, spec: StepSpec) -> StepSpec {
	StepSpec {
		navigation: Some(target),
		title: spec.title,
		description: spec.description,
		instructions: spec.instructions,
		requires_photo: spec.requires_photo,
		requires_bag_count: spec.requires_bag_count,
	}
}

const fn with_photo(spec: StepSpec) -> StepSpec {
	StepSpec {
		requires_photo: true,
		title: spec.title,
		description: spec.description,
		instructions: spec.instructions,
		requires_bag_count: spec.requires_bag_count,
		navigation: spec.navigation,
	}
}

const fn with_bag_count(spec: StepSpec) -> StepSpec {
	StepSpec {
		requires_bag_count: true,
		title: spec.title,
		description: spec.description,
		instructions: spec.instructions,
		requires_photo: spec.requires_photo,
		navigation: spec.navigation,
	}
}

/// Raw step data, in checklist order. Exactly steps 4 and 13 are
/// photo-gated and exactly step 3 takes the bag count; everything else in
/// the system derives gating from this table.
static STEP_SPECS: [StepSpec; 13] = [
	with_nav(
		NavigationTarget::Pickup,
		plain(
			"Head to pickup",
			"Drive to the customer's pickup location.",
			"Use the map to reach the pickup address. For locker orders, the locker id is shown on the order card.",
		),
	),
	plain(
		"Collect bags",
		"Collect every laundry bag left by the customer.",
		"Check the drop-off spot or locker for all bags before leaving. Contact support if nothing is there.",
	),
	with_bag_count(plain(
		"Confirm bag count",
		"Count the bags you collected.",
		"Enter the number of bags. The customer is charged per bag, so count carefully.",
	)),
	with_photo(plain(
		"Label bags",
		"Attach an order label to each bag and photograph them.",
		"Write the order number on each label. Take one photo showing every labeled bag.",
	)),
	plain(
		"Load vehicle",
		"Load the labeled bags into your vehicle.",
		"Keep delicates bags separate from standard wash loads.",
	),
	plain(
		"Drive to facility",
		"Transport the laundry to your wash facility.",
		"Bags must not be left unattended in the vehicle overnight.",
	),
	plain(
		"Start wash",
		"Sort the laundry and start the wash.",
		"Follow the service type on the order: delicates and hang-dry items use the gentle cycle.",
	),
	plain(
		"Move to dryers",
		"Move washed laundry to the dryers or drying racks.",
		"Air-dry and hang-dry services skip the machine dryer; use racks instead.",
	),
	plain(
		"Fold and package",
		"Fold everything and pack it back into the bags.",
		"Fold to the standard shown in training. Check pockets and drum for stray items.",
	),
	plain(
		"Relabel for delivery",
		"Replace pickup labels with delivery labels.",
		"Each bag gets a fresh label with the order number and drop-off address.",
	),
	with_nav(
		NavigationTarget::Delivery,
		plain(
			"Load for delivery",
			"Load the finished order and head to the drop-off address.",
			"Deliver express orders first when carrying multiple orders.",
		),
	),
	with_nav(
		NavigationTarget::Delivery,
		plain(
			"Deliver bags",
			"Leave the bags at the drop-off spot or locker.",
			"Follow any drop-off notes on the order. Ring or knock only if the notes ask for it.",
		),
	),
	with_photo(plain(
		"Confirm handoff",
		"Photograph the delivered bags to close out the order.",
		"Take one photo clearly showing the bags at the drop-off spot. This completes the order.",
	)),
];

static STEPS: Lazy<Vec<StepDefinition>> = Lazy::new(|| {
	StepNumber::all()
		.zip(STEP_SPECS.iter())
		.map(|(number, spec)| StepDefinition {
			number,
			title: spec.title,
			description: spec.description,
			instructions: spec.instructions,
			requires_photo: spec.requires_photo,
			requires_bag_count: spec.requires_bag_count,
			navigation: spec.navigation,
		})
		.collect()
});

/// Returns the full checklist in order.
pub fn steps() -> &'static [StepDefinition] {
	&STEPS
}

/// Looks up the definition for a step number.
pub fn step(number: StepNumber) -> &'static StepDefinition {
	// StepNumber is range-checked at construction, the index is always valid
	&STEPS[(number.get() - 1) as usize]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_table_shape() {
		let steps = steps();
		assert_eq!(steps.len(), 13);
		for (i, def) in steps.iter().enumerate() {
			assert_eq!(def.number.get() as usize, i + 1);
		}
	}

	#[test]
	fn test_gating_is_canonical() {
		let photo_steps: Vec<u8> = steps()
			.iter()
			.filter(|d| d.requires_photo)
			.map(|d| d.number.get())
			.collect();
		assert_eq!(photo_steps, vec![4, 13]);

		let bag_count_steps: Vec<u8> = steps()
			.iter()
			.filter(|d| d.requires_bag_count)
			.map(|d| d.number.get())
			.collect();
		assert_eq!(bag_count_steps, vec![3]);
	}

	#[test]
	fn test_no_step_is_double_gated() {
		for def in steps() {
			assert!(
				!(def.requires_photo && def.requires_bag_count),
				"step {} gates on two evidence kinds",
				def.number
			);
		}
	}

	#[test]
	fn test_navigation_targets() {
		assert_eq!(
			step(StepNumber::FIRST).navigation,
			Some(NavigationTarget::Pickup)
		);
		assert_eq!(
			step(StepNumber::new(11).unwrap()).navigation,
			Some(NavigationTarget::Delivery)
		);
		assert_eq!(
			step(StepNumber::new(12).unwrap()).navigation,
			Some(NavigationTarget::Delivery)
		);
		assert_eq!(step(StepNumber::LAST).navigation, None);
	}

	#[test]
	fn test_navigation_resolves_delivery_fallback() {
		use tumble_types::{FulfillmentState, PickupType, ServiceType};

		let mut order = Order {
			id: "o1".into(),
			customer_id: "c1".into(),
			pickup_type: PickupType::PickupDelivery,
			service_type: ServiceType::WashFold,
			is_express: false,
			washer_id: None,
			state: FulfillmentState::Unclaimed,
			step_photos: Default::default(),
			bag_count: None,
			total_amount_cents: 2_495,
			discount_amount_cents: 0,
			business_cut_cents: 623,
			operator_payout_cents: 1_872,
			created_at: 0,
			updated_at: 0,
			claimed_at: None,
			completed_at: None,
			pickup_address: "12 Spring St".into(),
			delivery_address: None,
			zip_code: "07030".into(),
			locker_id: None,
		};

		assert_eq!(
			NavigationTarget::Delivery.resolved_address(&order),
			"12 Spring St"
		);
		order.delivery_address = Some("98 Willow Ave".into());
		assert_eq!(
			NavigationTarget::Delivery.resolved_address(&order),
			"98 Willow Ave"
		);
	}
}
