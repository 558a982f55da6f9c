//! End-to-end tests for the fulfillment engine: claim arbitration, step
//! progression, evidence gating, and milestone notifications.

use tumble_core::{EngineError, FulfillmentBuilder, FulfillmentEngine, StepOutcome};
use tumble_intake::NewOrder;
use tumble_types::{
	FulfillmentEvent, FulfillmentState, NotificationStatus, NotifyEvent, Order, OrderStatus,
	PhotoRef, PickupType, ServiceType, StepNumber,
};
use tumble_workflow::StepEvidence;
use std::sync::Arc;
use tokio::sync::broadcast;

const TEST_CONFIG: &str = r#"
[service]
id = "tumble-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[media]
primary = "memory"
[media.implementations.memory]

[notify]
primary = "log"
[notify.implementations.log]
[notify.outbox]
poll_seconds = 1
max_attempts = 3
base_delay_seconds = 0

[intake.geocode]
primary = "fixed"
[intake.geocode.implementations.fixed]
default = [40.7, -74.0]

[intake.payment]
primary = "offline"
[intake.payment.implementations.offline]
"#;

fn engine() -> FulfillmentEngine {
	let config = TEST_CONFIG.parse().expect("test config parses");
	FulfillmentBuilder::new(config)
		.with_all_implementations()
		.build()
		.expect("engine builds")
}

fn free_order_request() -> NewOrder {
	NewOrder {
		customer_id: "cust-1".into(),
		pickup_type: PickupType::PickupDelivery,
		service_type: ServiceType::WashFold,
		is_express: false,
		bag_estimate: 1,
		// Full discount: the order is free and lists immediately
		discount_cents: 2_495,
		pickup_address: "12 Spring St".into(),
		delivery_address: Some("98 Willow Ave".into()),
		zip_code: "07030".into(),
		locker_id: None,
	}
}

async fn place_free_order(engine: &FulfillmentEngine) -> Order {
	let placed = engine
		.place_order(free_order_request())
		.await
		.expect("order places");
	assert_eq!(placed.order.state, FulfillmentState::Unclaimed);
	placed.order
}

fn step(n: u8) -> StepNumber {
	StepNumber::new(n).expect("valid step")
}

/// Completes one step with whatever evidence its definition demands.
async fn complete_with_required_evidence(
	engine: &FulfillmentEngine,
	order_id: &str,
	washer_id: &str,
	n: u8,
) -> StepOutcome {
	let definition = tumble_workflow::step(step(n));
	let evidence = if definition.requires_photo {
		let photo = engine
			.store_photo(format!("photo for step {}", n).as_bytes())
			.await
			.expect("photo stores");
		StepEvidence::Photo { photo }
	} else if definition.requires_bag_count {
		StepEvidence::BagCount { count: 2 }
	} else {
		StepEvidence::None
	};

	engine
		.complete_step(order_id, washer_id, step(n), evidence)
		.await
		.expect("step completes")
}

fn queued_statuses(
	events: &mut broadcast::Receiver<FulfillmentEvent>,
) -> Vec<NotificationStatus> {
	let mut statuses = Vec::new();
	while let Ok(event) = events.try_recv() {
		if let FulfillmentEvent::Notify(NotifyEvent::Queued { status, .. }) = event {
			statuses.push(status);
		}
	}
	statuses
}

#[tokio::test]
async fn test_end_to_end_fulfillment() {
	let engine = engine();
	let mut events = engine.event_bus().subscribe();

	let order = place_free_order(&engine).await;

	let claimed = engine.claim(&order.id, "washer-a").await.unwrap();
	assert_eq!(claimed.washer_id.as_deref(), Some("washer-a"));
	assert_eq!(claimed.current_step(), Some(StepNumber::FIRST));
	assert_eq!(claimed.status(), OrderStatus::Claimed);
	assert!(claimed.claimed_at.is_some());

	let mut last = None;
	for n in 1..=13 {
		last = Some(complete_with_required_evidence(&engine, &order.id, "washer-a", n).await);
	}

	let completed = match last {
		Some(StepOutcome::Completed(order)) => order,
		other => panic!("expected completion, got {:?}", other),
	};
	assert_eq!(completed.state, FulfillmentState::Completed);
	assert_eq!(completed.status(), OrderStatus::Completed);
	assert_eq!(completed.bag_count, Some(2));
	assert!(completed.completed_at.is_some());
	assert!(completed.created_at <= completed.claimed_at.unwrap());
	assert!(completed.claimed_at.unwrap() <= completed.completed_at.unwrap());

	// Exactly the two photo-gated steps left evidence
	let photo_steps: Vec<u8> = completed.step_photos.keys().copied().collect();
	assert_eq!(photo_steps, vec![4, 13]);

	// The operator's slate is clean again
	let reclaim_pool = engine.claim(&completed.id, "washer-a").await;
	assert!(matches!(reclaim_pool, Err(EngineError::OrderUnavailable)));

	// Milestones in order: claim, then 7, 8, 9, 10, 12, terminal
	let statuses = queued_statuses(&mut events);
	assert_eq!(
		statuses,
		vec![
			NotificationStatus::Claimed,
			NotificationStatus::PickedUp,
			NotificationStatus::Washing,
			NotificationStatus::Drying,
			NotificationStatus::Folded,
			NotificationStatus::Delivered,
			NotificationStatus::Completed,
		]
	);
}

#[tokio::test]
async fn test_exclusive_claim_under_race() {
	let engine = Arc::new(engine());
	let order = place_free_order(&engine).await;

	let first = {
		let engine = engine.clone();
		let order_id = order.id.clone();
		tokio::spawn(async move { engine.claim(&order_id, "washer-a").await })
	};
	let second = {
		let engine = engine.clone();
		let order_id = order.id.clone();
		tokio::spawn(async move { engine.claim(&order_id, "washer-b").await })
	};

	let results = [first.await.unwrap(), second.await.unwrap()];
	let winners = results.iter().filter(|r| r.is_ok()).count();
	assert_eq!(winners, 1);
	assert!(results
		.iter()
		.any(|r| matches!(r, Err(EngineError::OrderUnavailable))));

	// The stored order belongs to exactly the winner
	let stored = engine.get_order(&order.id).await.unwrap();
	let winner_id = results
		.iter()
		.find_map(|r| r.as_ref().ok())
		.and_then(|o| o.washer_id.clone())
		.unwrap();
	assert_eq!(stored.washer_id, Some(winner_id));
}

#[tokio::test]
async fn test_operator_capacity_cap() {
	let engine = engine();

	let mut orders = Vec::new();
	for _ in 0..6 {
		orders.push(place_free_order(&engine).await);
	}

	for order in orders.iter().take(5) {
		engine.claim(&order.id, "washer-a").await.unwrap();
	}

	let mut events = engine.event_bus().subscribe();
	let sixth = engine.claim(&orders[5].id, "washer-a").await;
	assert!(matches!(sixth, Err(EngineError::LimitReached)));

	// Zero side effects: the order is still claimable and nothing was queued
	let stored = engine.get_order(&orders[5].id).await.unwrap();
	assert_eq!(stored.state, FulfillmentState::Unclaimed);
	assert!(stored.washer_id.is_none());
	assert!(queued_statuses(&mut events).is_empty());

	// Another operator can still take it
	engine.claim(&orders[5].id, "washer-b").await.unwrap();
}

#[tokio::test]
async fn test_capacity_frees_up_on_completion() {
	let engine = engine();

	let mut orders = Vec::new();
	for _ in 0..6 {
		orders.push(place_free_order(&engine).await);
	}
	for order in orders.iter().take(5) {
		engine.claim(&order.id, "washer-a").await.unwrap();
	}

	// Drive the first order to completion to free a slot
	for n in 1..=13 {
		complete_with_required_evidence(&engine, &orders[0].id, "washer-a", n).await;
	}

	engine.claim(&orders[5].id, "washer-a").await.unwrap();
}

#[tokio::test]
async fn test_photo_gated_step_requires_stored_photo() {
	let engine = engine();
	let order = place_free_order(&engine).await;
	engine.claim(&order.id, "washer-a").await.unwrap();

	for n in 1..=3 {
		complete_with_required_evidence(&engine, &order.id, "washer-a", n).await;
	}

	// No evidence at the labeling step
	let bare = engine
		.complete_step(&order.id, "washer-a", step(4), StepEvidence::None)
		.await;
	assert!(matches!(bare, Err(EngineError::Workflow(_))));

	// A reference that was never uploaded is rejected too
	let fabricated = engine
		.complete_step(
			&order.id,
			"washer-a",
			step(4),
			StepEvidence::Photo {
				photo: PhotoRef {
					digest: "deadbeef".into(),
					size_bytes: 12,
				},
			},
		)
		.await;
	assert!(matches!(fabricated, Err(EngineError::PhotoNotStored)));

	// Both failures left the order exactly where it was
	let stored = engine.get_order(&order.id).await.unwrap();
	assert_eq!(stored.current_step(), Some(step(4)));
	assert!(stored.step_photos.is_empty());
}

#[tokio::test]
async fn test_step_ordering_and_idempotence() {
	let engine = engine();
	let order = place_free_order(&engine).await;
	engine.claim(&order.id, "washer-a").await.unwrap();

	// Skipping ahead is rejected
	let skipped = engine
		.complete_step(&order.id, "washer-a", step(2), StepEvidence::None)
		.await;
	assert!(matches!(
		skipped,
		Err(EngineError::StepOutOfOrder {
			requested: 2,
			current: 1
		})
	));

	// Completing the current step advances
	let outcome = engine
		.complete_step(&order.id, "washer-a", step(1), StepEvidence::None)
		.await
		.unwrap();
	assert!(matches!(outcome, StepOutcome::Advanced(_)));

	// A client retry of the same step is a harmless duplicate
	let retry = engine
		.complete_step(&order.id, "washer-a", step(1), StepEvidence::None)
		.await
		.unwrap();
	assert!(matches!(retry, StepOutcome::Duplicate(_)));
	assert_eq!(retry.order().current_step(), Some(step(2)));
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions_advance_once() {
	let engine = Arc::new(engine());
	let order = place_free_order(&engine).await;
	engine.claim(&order.id, "washer-a").await.unwrap();

	let mut handles = Vec::new();
	for _ in 0..4 {
		let engine = engine.clone();
		let order_id = order.id.clone();
		handles.push(tokio::spawn(async move {
			engine
				.complete_step(&order_id, "washer-a", step(1), StepEvidence::None)
				.await
		}));
	}

	let mut advanced = 0;
	let mut duplicates = 0;
	for handle in handles {
		match handle.await.unwrap().unwrap() {
			StepOutcome::Advanced(_) => advanced += 1,
			StepOutcome::Duplicate(_) => duplicates += 1,
			StepOutcome::Completed(_) => panic!("step 1 cannot complete the order"),
		}
	}
	assert_eq!(advanced, 1);
	assert_eq!(duplicates, 3);

	let stored = engine.get_order(&order.id).await.unwrap();
	assert_eq!(stored.current_step(), Some(step(2)));
}

#[tokio::test]
async fn test_only_the_claiming_operator_may_work() {
	let engine = engine();
	let order = place_free_order(&engine).await;
	engine.claim(&order.id, "washer-a").await.unwrap();

	let foreign = engine
		.complete_step(&order.id, "washer-b", step(1), StepEvidence::None)
		.await;
	assert!(matches!(foreign, Err(EngineError::NotOrderOperator { .. })));
}

#[tokio::test]
async fn test_silent_steps_emit_no_notification() {
	let engine = engine();
	let order = place_free_order(&engine).await;
	engine.claim(&order.id, "washer-a").await.unwrap();

	let mut events = engine.event_bus().subscribe();
	// Steps 1 through 4 land on steps 2..5, all silent
	for n in 1..=4 {
		complete_with_required_evidence(&engine, &order.id, "washer-a", n).await;
	}
	assert!(queued_statuses(&mut events).is_empty());

	// Completing step 6 enters step 7: the picked_up milestone
	for n in 5..=6 {
		complete_with_required_evidence(&engine, &order.id, "washer-a", n).await;
	}
	assert_eq!(
		queued_statuses(&mut events),
		vec![NotificationStatus::PickedUp]
	);
}

#[tokio::test]
async fn test_claim_works_from_placed_state() {
	let engine = engine();

	let mut request = free_order_request();
	request.discount_cents = 0;
	let placed = engine.place_order(request).await.unwrap();
	assert_eq!(placed.order.state, FulfillmentState::Placed);

	// The claim pool accepts placed orders as well as listed ones
	let claimed = engine.claim(&placed.order.id, "washer-a").await.unwrap();
	assert_eq!(claimed.current_step(), Some(StepNumber::FIRST));
}

#[tokio::test]
async fn test_confirm_payment_lists_order() {
	let engine = engine();

	let mut request = free_order_request();
	request.discount_cents = 0;
	let placed = engine.place_order(request).await.unwrap();

	let listed = engine.confirm_payment(&placed.order.id).await.unwrap();
	assert_eq!(listed.state, FulfillmentState::Unclaimed);

	// Confirming twice is idempotent
	let again = engine.confirm_payment(&placed.order.id).await.unwrap();
	assert_eq!(again.state, FulfillmentState::Unclaimed);
}

#[tokio::test]
async fn test_cancel_releases_the_operator() {
	let engine = engine();
	let order = place_free_order(&engine).await;
	engine.claim(&order.id, "washer-a").await.unwrap();
	complete_with_required_evidence(&engine, &order.id, "washer-a", 1).await;

	let cancelled = engine
		.cancel_order(&order.id, "customer request")
		.await
		.unwrap();
	assert_eq!(cancelled.state, FulfillmentState::Cancelled);

	// Working a cancelled order fails
	let stale = engine
		.complete_step(&order.id, "washer-a", step(2), StepEvidence::None)
		.await;
	assert!(matches!(stale, Err(EngineError::OrderUnavailable)));

	// The slot freed up: the operator can claim five fresh orders
	for _ in 0..5 {
		let next = place_free_order(&engine).await;
		engine.claim(&next.id, "washer-a").await.unwrap();
	}
}

#[tokio::test]
async fn test_unknown_order_is_reported() {
	let engine = engine();
	assert!(matches!(
		engine.claim("missing", "washer-a").await,
		Err(EngineError::OrderNotFound(_))
	));
	assert!(matches!(
		engine.get_order("missing").await,
		Err(EngineError::OrderNotFound(_))
	));
}
