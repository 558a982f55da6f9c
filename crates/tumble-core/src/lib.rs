//! Core fulfillment engine for the Tumble system.
//!
//! This module provides the main orchestration logic for order
//! fulfillment: claim arbitration, the step state machine, the durable
//! notification outbox, and the event bus that fans state changes out to
//! subscribers. It includes the builder used to assemble an engine from
//! pluggable implementations selected by configuration.

pub mod builder;
pub mod engine;
pub mod outbox;
pub mod state;

pub use builder::FulfillmentBuilder;
pub use engine::{event_bus::EventBus, EngineError, FulfillmentEngine, StepOutcome};
pub use outbox::{NotificationOutbox, OutboxEntry};
pub use state::{OrderStateError, OrderStateMachine};
