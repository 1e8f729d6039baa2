//! Core of the kiosk order service.
//!
//! Contains the order status state machine, the append-only order history,
//! the order aggregate service and the payment orchestrator, plus the engine
//! and builder that wire them over the pluggable storage and payment
//! implementations.

pub mod builder;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod history;
pub mod locks;
pub mod order;
pub mod payment;
pub mod repository;
pub mod state;

pub use builder::{BuilderError, KioskBuilder, KioskFactories};
pub use engine::{event_bus::EventBus, KioskEngine};
pub use error::KioskError;
