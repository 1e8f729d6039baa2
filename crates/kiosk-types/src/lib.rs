//! Common types module for the kiosk order service.
//!
//! This module defines the core data types shared by every kiosk component:
//! orders and their status machine, the order history audit record, payments
//! and checkout payloads, events, storage keys and configuration validation.

/// API types for HTTP endpoints and error responses.
pub mod api;
/// Event types published after state changes are committed.
pub mod events;
/// Append-only order history records.
pub mod history;
/// Order types, the order status enumeration and its transition table.
pub mod order;
/// Pagination helpers shared by list operations.
pub mod pagination;
/// Payment records and external checkout payloads.
pub mod payment;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Secret string wrapper for credentials.
pub mod secret_string;
/// Storage key namespaces.
pub mod storage;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use events::*;
pub use history::*;
pub use order::*;
pub use pagination::*;
pub use payment::*;
pub use registry::*;
pub use secret_string::SecretString;
pub use storage::*;
pub use validation::*;
