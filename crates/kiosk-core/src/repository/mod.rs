//! Typed repositories over the key-value storage service.
//!
//! Reads go straight to storage. Writes are staged into a caller-owned
//! `UnitOfWork` so that several aggregates can be committed together.

pub mod history;
pub mod order;
pub mod payment;

pub use history::HistoryRepository;
pub use order::OrderRepository;
pub use payment::PaymentRepository;
