//! Order status state machine.

pub mod order;

pub use order::OrderStateMachine;
