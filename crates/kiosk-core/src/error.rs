//! Error type shared by the kiosk services.

use kiosk_payment::PaymentGatewayError;
use kiosk_storage::StorageError;
use kiosk_types::APIError;
use thiserror::Error;

/// The three failure kinds surfaced by the order and payment services.
///
/// Lower-level errors are wrapped exactly once, where they are detected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KioskError {
	/// A referenced order, payment, history row or product does not exist.
	#[error("{0}")]
	NotFound(String),
	/// The request breaks a business rule.
	#[error("{0}")]
	InvalidInput(String),
	/// Persistence or payment provider failure.
	#[error("{0}")]
	Internal(String),
}

impl KioskError {
	pub fn not_found(message: impl Into<String>) -> Self {
		KioskError::NotFound(message.into())
	}

	pub fn invalid(message: impl Into<String>) -> Self {
		KioskError::InvalidInput(message.into())
	}

	pub fn internal(message: impl Into<String>) -> Self {
		KioskError::Internal(message.into())
	}
}

impl From<StorageError> for KioskError {
	fn from(err: StorageError) -> Self {
		KioskError::Internal(format!("storage error: {}", err))
	}
}

impl From<PaymentGatewayError> for KioskError {
	fn from(err: PaymentGatewayError) -> Self {
		KioskError::Internal(format!("payment gateway error: {}", err))
	}
}

/// NotFound maps to 404, InvalidInput to 400 and Internal to 500.
impl From<KioskError> for APIError {
	fn from(err: KioskError) -> Self {
		match err {
			KioskError::NotFound(message) => APIError::not_found(message),
			KioskError::InvalidInput(message) => APIError::bad_request(message),
			KioskError::Internal(message) => APIError::internal(message),
		}
	}
}
