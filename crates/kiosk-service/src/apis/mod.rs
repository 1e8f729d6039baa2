//! Kiosk HTTP handlers.
//!
//! Handlers parse the request, call the engine and map `KioskError` to
//! `APIError`. They hold no business rules.

pub mod order;
pub mod payment;
pub mod product;
pub mod webhook;

use kiosk_core::KioskError;
use kiosk_types::APIError;

/// Logs a service failure and converts it into an API error.
pub(crate) fn reject(err: KioskError) -> APIError {
	match &err {
		KioskError::Internal(message) => tracing::error!(error = %message, "Request failed"),
		other => tracing::warn!(error = %other, "Request rejected"),
	}
	err.into()
}
