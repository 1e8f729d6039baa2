//! Payment provider integration for the kiosk.
//!
//! The kiosk opens a checkout at an external payment provider for every order
//! that goes to payment. Providers are pluggable behind
//! `PaymentGatewayInterface`; the configured one is wrapped by
//! `PaymentGatewayService`, which validates outgoing payloads and logs calls.

use async_trait::async_trait;
use kiosk_types::{CheckoutRequest, CheckoutResponse, ConfigSchema, ImplementationRegistry};
use thiserror::Error;

pub mod implementations {
	pub mod http;
	pub mod mock;
}

/// Errors that can occur while talking to a payment provider.
#[derive(Debug, Error)]
pub enum PaymentGatewayError {
	/// The request never produced a response (connect, timeout, TLS).
	#[error("Network error: {0}")]
	Network(String),
	/// The provider answered with a non-success status.
	#[error("Provider returned HTTP {status}: {body}")]
	Http { status: u16, body: String },
	/// The provider answered 2xx with a body we cannot use.
	#[error("Invalid provider response: {0}")]
	InvalidResponse(String),
	/// The checkout payload was rejected before sending.
	#[error("Invalid checkout request: {0}")]
	InvalidRequest(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface every payment provider implements.
#[async_trait]
pub trait PaymentGatewayInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Opens a checkout and returns the provider's payment id and display data.
	///
	/// A single synchronous call: no retries.
	async fn create_checkout(
		&self,
		request: &CheckoutRequest,
	) -> Result<CheckoutResponse, PaymentGatewayError>;
}

pub type PaymentGatewayFactory =
	fn(&toml::Value) -> Result<Box<dyn PaymentGatewayInterface>, PaymentGatewayError>;

pub trait PaymentGatewayRegistry: ImplementationRegistry<Factory = PaymentGatewayFactory> {}

/// Every built-in payment gateway as (name, factory).
pub fn get_all_implementations() -> Vec<(&'static str, PaymentGatewayFactory)> {
	use implementations::{http, mock};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

/// Wraps the configured provider.
pub struct PaymentGatewayService {
	gateway: Box<dyn PaymentGatewayInterface>,
}

impl PaymentGatewayService {
	pub fn new(gateway: Box<dyn PaymentGatewayInterface>) -> Self {
		Self { gateway }
	}

	/// Validates the payload and forwards it to the provider.
	///
	/// The payload must reference an order, carry at least one item and its
	/// total must equal the sum of its line totals.
	pub async fn create_checkout(
		&self,
		request: &CheckoutRequest,
	) -> Result<CheckoutResponse, PaymentGatewayError> {
		validate_checkout(request)?;

		tracing::debug!(
			external_reference = %request.external_reference,
			total_amount = %request.total_amount,
			items = request.items.len(),
			"Opening checkout"
		);

		let response = self.gateway.create_checkout(request).await?;
		if response.external_id.trim().is_empty() {
			return Err(PaymentGatewayError::InvalidResponse(
				"provider returned an empty payment id".into(),
			));
		}

		tracing::info!(
			external_reference = %request.external_reference,
			external_id = %response.external_id,
			"Checkout opened"
		);
		Ok(response)
	}
}

fn validate_checkout(request: &CheckoutRequest) -> Result<(), PaymentGatewayError> {
	if request.external_reference.is_empty() {
		return Err(PaymentGatewayError::InvalidRequest(
			"external_reference is required".into(),
		));
	}
	if request.items.is_empty() {
		return Err(PaymentGatewayError::InvalidRequest(
			"checkout needs at least one item".into(),
		));
	}
	let sum = request
		.items
		.iter()
		.try_fold(rust_decimal::Decimal::ZERO, |sum, item| {
			sum.checked_add(item.total_amount)
		})
		.ok_or_else(|| PaymentGatewayError::InvalidRequest("item totals overflow".into()))?;
	if sum != request.total_amount {
		return Err(PaymentGatewayError::InvalidRequest(format!(
			"total_amount {} does not match item totals {}",
			request.total_amount, sum
		)));
	}
	Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
	use kiosk_types::{CheckoutItem, CheckoutRequest};
	use rust_decimal::Decimal;

	pub fn checkout_request() -> CheckoutRequest {
		CheckoutRequest {
			external_reference: "42".to_string(),
			total_amount: Decimal::new(2500, 2),
			title: "Kiosk order".to_string(),
			description: "Self-service kiosk order".to_string(),
			notification_url: "http://localhost:3000/api/webhooks/payments".to_string(),
			items: vec![
				CheckoutItem {
					category: "burgers".to_string(),
					title: "Cheeseburger".to_string(),
					description: "Double".to_string(),
					unit_price: Decimal::new(1000, 2),
					quantity: 2,
					unit_measure: "unit".to_string(),
					total_amount: Decimal::new(2000, 2),
				},
				CheckoutItem {
					category: "drinks".to_string(),
					title: "Soda".to_string(),
					description: String::new(),
					unit_price: Decimal::new(500, 2),
					quantity: 1,
					unit_measure: "unit".to_string(),
					total_amount: Decimal::new(500, 2),
				},
			],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::mock::MockPaymentGateway;
	use rust_decimal::Decimal;

	#[tokio::test]
	async fn test_service_forwards_valid_checkout() {
		let service = PaymentGatewayService::new(Box::new(MockPaymentGateway::new()));
		let response = service
			.create_checkout(&test_support::checkout_request())
			.await
			.unwrap();
		assert!(!response.external_id.is_empty());
		assert!(response.qr_data.contains("42"));
	}

	#[tokio::test]
	async fn test_service_rejects_inconsistent_total() {
		let service = PaymentGatewayService::new(Box::new(MockPaymentGateway::new()));
		let mut request = test_support::checkout_request();
		request.total_amount = Decimal::new(100, 0);

		assert!(matches!(
			service.create_checkout(&request).await,
			Err(PaymentGatewayError::InvalidRequest(_))
		));
	}

	#[tokio::test]
	async fn test_service_rejects_overflowing_items() {
		let service = PaymentGatewayService::new(Box::new(MockPaymentGateway::new()));
		let mut request = test_support::checkout_request();
		for item in &mut request.items {
			item.total_amount = Decimal::MAX;
		}

		assert_eq!(
			service.create_checkout(&request).await.unwrap_err().to_string(),
			PaymentGatewayError::InvalidRequest("item totals overflow".into()).to_string()
		);
	}

	#[tokio::test]
	async fn test_service_rejects_empty_checkout() {
		let service = PaymentGatewayService::new(Box::new(MockPaymentGateway::new()));
		let mut request = test_support::checkout_request();
		request.items.clear();
		request.total_amount = Decimal::ZERO;

		assert!(matches!(
			service.create_checkout(&request).await,
			Err(PaymentGatewayError::InvalidRequest(_))
		));
	}

	#[test]
	fn test_registered_implementations() {
		let names: Vec<_> = get_all_implementations().into_iter().map(|(name, _)| name).collect();
		assert_eq!(names, vec!["http", "mock"]);
	}
}
