//! HTTP checkout gateway.
//!
//! Posts the checkout payload as JSON to `{base_url}{checkout_path}` with an
//! optional bearer token and expects a JSON body carrying the provider payment
//! id and the QR display data.

use crate::{PaymentGatewayError, PaymentGatewayInterface};
use async_trait::async_trait;
use kiosk_types::{
	CheckoutRequest, CheckoutResponse, ConfigSchema, Field, FieldType, ImplementationRegistry,
	Schema, SecretString, ValidationError,
};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CHECKOUT_PATH: &str = "/checkout";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Body returned by the provider.
///
/// Providers that follow the in-store QR flow call the id `in_store_order_id`.
#[derive(Debug, Deserialize)]
struct ProviderCheckout {
	#[serde(alias = "in_store_order_id", alias = "external_id")]
	id: String,
	qr_data: String,
}

pub struct HttpPaymentGateway {
	client: reqwest::Client,
	endpoint: String,
	access_token: Option<SecretString>,
}

impl HttpPaymentGateway {
	pub fn new(
		base_url: &str,
		checkout_path: &str,
		access_token: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, PaymentGatewayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.pool_idle_timeout(Duration::from_secs(90))
			.build()
			.map_err(|e| PaymentGatewayError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			endpoint: format!("{}{}", base_url.trim_end_matches('/'), checkout_path),
			access_token,
		})
	}
}

#[async_trait]
impl PaymentGatewayInterface for HttpPaymentGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpGatewaySchema)
	}

	async fn create_checkout(
		&self,
		request: &CheckoutRequest,
	) -> Result<CheckoutResponse, PaymentGatewayError> {
		let mut builder = self.client.post(&self.endpoint).json(request);
		if let Some(token) = &self.access_token {
			builder = builder.bearer_auth(token.expose_secret());
		}

		let response = builder
			.send()
			.await
			.map_err(|e| PaymentGatewayError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			tracing::warn!(
				status = status.as_u16(),
				endpoint = %self.endpoint,
				"Checkout rejected by provider"
			);
			return Err(PaymentGatewayError::Http {
				status: status.as_u16(),
				body,
			});
		}

		let checkout: ProviderCheckout = response
			.json()
			.await
			.map_err(|e| PaymentGatewayError::InvalidResponse(e.to_string()))?;

		Ok(CheckoutResponse {
			external_id: checkout.id,
			qr_data: checkout.qr_data,
		})
	}
}

pub struct HttpGatewaySchema;

impl ConfigSchema for HttpGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("base_url must start with http:// or https://".to_string()),
				}
			})],
			vec![
				Field::new("checkout_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.starts_with('/') => Ok(()),
						_ => Err("checkout_path must start with '/'".to_string()),
					}
				}),
				Field::new("access_token", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Creates an HTTP gateway.
///
/// Configuration parameters:
/// - `base_url`: provider root URL (required)
/// - `checkout_path`: path of the checkout endpoint (default: "/checkout")
/// - `access_token`: bearer token, usually `${PAYMENT_ACCESS_TOKEN}`
/// - `timeout_seconds`: request timeout (default: 10)
pub fn create_gateway(
	config: &toml::Value,
) -> Result<Box<dyn PaymentGatewayInterface>, PaymentGatewayError> {
	HttpGatewaySchema
		.validate(config)
		.map_err(|e| PaymentGatewayError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| PaymentGatewayError::Configuration("base_url is required".into()))?;
	let checkout_path = config
		.get("checkout_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_CHECKOUT_PATH);
	let access_token = config
		.get("access_token")
		.and_then(|v| v.as_str())
		.filter(|token| !token.is_empty())
		.map(SecretString::from);
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|secs| secs as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(HttpPaymentGateway::new(
		base_url,
		checkout_path,
		access_token,
		Duration::from_secs(timeout),
	)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = crate::PaymentGatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl crate::PaymentGatewayRegistry for Registry {}
