//! In-process payment gateway for development and tests.
//!
//! Every checkout succeeds with a fresh UUID as provider id. Setting
//! `fail = true` makes every call fail with a 503, which is useful to exercise
//! the error path end to end.

use crate::{PaymentGatewayError, PaymentGatewayInterface};
use async_trait::async_trait;
use kiosk_types::{
	CheckoutRequest, CheckoutResponse, ConfigSchema, Field, FieldType, ImplementationRegistry,
	Schema, ValidationError,
};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MockPaymentGateway {
	fail: bool,
	calls: AtomicUsize,
}

impl MockPaymentGateway {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn failing() -> Self {
		Self {
			fail: true,
			..Self::default()
		}
	}

	/// Number of checkouts requested so far.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PaymentGatewayInterface for MockPaymentGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockGatewaySchema)
	}

	async fn create_checkout(
		&self,
		request: &CheckoutRequest,
	) -> Result<CheckoutResponse, PaymentGatewayError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if self.fail {
			return Err(PaymentGatewayError::Http {
				status: 503,
				body: "mock gateway configured to fail".into(),
			});
		}

		let external_id = uuid::Uuid::new_v4().to_string();
		Ok(CheckoutResponse {
			qr_data: format!(
				"mock://checkout/{}?ref={}&amount={}",
				external_id, request.external_reference, request.total_amount
			),
			external_id,
		})
	}
}

pub struct MockGatewaySchema;

impl ConfigSchema for MockGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("fail", FieldType::Boolean)]).validate(config)
	}
}

pub fn create_gateway(
	config: &toml::Value,
) -> Result<Box<dyn PaymentGatewayInterface>, PaymentGatewayError> {
	MockGatewaySchema
		.validate(config)
		.map_err(|e| PaymentGatewayError::Configuration(e.to_string()))?;

	let fail = config.get("fail").and_then(|v| v.as_bool()).unwrap_or(false);
	Ok(Box::new(if fail {
		MockPaymentGateway::failing()
	} else {
		MockPaymentGateway::new()
	}))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = crate::PaymentGatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl crate::PaymentGatewayRegistry for Registry {}
