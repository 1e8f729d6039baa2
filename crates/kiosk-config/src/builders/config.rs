//! Builder for test and development configurations.

use crate::{ApiConfig, Config, KioskConfig, PaymentConfig, StorageConfig};
use std::collections::HashMap;

/// Fluent builder producing a `Config` backed by the memory storage and the
/// mock payment gateway unless told otherwise.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	kiosk_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	payment_primary: String,
	payment_config: toml::Value,
	notification_url: String,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			kiosk_id: "test-kiosk".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::Table::new()),
			payment_primary: "mock".to_string(),
			payment_config: toml::Value::Table(toml::Table::new()),
			notification_url: "http://localhost:3000/api/webhooks/payments".to_string(),
			api: None,
		}
	}

	pub fn kiosk_id(mut self, id: impl Into<String>) -> Self {
		self.kiosk_id = id.into();
		self
	}

	/// Selects the storage implementation and its table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	/// Selects the payment gateway implementation and its table.
	pub fn payment(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.payment_primary = primary.into();
		self.payment_config = config;
		self
	}

	pub fn notification_url(mut self, url: impl Into<String>) -> Self {
		self.notification_url = url.into();
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		Config {
			kiosk: KioskConfig { id: self.kiosk_id },
			storage: StorageConfig {
				implementations: HashMap::from([(self.storage_primary.clone(), self.storage_config)]),
				primary: self.storage_primary,
			},
			payment: PaymentConfig {
				implementations: HashMap::from([(self.payment_primary.clone(), self.payment_config)]),
				primary: self.payment_primary,
				notification_url: self.notification_url,
				checkout_title: "Kiosk order".to_string(),
				checkout_description: "Self-service kiosk order".to_string(),
			},
			api: self.api,
		}
	}
}
