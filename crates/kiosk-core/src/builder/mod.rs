//! Builder for constructing the kiosk engine.
//!
//! Storage backends and payment gateways are pluggable: the builder looks up
//! each configured implementation in a name to factory map, instantiates it
//! with its configuration table, and keeps the one marked primary.

use crate::engine::{event_bus::EventBus, KioskEngine};
use kiosk_config::Config;
use kiosk_payment::{PaymentGatewayError, PaymentGatewayInterface, PaymentGatewayService};
use kiosk_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the engine's event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory maps for every pluggable component.
pub struct KioskFactories<SF, PF> {
	pub storage_factories: HashMap<String, SF>,
	pub payment_factories: HashMap<String, PF>,
}

pub struct KioskBuilder {
	config: Config,
}

impl KioskBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF, PF>(self, factories: KioskFactories<SF, PF>) -> Result<KioskEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		PF: Fn(&toml::Value) -> Result<Box<dyn PaymentGatewayInterface>, PaymentGatewayError>,
	{
		let storage_backend = load_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let gateway = load_primary(
			"payment",
			&self.config.payment.primary,
			&self.config.payment.implementations,
			&factories.payment_factories,
		)?;
		let gateway = Arc::new(PaymentGatewayService::new(gateway));

		tracing::info!(kiosk_id = %self.config.kiosk.id, "Kiosk engine assembled");
		Ok(KioskEngine::new(
			self.config,
			storage,
			gateway,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}
}

/// Instantiates every configured implementation that has a factory and
/// returns the primary one.
///
/// Any factory failure aborts the build, primary or not.
fn load_primary<T, E, F>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	T: ?Sized,
	E: Display,
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	if loaded.is_empty() {
		return Err(BuilderError::Config(format!(
			"No valid {} implementations available",
			component
		)));
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' failed to load or has invalid configuration",
			component, primary
		))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use kiosk_config::builders::config::ConfigBuilder;
	use kiosk_payment::PaymentGatewayFactory;
	use kiosk_storage::StorageFactory;
	use kiosk_types::{ItemRequest, OrderStatus, PaymentStatus, Product};
	use rust_decimal::Decimal;

	fn factories() -> KioskFactories<StorageFactory, PaymentGatewayFactory> {
		KioskFactories {
			storage_factories: kiosk_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			payment_factories: kiosk_payment::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	fn table(source: &str) -> toml::Value {
		toml::Value::Table(toml::from_str(source).unwrap())
	}

	#[test]
	fn test_unknown_primary_is_rejected() {
		let config = ConfigBuilder::new()
			.payment("stripe", table(""))
			.build();

		let err = KioskBuilder::new(config).build(factories()).err().unwrap();
		assert!(err.to_string().contains("No valid payment implementations"));
	}

	#[test]
	fn test_factory_error_aborts_build() {
		let config = ConfigBuilder::new()
			.storage("file", table(r#"storage_path = """#))
			.build();

		let err = KioskBuilder::new(config).build(factories()).err().unwrap();
		assert!(err
			.to_string()
			.contains("Failed to create storage implementation 'file'"));
	}

	#[tokio::test]
	async fn test_built_engine_runs_an_order_to_received() {
		let dir = tempfile::tempdir().unwrap();
		let storage_path = dir.path().join("store");
		let config = ConfigBuilder::new()
			.storage(
				"file",
				table(&format!("storage_path = {:?}", storage_path.display().to_string())),
			)
			.build();
		let engine = KioskBuilder::new(config).build(factories()).unwrap();

		engine
			.catalog()
			.upsert(Product {
				id: 1,
				name: "Burger".into(),
				description: "Double cheese".into(),
				category: "Meal".into(),
				price: Decimal::new(1000, 2),
			})
			.await
			.unwrap();

		let order = engine.orders().create(1).await.unwrap();
		engine
			.orders()
			.set_items(order.id, vec![ItemRequest { product_id: 1, quantity: 2 }])
			.await
			.unwrap();

		let payment = engine.payments().create(order.id).await.unwrap();
		assert!(payment.qr_data.starts_with("mock://checkout/"));

		let confirmed = engine
			.payments()
			.update(&payment.external_id, "payment")
			.await
			.unwrap();
		assert_eq!(confirmed.status, PaymentStatus::Confirmed);
		assert_eq!(
			engine.orders().get(order.id).await.unwrap().status,
			OrderStatus::Received
		);
	}
}
