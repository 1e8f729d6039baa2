//! Main entry point for the kiosk order service.
//!
//! Loads the configuration, builds the kiosk engine from the configured
//! storage backend and payment gateway, and serves the HTTP API next to the
//! engine's event log until interrupted.

use clap::Parser;
use kiosk_config::Config;
use kiosk_core::{KioskBuilder, KioskEngine, KioskFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use kiosk_payment::implementations::http::create_gateway as create_http_gateway;
use kiosk_payment::implementations::mock::create_gateway as create_mock_gateway;
use kiosk_storage::implementations::file::create_storage as create_file_storage;
use kiosk_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the kiosk service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started kiosk");

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.kiosk.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				_ = engine.run() => {
					tracing::info!("Kiosk engine finished");
				}
				result = server::start_server(api_config, Arc::clone(&engine)) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running event log only");
			engine.run().await;
		},
	}

	tracing::info!("Stopped kiosk");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the kiosk engine with every built-in storage backend and payment
/// gateway available to the configuration.
fn build_engine(config: Config) -> Result<KioskEngine, Box<dyn std::error::Error>> {
	let builder = KioskBuilder::new(config);

	let storage_factories = create_factory_map!(
		kiosk_storage::StorageInterface,
		kiosk_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let payment_factories = create_factory_map!(
		kiosk_payment::PaymentGatewayInterface,
		kiosk_payment::PaymentGatewayError,
		"http" => create_http_gateway,
		"mock" => create_mock_gateway,
	);

	let factories = KioskFactories {
		storage_factories,
		payment_factories,
	};

	Ok(builder.build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use kiosk_config::builders::config::ConfigBuilder;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["kiosk"]);

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["kiosk", "--config", "custom.toml", "-l", "debug"]);

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_create_factory_map_multiple_entries() {
		use kiosk_storage::{StorageError, StorageInterface};

		let factories = create_factory_map!(
			StorageInterface,
			StorageError,
			"memory" => create_memory_storage,
			"file" => create_file_storage,
		);

		assert_eq!(factories.len(), 2);
		assert!(factories.contains_key("memory"));
		assert!(factories.contains_key("file"));
	}

	#[test]
	fn test_build_engine_with_minimal_config() {
		let config = ConfigBuilder::new().kiosk_id("test-kiosk").build();

		let engine = build_engine(config).unwrap();
		assert_eq!(engine.config().kiosk.id, "test-kiosk");
	}

	#[test]
	fn test_build_engine_rejects_bad_gateway_config() {
		let config = ConfigBuilder::new()
			.payment("http", toml::from_str("base_url = \"ftp://nowhere\"").unwrap())
			.build();

		assert!(build_engine(config).is_err());
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().unwrap();
		let config_path = temp_dir.path().join("kiosk.toml");
		let storage_path = temp_dir.path().join("store");

		let config_content = format!(
			r#"
[kiosk]
id = "test-file-kiosk"

[storage]
primary = "file"

[storage.implementations.file]
storage_path = {:?}

[payment]
primary = "mock"
notification_url = "http://127.0.0.1:3000/api/webhooks/payments"

[payment.implementations.mock]

[api]
enabled = true
port = 3100
"#,
			storage_path.display().to_string()
		);
		std::fs::write(&config_path, config_content).unwrap();

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.unwrap();
		assert_eq!(config.kiosk.id, "test-file-kiosk");
		assert_eq!(config.api.as_ref().map(|api| api.port), Some(3100));

		let engine = build_engine(config).unwrap();
		let order = engine.orders().create(1).await.unwrap();
		assert_eq!(engine.orders().get(order.id).await.unwrap(), order);
	}
}
