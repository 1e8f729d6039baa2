//! Configuration for the kiosk service.
//!
//! Configuration is read from TOML. Files may pull in others with
//! `include = ["payment.toml", ...]`; every top-level section must be defined
//! in exactly one file. `${VAR}` and `${VAR:-default}` are substituted from the
//! environment before parsing.

mod loader;

#[cfg(feature = "testing")]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error embeds the whole input; keep the message only.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub kiosk: KioskConfig,
	pub storage: StorageConfig,
	pub payment: PaymentConfig,
	pub api: Option<ApiConfig>,
}

/// Identity of this kiosk instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KioskConfig {
	/// Appears in logs.
	pub id: String,
}

/// Storage backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Name of the implementation to instantiate.
	pub primary: String,
	/// Implementation name to its raw configuration table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Payment provider selection and checkout presentation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
	pub primary: String,
	/// URL the provider calls back when a checkout is paid.
	pub notification_url: String,
	/// Title shown on the provider's checkout page.
	#[serde(default = "default_checkout_title")]
	pub checkout_title: String,
	#[serde(default = "default_checkout_description")]
	pub checkout_description: String,
	pub implementations: HashMap<String, toml::Value>,
}

fn default_checkout_title() -> String {
	"Kiosk order".to_string()
}

fn default_checkout_description() -> String {
	"Self-service kiosk order".to_string()
}

/// HTTP API server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Page size for list endpoints when the request has none.
	#[serde(default = "default_page_limit")]
	pub default_page_limit: usize,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	pub allowed_headers: Vec<String>,
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

fn default_page_limit() -> usize {
	20
}

/// Substitutes `${VAR}` and `${VAR:-default}` with environment values.
///
/// A variable that is unset and has no default is an error. Inputs above 1MB
/// are rejected before matching.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		output.push_str(&input[last..whole.start()]);
		output.push_str(&value);
		last = whole.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

impl Config {
	/// Loads a configuration file and everything it includes.
	///
	/// Relative includes resolve against the directory of `path`.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path = Path::new(path);
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;

		ConfigLoader::new(base_dir).load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.kiosk.id.trim().is_empty() {
			return Err(ConfigError::Validation("Kiosk ID cannot be empty".into()));
		}

		check_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		check_primary("payment", &self.payment.primary, &self.payment.implementations)?;

		let url = self.payment.notification_url.trim();
		if !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::Validation(format!(
				"payment.notification_url must be an http(s) URL, got '{}'",
				self.payment.notification_url
			)));
		}
		if self.payment.checkout_title.trim().is_empty() {
			return Err(ConfigError::Validation(
				"payment.checkout_title cannot be empty".into(),
			));
		}

		if let Some(api) = &self.api {
			if api.port == 0 {
				return Err(ConfigError::Validation("api.port must be greater than 0".into()));
			}
			if api.timeout_seconds == 0 || api.timeout_seconds > 300 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be between 1 and 300".into(),
				));
			}
			if api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"api.max_request_size must be greater than 0".into(),
				));
			}
			if api.default_page_limit == 0 || api.default_page_limit > 100 {
				return Err(ConfigError::Validation(
					"api.default_page_limit must be between 1 and 100".into(),
				));
			}
		}

		Ok(())
	}
}

fn check_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a configuration from a TOML string, resolving environment variables
/// and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
