//! Multi-file configuration loading.
//!
//! A file may name other files in `include`. Included files are merged into
//! the including file section by section; a section defined twice is an error
//! and so is a file included twice.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
	/// Directory relative includes resolve against.
	base_path: PathBuf,
	loaded_files: HashSet<PathBuf>,
	/// Section name to the file that defined it, for error messages.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads `config_path` with its includes and returns the validated config.
	pub async fn load_config(&mut self, config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let main_path = self.resolve_path(config_path)?;
		let content = self.load_file(&main_path).await?;
		let mut root: toml::Value = toml::from_str(&content)?;

		let includes = extract_includes(&root)?;
		if includes.is_empty() {
			return content.parse();
		}

		let table = root
			.as_table_mut()
			.ok_or_else(|| ConfigError::Parse("configuration root must be a table".into()))?;
		table.remove("include");
		for section in table.keys() {
			self.section_sources.insert(section.clone(), main_path.clone());
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let include_content = self.load_file(&include_path).await?;
			let include_root: toml::Value = toml::from_str(&include_content)?;
			let Some(include_table) = include_root.as_table() else {
				continue;
			};

			for (section, value) in include_table {
				if let Some(existing) = self.section_sources.get(section) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						section,
						existing.display(),
						include_path.display()
					)));
				}
				self.section_sources.insert(section.clone(), include_path.clone());
				table.insert(section.clone(), value.clone());
			}
		}

		// Env vars were already substituted per file, so the merged text is parsed as is.
		let merged = toml::to_string(&root)
			.map_err(|e| ConfigError::Parse(format!("Failed to serialize combined config: {}", e)))?;
		merged.parse()
	}

	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// Reads `include`, which may be a single path or an array of paths.
fn extract_includes(root: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match root.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
