//! Schema validation for implementation configuration tables.
//!
//! Each pluggable backend describes the TOML table it accepts as a `Schema`
//! and exposes it through `ConfigSchema`. Factories validate their table before
//! constructing anything.

use thiserror::Error;

/// Errors raised while validating a configuration table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the offending field with `parent`, used for nested tables.
	fn nested(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(field) => {
				ValidationError::MissingField(format!("{}.{}", parent, field))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Accepted type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	/// Homogeneous array.
	Array(Box<FieldType>),
	/// Nested table validated by its own schema.
	Table(Schema),
}

pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field with its type and an optional extra check.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a check that runs after the type check succeeded.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		match &self.validator {
			Some(validator) => validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// Required and optional fields of a table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates `config`, which must be a table. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn check_type(name: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	match expected {
		FieldType::String if !value.is_str() => Err(mismatch(name, "string", value)),
		FieldType::Boolean if !value.is_bool() => Err(mismatch(name, "boolean", value)),
		FieldType::String | FieldType::Boolean => Ok(()),
		FieldType::Integer { min, max } => {
			let number = value
				.as_integer()
				.ok_or_else(|| mismatch(name, "integer", value))?;
			if let Some(min) = min.filter(|min| number < *min) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is less than minimum {}", number, min),
				});
			}
			if let Some(max) = max.filter(|max| number > *max) {
				return Err(ValidationError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is greater than maximum {}", number, max),
				});
			}
			Ok(())
		},
		FieldType::Array(inner) => {
			let items = value.as_array().ok_or_else(|| mismatch(name, "array", value))?;
			items
				.iter()
				.enumerate()
				.try_for_each(|(i, item)| check_type(&format!("{}[{}]", name, i), item, inner))
		},
		FieldType::Table(schema) => schema.validate(value).map_err(|e| e.nested(name)),
	}
}

/// Implemented by every pluggable backend to validate its configuration table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn gateway_schema() -> Schema {
		Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http") => Ok(()),
					_ => Err("must be an http(s) url".to_string()),
				}
			})],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
				Field::new(
					"retry",
					FieldType::Table(Schema::new(
						vec![Field::new("enabled", FieldType::Boolean)],
						vec![],
					)),
				),
			],
		)
	}

	#[test]
	fn test_valid_table() {
		let config: toml::Value = toml::from_str(
			r#"
			base_url = "https://payments.example"
			timeout_seconds = 10
			"#,
		)
		.unwrap();
		assert!(gateway_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_and_invalid_fields() {
		let missing: toml::Value = toml::from_str("timeout_seconds = 10").unwrap();
		assert_eq!(
			gateway_schema().validate(&missing),
			Err(ValidationError::MissingField("base_url".to_string()))
		);

		let bad_url: toml::Value = toml::from_str(r#"base_url = "ftp://x""#).unwrap();
		assert!(matches!(
			gateway_schema().validate(&bad_url),
			Err(ValidationError::InvalidValue { .. })
		));

		let out_of_range: toml::Value =
			toml::from_str("base_url = \"http://x\"\ntimeout_seconds = 0").unwrap();
		assert!(matches!(
			gateway_schema().validate(&out_of_range),
			Err(ValidationError::InvalidValue { field, .. }) if field == "timeout_seconds"
		));
	}

	#[test]
	fn test_nested_field_names() {
		let config: toml::Value =
			toml::from_str("base_url = \"http://x\"\n[retry]\nenabled = 1").unwrap();
		assert!(matches!(
			gateway_schema().validate(&config),
			Err(ValidationError::TypeMismatch { field, .. }) if field == "retry.enabled"
		));
	}
}
