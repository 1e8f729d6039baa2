//! Registry trait for self-registering implementations.
//!
//! Pluggable backends (storage, payment gateways) expose a `Registry` type that
//! names the backend in configuration and hands out its factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Key used under `<section>.implementations.<NAME>` in the configuration,
	/// e.g. "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// Factory function type of the owning module.
	type Factory;

	fn factory() -> Self::Factory;
}
