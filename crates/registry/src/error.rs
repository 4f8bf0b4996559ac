use thiserror::Error;

/// Errors raised by the component container and keyed factories.
///
/// Registry mutations themselves never fail: unknown handles and keys are
/// treated as "nothing bound" and closed registries ignore mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
	/// The registry has been closed.
	#[error("registry is closed")]
	Closed,
	/// A live instance already uses this name.
	#[error("component instance already exists: {0}")]
	DuplicateInstance(String),
	/// No factory is registered under this name.
	#[error("unknown component factory: {0}")]
	UnknownFactory(String),
	/// A factory is already registered under this name.
	#[error("component factory already registered: {0}")]
	DuplicateFactory(String),
	/// A filter override targets a requirement the factory does not declare.
	#[error("factory {factory} declares no requirement named {field}")]
	UnknownRequirement { factory: String, field: String },
	/// The factory constructor failed.
	#[error("factory {factory} failed to build {instance}: {message}")]
	ConstructionFailed { factory: String, instance: String, message: String },
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
