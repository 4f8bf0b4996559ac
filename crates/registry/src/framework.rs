//! A framework: one registry plus the container feeding it.

use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::registry::{RegistryConfig, ServiceRegistry};

/// Framework settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
	/// Fixed UID; a random one is generated when unset.
	pub uid: Option<String>,
	pub registry: RegistryConfig,
}

/// Explicitly owned component framework.
///
/// Dropping the framework stops it: every instance is killed and every
/// service unregistered.
#[derive(Debug)]
pub struct Framework {
	registry: ServiceRegistry,
	container: Container,
}

impl Framework {
	pub fn new(config: FrameworkConfig) -> Self {
		let registry = match config.uid {
			Some(uid) => ServiceRegistry::with_uid(uid, config.registry),
			None => ServiceRegistry::new(config.registry),
		};
		tracing::info!(uid = registry.framework_uid(), "framework started");
		let container = Container::new(registry.clone());
		Self { registry, container }
	}

	pub fn uid(&self) -> &str {
		self.registry.framework_uid()
	}

	pub fn registry(&self) -> &ServiceRegistry {
		&self.registry
	}

	pub fn container(&self) -> &Container {
		&self.container
	}

	/// Kills every instance, newest first, and drops every service.
	pub fn stop(&self) {
		if self.registry.is_closed() {
			return;
		}
		tracing::info!(uid = self.uid(), "framework stopping");
		self.registry.close();
		self.container.prune();
	}
}

impl Default for Framework {
	fn default() -> Self {
		Self::new(FrameworkConfig::default())
	}
}

impl Drop for Framework {
	fn drop(&mut self) {
		self.stop();
	}
}
