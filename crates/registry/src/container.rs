//! Named component factories and their instances.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::component::{Component, ComponentSpec, InstanceConfig, InstanceCore, InstanceHandle, ProvidedService, Requirement};
use crate::error::{RegistryError, Result};
use crate::props::keys;
use crate::registry::ServiceRegistry;
use crate::service::ServiceObject;

/// Output of a factory constructor.
pub struct Instantiated {
	component: Arc<dyn Component>,
	concrete: Arc<dyn Any + Send + Sync>,
	service: ServiceObject,
}

impl Instantiated {
	/// The component itself is the provided service, read back as `Arc<C>`.
	pub fn new<C: Component>(component: Arc<C>) -> Self {
		let service = ServiceObject::new(Arc::clone(&component));
		Self::providing(component, service)
	}

	/// Publishes `service` instead of the component, e.g. an `Arc<dyn Trait>`.
	pub fn providing<C: Component>(component: Arc<C>, service: ServiceObject) -> Self {
		Self {
			component: Arc::clone(&component) as Arc<dyn Component>,
			concrete: component,
			service,
		}
	}
}

type BuildFn = dyn Fn(&InstanceConfig) -> anyhow::Result<Instantiated> + Send + Sync;

struct Factory {
	spec: ComponentSpec,
	build: Box<BuildFn>,
}

struct ContainerInner {
	registry: ServiceRegistry,
	factories: RwLock<HashMap<Arc<str>, Arc<Factory>>>,
	instances: Mutex<HashMap<Arc<str>, InstanceHandle>>,
}

/// Instantiates components from registered factories and tracks them by name.
#[derive(Clone)]
pub struct Container {
	inner: Arc<ContainerInner>,
}

impl Container {
	pub fn new(registry: ServiceRegistry) -> Self {
		Self {
			inner: Arc::new(ContainerInner {
				registry,
				factories: RwLock::new(HashMap::new()),
				instances: Mutex::new(HashMap::new()),
			}),
		}
	}

	pub fn registry(&self) -> &ServiceRegistry {
		&self.inner.registry
	}

	/// Registers a factory under `spec.factory()`.
	pub fn register_factory<F>(&self, spec: ComponentSpec, build: F) -> Result<()>
	where
		F: Fn(&InstanceConfig) -> anyhow::Result<Instantiated> + Send + Sync + 'static,
	{
		let name: Arc<str> = Arc::from(spec.factory());
		let mut factories = self.inner.factories.write();
		if factories.contains_key(&name) {
			return Err(RegistryError::DuplicateFactory(name.to_string()));
		}
		tracing::debug!(factory = &*name, "container.factory.registered");
		factories.insert(name, Arc::new(Factory { spec, build: Box::new(build) }));
		Ok(())
	}

	pub fn factories(&self) -> Vec<String> {
		let mut names: Vec<String> = self.inner.factories.read().keys().map(|k| k.to_string()).collect();
		names.sort();
		names
	}

	/// Builds a named instance of `factory` and hands it to the registry.
	///
	/// The instance is bound and validated as soon as its required
	/// dependencies are available; when called from inside a component hook
	/// those callbacks run after the hook returns.
	pub fn instantiate(&self, factory: &str, config: InstanceConfig) -> Result<InstanceHandle> {
		let registry = &self.inner.registry;
		registry.serialized(|| {
			if registry.is_closed() {
				return Err(RegistryError::Closed);
			}
			let factory = self
				.inner
				.factories
				.read()
				.get(factory)
				.cloned()
				.ok_or_else(|| RegistryError::UnknownFactory(factory.to_string()))?;
			let spec = &factory.spec;

			if let Some(existing) = self.inner.instances.lock().get(config.name())
				&& existing.is_alive()
			{
				return Err(RegistryError::DuplicateInstance(config.name().to_string()));
			}
			for field in config.filters().keys() {
				if !spec.requirements().iter().any(|r| r.field() == field) {
					return Err(RegistryError::UnknownRequirement {
						factory: spec.factory().to_string(),
						field: field.clone(),
					});
				}
			}

			let built = (factory.build)(&config).map_err(|error| RegistryError::ConstructionFailed {
				factory: spec.factory().to_string(),
				instance: config.name().to_string(),
				message: format!("{error:#}"),
			})?;

			let mut properties = spec.properties().clone();
			properties.merge(config.properties());
			properties.insert(keys::INSTANCE_NAME, config.name());

			let requirements: Vec<Requirement> = spec
				.requirements()
				.iter()
				.map(|r| match config.filters().get(r.field()) {
					Some(filter) => r.clone().with_filter(filter.clone()),
					None => r.clone(),
				})
				.collect();

			let provided = (!spec.provided_specs().is_empty()).then(|| ProvidedService {
				specs: spec.provided_specs().to_vec(),
				object: built.service,
			});

			let core = Arc::new(InstanceCore::new(
				registry.next_instance_id(),
				registry.clone(),
				Arc::clone(config.name_arc()),
				properties,
				built.component,
				built.concrete,
				provided,
			));
			let handle = InstanceHandle::new(Arc::clone(&core));
			self.prune();
			self.inner.instances.lock().insert(Arc::clone(config.name_arc()), handle.clone());
			tracing::debug!(factory = spec.factory(), instance = config.name(), "container.instantiate");
			registry.add_consumer(core, requirements);
			Ok(handle)
		})
	}

	/// Kills the named instance. Unknown names return false.
	pub fn kill(&self, name: &str) -> bool {
		let removed = self.inner.instances.lock().remove(name);
		match removed {
			Some(handle) => {
				let alive = handle.is_alive();
				handle.kill();
				alive
			}
			None => false,
		}
	}

	/// Forgets instances killed through their handle or by a registry close.
	pub(crate) fn prune(&self) {
		self.inner.instances.lock().retain(|_, handle| handle.is_alive());
	}

	/// Live instance registered under `name`.
	pub fn get(&self, name: &str) -> Option<InstanceHandle> {
		self.inner
			.instances
			.lock()
			.get(name)
			.cloned()
			.filter(InstanceHandle::is_alive)
	}

	/// Every live instance, sorted by name.
	pub fn instances(&self) -> Vec<InstanceHandle> {
		let mut live: Vec<InstanceHandle> = self
			.inner
			.instances
			.lock()
			.values()
			.cloned()
			.filter(InstanceHandle::is_alive)
			.collect();
		live.sort_by(|a, b| a.name().cmp(b.name()));
		live
	}

	/// Number of names tracked, dead or alive.
	#[cfg(test)]
	pub(crate) fn tracked(&self) -> usize {
		self.inner.instances.lock().len()
	}
}

impl std::fmt::Debug for Container {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Container")
			.field("factories", &self.factories())
			.finish_non_exhaustive()
	}
}
