//! Bridges making framework-info and detail instances as probes come and go.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use windrose_registry::props::keys;
use windrose_registry::{
	ActivationGate, Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, InstanceKey, Instantiated,
	KeyedFactory, Requirement, ServiceId, ServiceReference,
};

use crate::framework_info::FrameworkInfo;
use crate::{DETAILS_CREATOR_SPEC, FRAMEWORK_INFO_CREATOR_SPEC, FRAMEWORK_INFO_SPEC, PROBE_SPEC};

pub const PROBE_BRIDGE_FACTORY: &str = "probe-info-bridge-factory";
pub const PROBE_BRIDGE_INSTANCE: &str = "probe-info-bridge";
pub const DETAILS_BRIDGE_FACTORY: &str = "probe-details-bridge-factory";
pub const DETAILS_BRIDGE_INSTANCE: &str = "probe-details-bridge";

/// Framework a probe reports on: its exporter, or the local framework.
fn probe_key(service: &ServiceReference) -> InstanceKey {
	let properties = service.properties();
	InstanceKey::new(properties.get_str(keys::ENDPOINT_FRAMEWORK_UUID))
}

fn make(creator: &KeyedFactory, key: &InstanceKey) {
	if let Err(error) = creator.make(key.clone()) {
		tracing::error!(factory = creator.factory(), %key, %error, "failed to make instance");
	}
}

/// Makes one framework-info instance per probed framework.
#[derive(Default)]
pub struct ProbeBridge {
	creator: Mutex<Option<Arc<KeyedFactory>>>,
	frameworks: Mutex<BTreeMap<InstanceKey, ServiceId>>,
}

impl ProbeBridge {
	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(PROBE_BRIDGE_FACTORY)
			.requires(Requirement::new("creator", FRAMEWORK_INFO_CREATOR_SPEC, Cardinality::Single))
			.requires(Requirement::new("probes", PROBE_SPEC, Cardinality::Aggregate))
	}

	/// Keys of the frameworks whose probe is bound.
	pub fn frameworks(&self) -> Vec<InstanceKey> {
		self.frameworks.lock().keys().cloned().collect()
	}
}

impl Component for ProbeBridge {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"creator" => *self.creator.lock() = service.get::<Arc<KeyedFactory>>(),
			"probes" => {
				let key = probe_key(service);
				tracing::debug!(%key, "bridge.probe.bound");
				self.frameworks.lock().insert(key.clone(), service.id());
				if let Some(creator) = self.creator.lock().clone() {
					make(&creator, &key);
				}
			}
			_ => {}
		}
		Ok(())
	}

	fn unbind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"creator" => *self.creator.lock() = None,
			"probes" => {
				let key = probe_key(service);
				let removed = {
					let mut frameworks = self.frameworks.lock();
					let current = frameworks.get(&key) == Some(&service.id());
					current && frameworks.remove(&key).is_some()
				};
				if removed && let Some(creator) = self.creator.lock().clone() {
					tracing::debug!(%key, "bridge.probe.gone");
					creator.delete(key);
				}
			}
			_ => {}
		}
		Ok(())
	}

	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		let Some(creator) = self.creator.lock().clone() else {
			return Ok(());
		};
		for key in self.frameworks() {
			make(&creator, &key);
		}
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		let Some(creator) = self.creator.lock().clone() else {
			return Ok(());
		};
		for key in self.frameworks() {
			creator.delete(key);
		}
		Ok(())
	}
}

/// Makes every detail page for every framework-info instance.
#[derive(Default)]
pub struct DetailsBridge {
	gate: ActivationGate,
	creators: Mutex<Vec<(ServiceId, Arc<KeyedFactory>)>>,
	infos: Mutex<Vec<(ServiceId, Arc<FrameworkInfo>)>>,
}

impl DetailsBridge {
	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(DETAILS_BRIDGE_FACTORY)
			.requires(Requirement::new("creators", DETAILS_CREATOR_SPEC, Cardinality::Aggregate))
			.requires(Requirement::new("infos", FRAMEWORK_INFO_SPEC, Cardinality::Aggregate))
	}

	fn creators(&self) -> Vec<Arc<KeyedFactory>> {
		self.creators.lock().iter().map(|(_, c)| Arc::clone(c)).collect()
	}

	fn info_keys(&self) -> Vec<InstanceKey> {
		self.infos.lock().iter().map(|(_, info)| info.key()).collect()
	}

	fn populate(&self, key: &InstanceKey) {
		for creator in self.creators() {
			make(&creator, key);
		}
	}

	fn clear(&self, key: &InstanceKey) {
		for creator in self.creators() {
			creator.delete(key.clone());
		}
	}
}

impl Component for DetailsBridge {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"creators" => {
				let Some(creator) = service.get::<Arc<KeyedFactory>>() else {
					anyhow::bail!("service {} is not a keyed factory", service.id());
				};
				self.creators.lock().push((service.id(), Arc::clone(&creator)));
				self.gate.when_active(|| {
					for key in self.info_keys() {
						make(&creator, &key);
					}
				});
			}
			"infos" => {
				let Some(info) = service.get::<Arc<FrameworkInfo>>() else {
					anyhow::bail!("service {} is not a framework info", service.id());
				};
				let key = info.key();
				self.infos.lock().push((service.id(), info));
				self.gate.when_active(|| self.populate(&key));
			}
			_ => {}
		}
		Ok(())
	}

	fn unbind(&self, field: &str, service: &ServiceReference) -> HookResult {
		let id = service.id();
		match field {
			"creators" => {
				let removed = {
					let mut creators = self.creators.lock();
					let index = creators.iter().position(|(sid, _)| *sid == id);
					index.map(|i| creators.remove(i).1)
				};
				if let Some(creator) = removed {
					self.gate.locked(|| {
						for key in self.info_keys() {
							creator.delete(key);
						}
					});
				}
			}
			"infos" => {
				let removed = {
					let mut infos = self.infos.lock();
					let index = infos.iter().position(|(sid, _)| *sid == id);
					index.map(|i| infos.remove(i).1)
				};
				if let Some(info) = removed {
					self.gate.locked(|| self.clear(&info.key()));
				}
			}
			_ => {}
		}
		Ok(())
	}

	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		self.gate.activate(|| {
			for key in self.info_keys() {
				self.populate(&key);
			}
		});
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		self.gate.deactivate(|| {
			for key in self.info_keys() {
				self.clear(&key);
			}
		});
		Ok(())
	}
}

/// Registers both bridges and starts one instance of each.
pub fn install(container: &Container) -> windrose_registry::Result<(InstanceHandle, InstanceHandle)> {
	container.register_factory(ProbeBridge::spec(), |_| Ok(Instantiated::new(Arc::new(ProbeBridge::default()))))?;
	container.register_factory(DetailsBridge::spec(), |_| Ok(Instantiated::new(Arc::new(DetailsBridge::default()))))?;
	Ok((
		container.instantiate(PROBE_BRIDGE_FACTORY, InstanceConfig::new(PROBE_BRIDGE_INSTANCE))?,
		container.instantiate(DETAILS_BRIDGE_FACTORY, InstanceConfig::new(DETAILS_BRIDGE_INSTANCE))?,
	))
}
