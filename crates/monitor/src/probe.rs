//! Probe: an exported view on one framework's registry.

use std::sync::Arc;

use parking_lot::Mutex;
use windrose_events::{EVENT_ADMIN_SPEC, EventAdmin};
use windrose_registry::props::keys;
use windrose_registry::{
	Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, Instantiated, ListenerId, Properties,
	Requirement, ServiceEvent, ServiceEventKind, ServiceListener, ServiceReference, ServiceRegistry,
};

use crate::{PROBE_SPEC, SERVICE_EVENT_PREFIX};

pub const FACTORY: &str = "basic-probe-factory";
pub const INSTANCE: &str = "basic-probe";

/// Event property carrying the id of the changed service.
pub const EVENT_SERVICE_ID: &str = "service.id";
/// Event property carrying the properties of the changed service, as a map.
pub const EVENT_SERVICE_PROPERTIES: &str = "service.properties";

/// Last topic segment of a forwarded registry change.
pub const fn service_event_name(kind: ServiceEventKind) -> &'static str {
	match kind {
		ServiceEventKind::Registered => "REGISTERED",
		ServiceEventKind::Modified => "MODIFIED",
		ServiceEventKind::Unregistering => "UNREGISTERED",
	}
}

/// Topic of the event forwarded for a registry change.
pub fn service_event_topic(kind: ServiceEventKind) -> String {
	format!("{SERVICE_EVENT_PREFIX}/{}", service_event_name(kind))
}

#[derive(Default)]
struct Forwarder {
	events: Mutex<Option<Arc<EventAdmin>>>,
}

impl ServiceListener for Forwarder {
	fn service_changed(&self, event: &ServiceEvent) {
		let Some(events) = self.events.lock().clone() else {
			// Late callback.
			return;
		};
		let properties = Properties::new()
			.with(EVENT_SERVICE_ID, event.reference.id().get())
			.with(EVENT_SERVICE_PROPERTIES, (*event.reference.properties()).clone());
		events.post(service_event_topic(event.kind), properties);
	}
}

/// Lists the services of its framework and forwards registry changes as events.
pub struct Probe {
	registry: ServiceRegistry,
	forwarder: Arc<Forwarder>,
	listener: Mutex<Option<ListenerId>>,
}

impl Probe {
	pub fn new(registry: ServiceRegistry) -> Self {
		Self {
			registry,
			forwarder: Arc::new(Forwarder::default()),
			listener: Mutex::new(None),
		}
	}

	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("event", EVENT_ADMIN_SPEC, Cardinality::Single))
			.provides(PROBE_SPEC)
			.property(keys::EXPORTED_INTERFACES, vec![PROBE_SPEC])
	}

	/// Properties of every registered service, in registration order.
	pub fn services_info(&self) -> Vec<Properties> {
		self.registry.services().iter().map(|service| (*service.properties()).clone()).collect()
	}
}

impl Component for Probe {
	fn bind(&self, _field: &str, service: &ServiceReference) -> HookResult {
		*self.forwarder.events.lock() = service.get::<Arc<EventAdmin>>();
		Ok(())
	}

	fn unbind(&self, _field: &str, _service: &ServiceReference) -> HookResult {
		*self.forwarder.events.lock() = None;
		Ok(())
	}

	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		let id = self.registry.add_service_listener(Arc::clone(&self.forwarder) as Arc<dyn ServiceListener>);
		*self.listener.lock() = Some(id);
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		if let Some(id) = self.listener.lock().take() {
			self.registry.remove_service_listener(id);
		}
		Ok(())
	}
}

/// Registers the probe factory and starts the probe.
pub fn install(container: &Container) -> windrose_registry::Result<InstanceHandle> {
	let registry = container.registry().clone();
	container.register_factory(Probe::spec(), move |_| Ok(Instantiated::new(Arc::new(Probe::new(registry.clone())))))?;
	container.instantiate(FACTORY, InstanceConfig::new(INSTANCE))
}
