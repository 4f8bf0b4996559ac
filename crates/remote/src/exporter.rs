//! Announces exported services of one framework.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use windrose_registry::{
	Component, ComponentContext, ComponentSpec, HookResult, ListenerId, ServiceEvent, ServiceEventKind, ServiceId, ServiceListener, ServiceReference, ServiceRegistry,
};

use crate::endpoint::{Beacon, EndpointDescription};
use crate::network::LoopbackNetwork;

pub const FACTORY: &str = "windrose-remote-exporter-factory";
pub const INSTANCE: &str = "windrose-remote-exporter";

struct ExportTable {
	framework_uid: String,
	network: LoopbackNetwork,
	exported: Mutex<HashMap<ServiceId, EndpointDescription>>,
}

impl ExportTable {
	fn export(&self, service: &ServiceReference) {
		if self.exported.lock().contains_key(&service.id()) {
			return;
		}
		let Some(endpoint) = EndpointDescription::from_service(&self.framework_uid, service) else {
			return;
		};
		let beacon = Beacon::Add { endpoint: endpoint.clone() };
		match self.network.export(&beacon, service.object().clone()) {
			Ok(()) => {
				tracing::debug!(endpoint = %endpoint.endpoint_id, specs = ?endpoint.specs, "remote.export");
				self.exported.lock().insert(service.id(), endpoint);
			}
			Err(error) => tracing::warn!(service = %service.id(), %error, "failed to export service"),
		}
	}

	fn update(&self, service: &ServiceReference) {
		let known = self.exported.lock().contains_key(&service.id());
		match (known, EndpointDescription::from_service(&self.framework_uid, service)) {
			(false, Some(_)) => self.export(service),
			(false, None) => {}
			(true, None) => self.withdraw(service.id()),
			(true, Some(endpoint)) => {
				if let Err(error) = self.network.publish(&Beacon::Update { endpoint: endpoint.clone() }) {
					tracing::warn!(service = %service.id(), %error, "failed to update endpoint");
				}
				self.exported.lock().insert(service.id(), endpoint);
			}
		}
	}

	fn withdraw(&self, service: ServiceId) {
		let Some(endpoint) = self.exported.lock().remove(&service) else {
			return;
		};
		tracing::debug!(endpoint = %endpoint.endpoint_id, "remote.withdraw");
		let beacon = Beacon::Remove {
			framework_uid: endpoint.framework_uid,
			endpoint_id: endpoint.endpoint_id,
		};
		if let Err(error) = self.network.publish(&beacon) {
			tracing::warn!(%service, %error, "failed to withdraw endpoint");
		}
	}

	fn withdraw_all(&self) {
		let ids: Vec<ServiceId> = self.exported.lock().keys().copied().collect();
		for id in ids {
			self.withdraw(id);
		}
	}
}

impl ServiceListener for ExportTable {
	fn service_changed(&self, event: &ServiceEvent) {
		match event.kind {
			ServiceEventKind::Registered => self.export(&event.reference),
			ServiceEventKind::Modified => self.update(&event.reference),
			ServiceEventKind::Unregistering => self.withdraw(event.reference.id()),
		}
	}
}

/// Exports every local service carrying `service.exported.interfaces` while valid.
pub struct Exporter {
	registry: ServiceRegistry,
	table: Arc<ExportTable>,
	listener: Mutex<Option<ListenerId>>,
}

impl Exporter {
	pub fn new(registry: ServiceRegistry, network: LoopbackNetwork) -> Self {
		let table = Arc::new(ExportTable {
			framework_uid: registry.framework_uid().to_string(),
			network,
			exported: Mutex::new(HashMap::new()),
		});
		Self {
			registry,
			table,
			listener: Mutex::new(None),
		}
	}

	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
	}
}

impl Component for Exporter {
	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		let id = self.registry.add_service_listener(Arc::clone(&self.table) as Arc<dyn ServiceListener>);
		*self.listener.lock() = Some(id);
		for service in self.registry.services() {
			self.table.export(&service);
		}
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		if let Some(id) = self.listener.lock().take() {
			self.registry.remove_service_listener(id);
		}
		self.table.withdraw_all();
		Ok(())
	}
}
