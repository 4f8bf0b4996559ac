//! Registers local proxies for endpoints announced by other frameworks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use windrose_registry::{ActivationGate, Component, ComponentContext, ComponentSpec, HookResult, ServiceHandle, ServiceRegistry};

use crate::endpoint::{Beacon, EndpointDescription};
use crate::network::{BeaconListener, LoopbackNetwork, PeerId};

pub const FACTORY: &str = "windrose-remote-importer-factory";
pub const INSTANCE: &str = "windrose-remote-importer";

struct ImportTable {
	registry: ServiceRegistry,
	network: LoopbackNetwork,
	gate: ActivationGate,
	imported: Mutex<HashMap<String, ServiceHandle>>,
}

impl ImportTable {
	fn apply(&self, beacon: Beacon) {
		if beacon.framework_uid() == self.registry.framework_uid() {
			return;
		}
		match beacon {
			Beacon::Add { endpoint } | Beacon::Update { endpoint } => self.upsert(&endpoint),
			Beacon::Remove { endpoint_id, .. } => self.remove(&endpoint_id),
		}
	}

	fn upsert(&self, endpoint: &EndpointDescription) {
		let existing = self.imported.lock().get(&endpoint.endpoint_id).cloned();
		if let Some(handle) = existing {
			tracing::debug!(endpoint = %endpoint.endpoint_id, "remote.import.update");
			self.registry.update_properties(&handle, endpoint.import_properties());
			return;
		}
		let Some(object) = self.network.resolve(&endpoint.endpoint_id) else {
			tracing::warn!(endpoint = %endpoint.endpoint_id, "endpoint announced without a resolvable service");
			return;
		};
		tracing::debug!(endpoint = %endpoint.endpoint_id, specs = ?endpoint.specs, "remote.import");
		let handle = self.registry.register_object(endpoint.specs.iter().map(String::as_str), endpoint.import_properties(), object);
		self.imported.lock().insert(endpoint.endpoint_id.clone(), handle);
	}

	fn remove(&self, endpoint_id: &str) {
		let removed = self.imported.lock().remove(endpoint_id);
		if let Some(handle) = removed {
			tracing::debug!(endpoint = endpoint_id, "remote.import.removed");
			self.registry.unregister(&handle);
		}
	}

	fn remove_all(&self) {
		let drained: Vec<ServiceHandle> = self.imported.lock().drain().map(|(_, handle)| handle).collect();
		for handle in drained {
			self.registry.unregister(&handle);
		}
	}
}

impl BeaconListener for ImportTable {
	fn on_beacon(&self, raw: &str) {
		let beacon = match Beacon::from_json(raw) {
			Ok(beacon) => beacon,
			Err(error) => {
				tracing::warn!(%error, "dropping malformed beacon");
				return;
			}
		};
		// Registry first, then gate: the same order as the invalidate hook.
		self.registry.serialized(|| {
			self.gate.when_active(|| self.apply(beacon));
		});
	}
}

/// Imports every endpoint of the other frameworks on the network while valid.
pub struct Importer {
	table: Arc<ImportTable>,
	peer: Mutex<Option<PeerId>>,
}

impl Importer {
	pub fn new(registry: ServiceRegistry, network: LoopbackNetwork) -> Self {
		Self {
			table: Arc::new(ImportTable {
				registry,
				network,
				gate: ActivationGate::new(),
				imported: Mutex::new(HashMap::new()),
			}),
			peer: Mutex::new(None),
		}
	}

	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
	}
}

impl Component for Importer {
	fn validate(&self, ctx: &ComponentContext) -> HookResult {
		let table = Arc::clone(&self.table);
		let peer = self.table.gate.activate(|| table.network.join(ctx.framework_uid(), Arc::clone(&table) as Arc<dyn BeaconListener>))?;
		*self.peer.lock() = Some(peer);
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		self.table.gate.deactivate(|| {
			if let Some(peer) = self.peer.lock().take() {
				self.table.network.leave(peer);
			}
			self.table.remove_all();
		});
		Ok(())
	}
}
