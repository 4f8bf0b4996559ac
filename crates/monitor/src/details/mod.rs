//! Detail pages shown inside the tab of one framework.
//!
//! Each kind of page has a creator service, a [`KeyedFactory`] making one
//! page component per framework key. Page components publish a
//! [`DetailsView`] and, while valid, an exported event handler that only
//! accepts events posted in the framework they describe.

pub mod compass;
pub mod services;

use std::sync::Arc;

use parking_lot::Mutex;
use windrose_events::{EVENT_HANDLER_SPEC, EventHandler, handler_service, keys as event_keys};
use windrose_registry::props::keys;
use windrose_registry::{
	Component, ComponentContext, ComponentSpec, HookResult, InstanceConfig, InstanceKey, Instantiated, KeyedFactory, Properties, ServiceHandle, ServiceObject,
	ServiceRegistry,
};

use crate::PROBE_UID;
use crate::ui::Widget;

/// Instance property naming the framework whose events a page accepts.
pub const ORIGIN_FRAMEWORK: &str = "details.origin.framework.uid";

/// A page of the framework-info tab.
pub trait DetailsView: Send + Sync + 'static {
	/// Tab title.
	fn name(&self) -> &str;

	/// Framework described by the page; `None` for the local one.
	fn uid(&self) -> Option<&str>;

	/// Builds the page. UI thread only.
	fn get_widget(&self) -> Widget;

	/// Drops the page's widgets. UI thread only.
	fn clean(&self);
}

pub fn details_service(view: Arc<dyn DetailsView>) -> ServiceObject {
	ServiceObject::new(view)
}

/// Instance configuration shared by every page kind.
///
/// `requirement` is narrowed to services imported from the key's framework;
/// the local key accepts the events of `local_uid`.
pub(crate) fn page_config(prefix: &str, key: &InstanceKey, requirement: &str, local_uid: &str) -> InstanceConfig {
	let mut config = InstanceConfig::new(format!("{prefix}-{}", key.label()))
		.filter(requirement, key.filter_on(keys::ENDPOINT_FRAMEWORK_UUID))
		.property(ORIGIN_FRAMEWORK, key.as_str().unwrap_or(local_uid));
	if let Some(uid) = key.as_str() {
		config = config.property(PROBE_UID, uid);
	}
	config
}

/// Page identity read back from its instance configuration.
pub(crate) struct PageIdentity {
	pub uid: Option<String>,
	pub origin: String,
}

impl PageIdentity {
	pub fn from_config(config: &InstanceConfig) -> Self {
		Self {
			uid: config.get_str(PROBE_UID).map(str::to_string),
			origin: config.get_str(ORIGIN_FRAMEWORK).unwrap_or_default().to_string(),
		}
	}
}

/// The event handler service of a page, registered while the page is valid.
#[derive(Default)]
pub(crate) struct HandlerRegistration {
	handle: Mutex<Option<ServiceHandle>>,
}

impl HandlerRegistration {
	pub fn register(&self, registry: &ServiceRegistry, topics: &[&str], uid: Option<&str>, handler: Arc<dyn EventHandler>) {
		let mut properties = Properties::new()
			.with(event_keys::EVENT_TOPICS, topics.to_vec())
			.with(keys::EXPORTED_INTERFACES, vec![EVENT_HANDLER_SPEC]);
		if let Some(uid) = uid {
			properties.insert(PROBE_UID, uid);
		}
		let handle = registry.register_object([EVENT_HANDLER_SPEC], properties, handler_service(handler));
		if let Some(previous) = self.handle.lock().replace(handle) {
			registry.unregister(&previous);
		}
	}

	pub fn unregister(&self, registry: &ServiceRegistry) {
		if let Some(handle) = self.handle.lock().take() {
			registry.unregister(&handle);
		}
	}
}

/// Publishes a [`KeyedFactory`] and deletes everything it made on invalidate.
pub struct Creator {
	keyed: Arc<KeyedFactory>,
}

impl Creator {
	pub fn spec(factory: &str, provides: &str) -> ComponentSpec {
		ComponentSpec::new(factory.to_string()).provides(provides.to_string())
	}

	pub fn instantiated(keyed: KeyedFactory) -> Instantiated {
		let keyed = Arc::new(keyed);
		let service = ServiceObject::new(Arc::clone(&keyed));
		Instantiated::providing(Arc::new(Self { keyed }), service)
	}
}

impl Component for Creator {
	fn invalidate(&self, ctx: &ComponentContext) -> HookResult {
		tracing::debug!(instance = ctx.instance_name(), made = self.keyed.len(), "creator.clear");
		self.keyed.clear();
		Ok(())
	}
}
