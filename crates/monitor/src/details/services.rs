//! Services page: one table row per service of the probed framework.

use std::sync::Arc;

use parking_lot::Mutex;
use windrose_events::{Event, EventHandler};
use windrose_registry::props::keys;
use windrose_registry::{
	Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, Instantiated, KeyedFactory, PropValue,
	Properties, Requirement, ServiceEventKind, ServiceReference,
};
use windrose_worker::UiDispatcher;

use super::{Creator, DetailsView, HandlerRegistration, PageIdentity, details_service, page_config};
use crate::probe::{EVENT_SERVICE_ID, EVENT_SERVICE_PROPERTIES, Probe, service_event_topic};
use crate::ui::{Table, TableRef, Widget, run_on_ui};
use crate::{DETAILS_CREATOR_SPEC, DETAILS_SPEC, PROBE_SPEC, SERVICE_EVENT_PREFIX, UI_LOADER_SPEC};

pub const FACTORY: &str = "services-details-factory";
pub const CREATOR_FACTORY: &str = "services-details-creator-factory";
pub const CREATOR_INSTANCE: &str = "services-details-creator";

const HEADERS: [&str; 3] = ["ID", "Specifications", "Properties"];

fn is_removal(topic: &str) -> bool {
	topic == service_event_topic(ServiceEventKind::Unregistering)
}

/// Splits service properties into a table row: id, then specifications, then the rest.
pub fn service_row(properties: &Properties) -> Option<(String, Vec<String>)> {
	let mut rest = properties.clone();
	let id = rest.remove(keys::SERVICE_ID)?.to_string();
	let specs = rest.remove(keys::OBJECT_CLASS).map(|specs| specs.strings().collect::<Vec<_>>().join(", ")).unwrap_or_default();
	Some((id, vec![specs, rest.to_string()]))
}

struct ServicesView {
	identity: PageIdentity,
	ui: Mutex<Option<UiDispatcher>>,
	probe: Mutex<Option<Arc<Probe>>>,
	table: Mutex<Option<TableRef>>,
}

impl DetailsView for ServicesView {
	fn name(&self) -> &str {
		"Services"
	}

	fn uid(&self) -> Option<&str> {
		self.identity.uid.as_deref()
	}

	fn get_widget(&self) -> Widget {
		let mut table = Table::new(HEADERS);
		if let Some(probe) = self.probe.lock().clone() {
			for properties in probe.services_info() {
				if let Some((id, values)) = service_row(&properties) {
					table.upsert_line(&id, values);
				}
			}
		}
		let table = Arc::new(Mutex::new(table));
		*self.table.lock() = Some(Arc::clone(&table));
		Widget::Table(table)
	}

	fn clean(&self) {
		self.table.lock().take();
	}
}

impl EventHandler for ServicesView {
	fn accepts(&self, event: &Event) -> bool {
		event.framework_uid() == Some(self.identity.origin.as_str())
	}

	fn handle_event(&self, event: &Event) -> anyhow::Result<()> {
		let Some(ui) = self.ui.lock().clone() else {
			// Late call.
			return Ok(());
		};
		let Some(table) = self.table.lock().clone() else {
			return Ok(());
		};
		let Some(id) = event.property(EVENT_SERVICE_ID).and_then(PropValue::as_int) else {
			anyhow::bail!("{} event without {EVENT_SERVICE_ID}", event.topic());
		};
		if is_removal(event.topic()) {
			run_on_ui(&ui, "services.remove", move || {
				table.lock().remove_line(&id.to_string());
			});
			return Ok(());
		}

		let mut properties = event.property(EVENT_SERVICE_PROPERTIES).and_then(PropValue::as_map).cloned().unwrap_or_default();
		properties.insert(keys::SERVICE_ID, id);
		let Some((ident, values)) = service_row(&properties) else {
			return Ok(());
		};
		run_on_ui(&ui, "services.update", move || table.lock().upsert_line(&ident, values));
		Ok(())
	}
}

/// Services page component for one framework.
pub struct ServicesDetails {
	view: Arc<ServicesView>,
	handler: HandlerRegistration,
}

impl ServicesDetails {
	pub fn new(config: &InstanceConfig) -> Self {
		Self {
			view: Arc::new(ServicesView {
				identity: PageIdentity::from_config(config),
				ui: Mutex::new(None),
				probe: Mutex::new(None),
				table: Mutex::new(None),
			}),
			handler: HandlerRegistration::default(),
		}
	}

	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("probe", PROBE_SPEC, Cardinality::Single))
			.requires(Requirement::new("ui", UI_LOADER_SPEC, Cardinality::Single))
			.provides(DETAILS_SPEC)
	}

	fn instantiated(config: &InstanceConfig) -> Instantiated {
		let component = Arc::new(Self::new(config));
		let view = Arc::clone(&component.view) as Arc<dyn DetailsView>;
		Instantiated::providing(component, details_service(view))
	}
}

impl Component for ServicesDetails {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"probe" => *self.view.probe.lock() = service.get::<Arc<Probe>>(),
			"ui" => *self.view.ui.lock() = service.get::<UiDispatcher>(),
			_ => {}
		}
		Ok(())
	}

	fn unbind(&self, field: &str, _service: &ServiceReference) -> HookResult {
		match field {
			"probe" => *self.view.probe.lock() = None,
			"ui" => *self.view.ui.lock() = None,
			_ => {}
		}
		Ok(())
	}

	fn validate(&self, ctx: &ComponentContext) -> HookResult {
		let topic = format!("{SERVICE_EVENT_PREFIX}/*");
		let handler = Arc::clone(&self.view) as Arc<dyn EventHandler>;
		self.handler.register(ctx.registry(), &[topic.as_str()], self.view.uid(), handler);
		Ok(())
	}

	fn invalidate(&self, ctx: &ComponentContext) -> HookResult {
		self.handler.unregister(ctx.registry());
		Ok(())
	}
}

/// Registers the page factory and starts the creator instance.
pub fn install(container: &Container) -> windrose_registry::Result<InstanceHandle> {
	container.register_factory(ServicesDetails::spec(), |config| Ok(ServicesDetails::instantiated(config)))?;

	let pages = container.clone();
	let local_uid = container.registry().framework_uid().to_string();
	container.register_factory(Creator::spec(CREATOR_FACTORY, DETAILS_CREATOR_SPEC), move |_| {
		let local_uid = local_uid.clone();
		Ok(Creator::instantiated(KeyedFactory::new(pages.clone(), FACTORY, move |key| {
			page_config("services-details", key, "probe", &local_uid)
		})))
	})?;
	container.instantiate(CREATOR_FACTORY, InstanceConfig::new(CREATOR_INSTANCE))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn rows_split_identity_from_the_other_properties() {
		let properties = Properties::new()
			.with(keys::OBJECT_CLASS, vec!["windrose.probe", "windrose.extra"])
			.with(keys::SERVICE_ID, 12)
			.with("instance.name", "basic-probe");
		let (id, values) = service_row(&properties).unwrap();
		assert_eq!(id, "12");
		assert_eq!(values, vec!["windrose.probe, windrose.extra".to_string(), "{instance.name: basic-probe}".to_string()]);
	}

	#[test]
	fn unregistered_topic_removes_the_row() {
		let topic = service_event_topic(ServiceEventKind::Unregistering);
		assert_eq!(topic, format!("{SERVICE_EVENT_PREFIX}/UNREGISTERED"));
		assert!(is_removal(&topic));
		assert!(!is_removal(&service_event_topic(ServiceEventKind::Modified)));
	}

	#[test]
	fn rows_need_a_service_id() {
		assert!(service_row(&Properties::new().with(keys::OBJECT_CLASS, "x")).is_none());
	}
}
