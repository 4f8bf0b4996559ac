//! Compass page: a gauge following the angle events of one compass framework.

use std::sync::Arc;

use parking_lot::Mutex;
use windrose_events::{Event, EventHandler};
use windrose_registry::{
	Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, Instantiated, KeyedFactory, PropValue,
	Requirement, ServiceReference,
};
use windrose_worker::UiDispatcher;

use super::{Creator, DetailsView, HandlerRegistration, PageIdentity, details_service, page_config};
use crate::ui::{Gauge, GaugeRef, Widget, run_on_ui};
use crate::{ANGLE_TOPIC, COMPASS_SPEC, DETAILS_CREATOR_SPEC, DETAILS_SPEC, UI_LOADER_SPEC};

pub const FACTORY: &str = "compass-details-factory";
pub const CREATOR_FACTORY: &str = "compass-details-creator-factory";
pub const CREATOR_INSTANCE: &str = "compass-details-creator";

struct CompassView {
	identity: PageIdentity,
	ui: Mutex<Option<UiDispatcher>>,
	gauge: Mutex<Option<GaugeRef>>,
	last: Mutex<Option<f64>>,
}

impl DetailsView for CompassView {
	fn name(&self) -> &str {
		"Compass"
	}

	fn uid(&self) -> Option<&str> {
		self.identity.uid.as_deref()
	}

	fn get_widget(&self) -> Widget {
		let mut gauge = Gauge::new("Heading");
		if let Some(angle) = *self.last.lock() {
			gauge.set(angle);
		}
		let gauge = Arc::new(Mutex::new(gauge));
		*self.gauge.lock() = Some(Arc::clone(&gauge));
		Widget::Gauge(gauge)
	}

	fn clean(&self) {
		self.gauge.lock().take();
	}
}

impl EventHandler for CompassView {
	fn accepts(&self, event: &Event) -> bool {
		event.framework_uid() == Some(self.identity.origin.as_str())
	}

	fn handle_event(&self, event: &Event) -> anyhow::Result<()> {
		let Some(angle) = event.property("angle").and_then(PropValue::as_float) else {
			anyhow::bail!("{} event without an angle", event.topic());
		};
		*self.last.lock() = Some(angle);
		let ui = self.ui.lock().clone();
		let gauge = self.gauge.lock().clone();
		if let (Some(ui), Some(gauge)) = (ui, gauge) {
			run_on_ui(&ui, "compass.update", move || gauge.lock().set(angle));
		}
		Ok(())
	}
}

/// Compass page component for one compass framework.
pub struct CompassDetails {
	view: Arc<CompassView>,
	handler: HandlerRegistration,
}

impl CompassDetails {
	pub fn new(config: &InstanceConfig) -> Self {
		Self {
			view: Arc::new(CompassView {
				identity: PageIdentity::from_config(config),
				ui: Mutex::new(None),
				gauge: Mutex::new(None),
				last: Mutex::new(None),
			}),
			handler: HandlerRegistration::default(),
		}
	}

	/// Valid only for frameworks exporting a compass.
	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("compass", COMPASS_SPEC, Cardinality::Single))
			.requires(Requirement::new("ui", UI_LOADER_SPEC, Cardinality::Single))
			.provides(DETAILS_SPEC)
	}

	fn instantiated(config: &InstanceConfig) -> Instantiated {
		let component = Arc::new(Self::new(config));
		let view = Arc::clone(&component.view) as Arc<dyn DetailsView>;
		Instantiated::providing(component, details_service(view))
	}
}

impl Component for CompassDetails {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		if field == "ui" {
			*self.view.ui.lock() = service.get::<UiDispatcher>();
		}
		Ok(())
	}

	fn unbind(&self, field: &str, _service: &ServiceReference) -> HookResult {
		if field == "ui" {
			*self.view.ui.lock() = None;
		}
		Ok(())
	}

	fn validate(&self, ctx: &ComponentContext) -> HookResult {
		let handler = Arc::clone(&self.view) as Arc<dyn EventHandler>;
		self.handler.register(ctx.registry(), &[ANGLE_TOPIC], self.view.uid(), handler);
		Ok(())
	}

	fn invalidate(&self, ctx: &ComponentContext) -> HookResult {
		self.handler.unregister(ctx.registry());
		Ok(())
	}
}

/// Registers the page factory and starts the creator instance.
pub fn install(container: &Container) -> windrose_registry::Result<InstanceHandle> {
	container.register_factory(CompassDetails::spec(), |config| Ok(CompassDetails::instantiated(config)))?;

	let pages = container.clone();
	let local_uid = container.registry().framework_uid().to_string();
	container.register_factory(Creator::spec(CREATOR_FACTORY, DETAILS_CREATOR_SPEC), move |_| {
		let local_uid = local_uid.clone();
		Ok(Creator::instantiated(KeyedFactory::new(pages.clone(), FACTORY, move |key| {
			page_config("compass-details", key, "compass", &local_uid)
		})))
	})?;
	container.instantiate(CREATOR_FACTORY, InstanceConfig::new(CREATOR_INSTANCE))
}
