//! Framework info: the tab of one probed framework, holding its detail pages.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use windrose_registry::props::keys;
use windrose_registry::{
	Cardinality, Component, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, InstanceKey, Instantiated, KeyedFactory, Requirement, ServiceId,
	ServiceReference,
};
use windrose_worker::UiDispatcher;

use crate::details::{Creator, DetailsView};
use crate::ui::{Tabs, TabsRef, Widget, run_on_ui};
use crate::{DETAILS_SPEC, FRAMEWORK_INFO_CREATOR_SPEC, FRAMEWORK_INFO_SPEC, PROBE_SPEC, PROBE_UID, UI_LOADER_SPEC};

pub const FACTORY: &str = "framework-info-factory";
pub const CREATOR_FACTORY: &str = "framework-info-creator-factory";
pub const CREATOR_INSTANCE: &str = "framework-info-creator";

/// Configuration of the framework-info instance of `key`.
///
/// Its probe must come from that framework, and its pages must carry the
/// same `core.probe.uid`.
pub fn configure(key: &InstanceKey) -> InstanceConfig {
	let mut config = InstanceConfig::new(format!("framework-info-{}", key.label()))
		.filter("probe", key.filter_on(keys::ENDPOINT_FRAMEWORK_UUID))
		.filter("details", key.filter_on(PROBE_UID));
	if let Some(uid) = key.as_str() {
		config = config.property(PROBE_UID, uid);
	}
	config
}

#[derive(Default)]
struct InfoState {
	details: IndexMap<ServiceId, Arc<dyn DetailsView>>,
	tabs: Option<TabsRef>,
	pages: HashMap<ServiceId, Widget>,
}

/// Adds the page of `id` unless it is gone or already shown. UI thread only.
fn add_tab(state: &Mutex<InfoState>, id: ServiceId) {
	let (tabs, view) = {
		let state = state.lock();
		let Some(view) = state.details.get(&id) else {
			return;
		};
		if state.pages.contains_key(&id) {
			return;
		}
		let Some(tabs) = state.tabs.clone() else {
			return;
		};
		(tabs, Arc::clone(view))
	};
	let widget = view.get_widget();
	tabs.lock().add_tab(view.name(), widget.clone());
	state.lock().pages.insert(id, widget);
}

/// UI thread only.
fn remove_tab(state: &Mutex<InfoState>, id: ServiceId) {
	let (tabs, widget) = {
		let mut state = state.lock();
		(state.tabs.clone(), state.pages.remove(&id))
	};
	if let (Some(tabs), Some(widget)) = (tabs, widget) {
		let mut tabs = tabs.lock();
		if let Some(index) = tabs.index_of(&widget) {
			tabs.remove_tab(index);
		}
	}
}

/// Tab widget describing one framework.
pub struct FrameworkInfo {
	uid: Option<String>,
	ui: Mutex<Option<UiDispatcher>>,
	state: Arc<Mutex<InfoState>>,
}

impl FrameworkInfo {
	pub fn new(config: &InstanceConfig) -> Self {
		Self {
			uid: config.get_str(PROBE_UID).map(str::to_string),
			ui: Mutex::new(None),
			state: Arc::new(Mutex::new(InfoState::default())),
		}
	}

	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("probe", PROBE_SPEC, Cardinality::Single))
			.requires(Requirement::new("ui", UI_LOADER_SPEC, Cardinality::Single))
			.requires(Requirement::new("details", DETAILS_SPEC, Cardinality::OptionalAggregate))
			.provides(FRAMEWORK_INFO_SPEC)
	}

	/// Tab title: the framework UID, or `Local`.
	pub fn name(&self) -> &str {
		self.uid.as_deref().unwrap_or("Local")
	}

	pub fn key(&self) -> InstanceKey {
		InstanceKey::new(self.uid.as_deref())
	}

	/// Builds the tab widget, or returns the existing one. UI thread only.
	pub fn get_widget(&self) -> Widget {
		let (tabs, pending) = {
			let mut state = self.state.lock();
			if let Some(tabs) = &state.tabs {
				return Widget::Tabs(Arc::clone(tabs));
			}
			let tabs = Arc::new(Mutex::new(Tabs::new()));
			state.tabs = Some(Arc::clone(&tabs));
			(tabs, state.details.keys().copied().collect::<Vec<_>>())
		};
		for id in pending {
			add_tab(&self.state, id);
		}
		Widget::Tabs(tabs)
	}

	/// Drops the tab widget and cleans every page. UI thread only.
	pub fn clean(&self) {
		let views: Vec<Arc<dyn DetailsView>> = {
			let mut state = self.state.lock();
			state.tabs = None;
			state.pages.clear();
			state.details.values().cloned().collect()
		};
		for view in views {
			if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| view.clean())).is_err() {
				tracing::warn!(framework = self.name(), page = view.name(), "page failed to clean up");
			}
		}
	}
}

impl Component for FrameworkInfo {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"ui" => *self.ui.lock() = service.get::<UiDispatcher>(),
			"details" => {
				let Some(view) = service.get::<Arc<dyn DetailsView>>() else {
					anyhow::bail!("service {} is not a details page", service.id());
				};
				let id = service.id();
				let shown = {
					let mut state = self.state.lock();
					state.details.insert(id, view);
					state.tabs.is_some()
				};
				if shown && let Some(ui) = self.ui.lock().clone() {
					let state = Arc::clone(&self.state);
					run_on_ui(&ui, "framework_info.add_tab", move || add_tab(&state, id));
				}
			}
			_ => {}
		}
		Ok(())
	}

	fn unbind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"ui" => *self.ui.lock() = None,
			"details" => {
				let id = service.id();
				let shown = {
					let mut state = self.state.lock();
					state.details.shift_remove(&id);
					state.tabs.is_some()
				};
				if shown && let Some(ui) = self.ui.lock().clone() {
					let state = Arc::clone(&self.state);
					run_on_ui(&ui, "framework_info.remove_tab", move || remove_tab(&state, id));
				}
			}
			_ => {}
		}
		Ok(())
	}
}

/// Registers the framework-info factory and starts its creator.
pub fn install(container: &Container) -> windrose_registry::Result<InstanceHandle> {
	container.register_factory(FrameworkInfo::spec(), |config| Ok(Instantiated::new(Arc::new(FrameworkInfo::new(config)))))?;

	let infos = container.clone();
	container.register_factory(Creator::spec(CREATOR_FACTORY, FRAMEWORK_INFO_CREATOR_SPEC), move |_| {
		Ok(Creator::instantiated(KeyedFactory::new(infos.clone(), FACTORY, configure)))
	})?;
	container.instantiate(CREATOR_FACTORY, InstanceConfig::new(CREATOR_INSTANCE))
}
