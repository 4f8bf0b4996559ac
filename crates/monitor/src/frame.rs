//! Main frame: one tab per known framework.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use windrose_registry::{
	ActivationGate, Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, InstanceKey, Instantiated,
	Requirement, ServiceId, ServiceReference,
};
use windrose_worker::UiDispatcher;

use crate::framework_info::FrameworkInfo;
use crate::ui::{Tabs, TabsRef, Widget, run_on_ui};
use crate::{FRAMEWORK_INFO_SPEC, MAIN_FRAME_SPEC, UI_LOADER_SPEC};

pub const FACTORY: &str = "main-frame-factory";
pub const INSTANCE: &str = "main-frame";

struct FrameUi {
	frameworks: TabsRef,
	pages: HashMap<InstanceKey, Widget>,
}

type FrameSlot = Arc<Mutex<Option<FrameUi>>>;

fn add_info_tab(frame: &FrameSlot, info: &FrameworkInfo) {
	let Some(tabs) = frame.lock().as_ref().map(|ui| Arc::clone(&ui.frameworks)) else {
		return;
	};
	let widget = info.get_widget();
	tabs.lock().add_tab(info.name(), widget.clone());
	if let Some(ui) = frame.lock().as_mut() {
		ui.pages.insert(info.key(), widget);
	}
}

fn remove_info_tab(frame: &FrameSlot, info: &FrameworkInfo) {
	let removed = frame.lock().as_mut().and_then(|ui| ui.pages.remove(&info.key()).map(|w| (Arc::clone(&ui.frameworks), w)));
	if let Some((tabs, widget)) = removed {
		let mut tabs = tabs.lock();
		if let Some(index) = tabs.index_of(&widget) {
			tabs.remove_tab(index);
		}
	}
	info.clean();
}

/// Top-level window of the monitor.
#[derive(Default)]
pub struct MainFrame {
	gate: ActivationGate,
	ui: Mutex<Option<UiDispatcher>>,
	infos: Mutex<IndexMap<ServiceId, Arc<FrameworkInfo>>>,
	frame: FrameSlot,
}

impl MainFrame {
	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("ui", UI_LOADER_SPEC, Cardinality::Single))
			.requires(Requirement::new("infos", FRAMEWORK_INFO_SPEC, Cardinality::OptionalAggregate))
			.provides(MAIN_FRAME_SPEC)
	}

	/// Titles of the framework tabs currently shown.
	pub fn tab_titles(&self) -> Vec<String> {
		let tabs = self.frame.lock().as_ref().map(|ui| Arc::clone(&ui.frameworks));
		tabs.map(|tabs| tabs.lock().titles().into_iter().map(str::to_string).collect()).unwrap_or_default()
	}

	/// Text rendering of the whole frame; empty while the frame is closed.
	pub fn render(&self) -> String {
		let tabs = self.frame.lock().as_ref().map(|ui| Arc::clone(&ui.frameworks));
		tabs.map(|tabs| Widget::Tabs(tabs).render()).unwrap_or_default()
	}

	fn post(&self, what: &'static str, f: impl FnOnce(&FrameSlot) + Send + 'static) {
		let Some(ui) = self.ui.lock().clone() else {
			return;
		};
		let frame = Arc::clone(&self.frame);
		run_on_ui(&ui, what, move || f(&frame));
	}
}

impl Component for MainFrame {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"ui" => *self.ui.lock() = service.get::<UiDispatcher>(),
			"infos" => {
				let Some(info) = service.get::<Arc<FrameworkInfo>>() else {
					anyhow::bail!("service {} is not a framework info", service.id());
				};
				self.infos.lock().insert(service.id(), Arc::clone(&info));
				self.gate.when_active(|| self.post("frame.add_info_tab", move |frame| add_info_tab(frame, &info)));
			}
			_ => {}
		}
		Ok(())
	}

	fn unbind(&self, field: &str, service: &ServiceReference) -> HookResult {
		match field {
			"ui" => *self.ui.lock() = None,
			"infos" => {
				let Some(info) = self.infos.lock().shift_remove(&service.id()) else {
					return Ok(());
				};
				self.gate.when_active(|| self.post("frame.remove_info_tab", move |frame| remove_info_tab(frame, &info)));
			}
			_ => {}
		}
		Ok(())
	}

	fn validate(&self, ctx: &ComponentContext) -> HookResult {
		tracing::info!(instance = ctx.instance_name(), "main frame opening");
		self.gate.activate(|| {
			self.post("frame.make_ui", |frame| {
				*frame.lock() = Some(FrameUi {
					frameworks: Arc::new(Mutex::new(Tabs::new())),
					pages: HashMap::new(),
				});
			});
			let infos: Vec<Arc<FrameworkInfo>> = self.infos.lock().values().cloned().collect();
			for info in infos {
				self.post("frame.add_info_tab", move |frame| add_info_tab(frame, &info));
			}
		});
		Ok(())
	}

	fn invalidate(&self, ctx: &ComponentContext) -> HookResult {
		tracing::info!(instance = ctx.instance_name(), "main frame closing");
		self.gate.deactivate(|| {
			let infos: Vec<Arc<FrameworkInfo>> = self.infos.lock().values().cloned().collect();
			for info in infos {
				self.post("frame.remove_info_tab", move |frame| remove_info_tab(frame, &info));
			}
			self.post("frame.clear_ui", |frame| {
				frame.lock().take();
			});
		});
		Ok(())
	}
}

/// Registers the main frame factory and opens the frame.
pub fn install(container: &Container) -> windrose_registry::Result<InstanceHandle> {
	container.register_factory(MainFrame::spec(), |_| Ok(Instantiated::new(Arc::new(MainFrame::default()))))?;
	container.instantiate(FACTORY, InstanceConfig::new(INSTANCE))
}
