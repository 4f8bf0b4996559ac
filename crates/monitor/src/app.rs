//! Assembly of the monitor and compass frameworks.

use std::sync::Arc;

use anyhow::Context;
use windrose_events::EventAdmin;
use windrose_registry::{Framework, FrameworkConfig, InstanceHandle, Properties, ServiceHandle};
use windrose_remote::{LoopbackNetwork, RemoteServices};
use windrose_worker::UiDispatcher;

use crate::compass::{self, MagneticSensor, SimulatedSensor, sensor_service};
use crate::config::Config;
use crate::frame::MainFrame;
use crate::ui::register_loader;
use crate::{MAGNETIC_SENSOR_SPEC, bridges, details, frame, framework_info, probe};

/// Starts one simulated compass framework on `network`.
///
/// Sensor seeds are offset by `index` so every compass drifts differently.
pub fn start_compass(config: &Config, network: &LoopbackNetwork, index: usize) -> anyhow::Result<Framework> {
	let framework = Framework::new(FrameworkConfig {
		uid: None,
		registry: config.registry.clone(),
	});
	let container = framework.container();
	EventAdmin::install(container)?;
	RemoteServices::install(container, network)?;
	probe::install(container)?;

	let seed = config.compass.seed.map(|seed| seed.wrapping_add(index as u64));
	let sensor: Arc<dyn MagneticSensor> = Arc::new(SimulatedSensor::new(seed));
	framework.registry().register_object([MAGNETIC_SENSOR_SPEC], Properties::new(), sensor_service(sensor));
	compass::install(container, config.compass.tick())?;

	tracing::info!(uid = framework.uid(), index, "compass framework started");
	Ok(framework)
}

/// The monitor framework with its UI thread and main frame.
pub struct Monitor {
	framework: Framework,
	ui: UiDispatcher,
	frame: InstanceHandle,
	_loader: ServiceHandle,
}

impl Monitor {
	pub fn start(config: &Config, network: &LoopbackNetwork) -> anyhow::Result<Self> {
		let ui = UiDispatcher::spawn("windrose-ui").context("failed to start the UI thread")?;
		let framework = Framework::new(FrameworkConfig {
			uid: None,
			registry: config.registry.clone(),
		});
		let loader = register_loader(framework.registry(), &ui);

		let container = framework.container();
		EventAdmin::install(container)?;
		RemoteServices::install(container, network)?;
		probe::install(container)?;
		framework_info::install(container)?;
		details::services::install(container)?;
		details::compass::install(container)?;
		bridges::install(container)?;
		let frame = frame::install(container)?;

		tracing::info!(uid = framework.uid(), "monitor started");
		Ok(Self {
			framework,
			ui,
			frame,
			_loader: loader,
		})
	}

	pub fn framework(&self) -> &Framework {
		&self.framework
	}

	#[cfg(test)]
	pub fn ui(&self) -> &UiDispatcher {
		&self.ui
	}

	fn main_frame(&self) -> Option<Arc<MainFrame>> {
		self.frame.component::<MainFrame>()
	}

	/// Text of the main frame once every queued UI callback has run.
	pub fn render(&self) -> String {
		if self.ui.flush().is_err() {
			return String::new();
		}
		self.main_frame().map(|frame| frame.render()).unwrap_or_default()
	}

	/// Titles of the framework tabs once every queued UI callback has run.
	pub fn tab_titles(&self) -> Vec<String> {
		if self.ui.flush().is_err() {
			return Vec::new();
		}
		self.main_frame().map(|frame| frame.tab_titles()).unwrap_or_default()
	}

	/// Stops the framework, lets the UI drain, then ends the UI thread.
	pub fn stop(&self) {
		self.framework.stop();
		let _ = self.ui.flush();
		self.ui.shutdown();
	}
}

impl Drop for Monitor {
	fn drop(&mut self) {
		self.stop();
	}
}
