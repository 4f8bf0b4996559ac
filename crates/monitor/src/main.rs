//! Windrose monitor.
//!
//! Starts one monitor framework and a number of simulated compass
//! frameworks on a loopback discovery network. The monitor imports the
//! probe of every framework and shows one tab per framework, with a live
//! table of its services and, for compasses, the current heading.

mod app;
mod bridges;
mod cli;
mod compass;
mod config;
mod details;
mod frame;
mod framework_info;
mod probe;
#[cfg(test)]
mod tests;
mod ui;

use std::time::Instant;

use app::{Monitor, start_compass};
use clap::Parser;
use cli::Cli;
use config::Config;
use windrose_remote::LoopbackNetwork;

/// Probe of one framework's registry.
pub const PROBE_SPEC: &str = "windrose.probe";
/// UID of the framework a probe-dependent service describes.
pub const PROBE_UID: &str = "core.probe.uid";
/// The UI dispatcher.
pub const UI_LOADER_SPEC: &str = "windrose.ui.loader";
pub const MAIN_FRAME_SPEC: &str = "windrose.ui.frame.main";
pub const FRAMEWORK_INFO_CREATOR_SPEC: &str = "windrose.framework.info.factory";
pub const FRAMEWORK_INFO_SPEC: &str = "windrose.framework.info";
pub const DETAILS_CREATOR_SPEC: &str = "windrose.framework.details.factory";
pub const DETAILS_SPEC: &str = "windrose.framework.details";
pub const COMPASS_SPEC: &str = "windrose.compass";
pub const MAGNETIC_SENSOR_SPEC: &str = "windrose.hardware.magnetic";
/// Topic of the heading events posted by compass senders.
pub const ANGLE_TOPIC: &str = "windrose/compass/angle";
/// Prefix of the registry events forwarded by probes.
pub const SERVICE_EVENT_PREFIX: &str = "windrose/framework/ServiceEvent";

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(&cli);

	let mut config = Config::load(cli.config.as_deref())?;
	cli.apply(&mut config);
	config.validate()?;

	run(&config)
}

fn setup_tracing(cli: &Cli) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(true).init();
}

fn run(config: &Config) -> anyhow::Result<()> {
	let network = LoopbackNetwork::new()?;
	let monitor = Monitor::start(config, &network)?;
	let compasses = (0..config.compass.frameworks)
		.map(|index| start_compass(config, &network, index))
		.collect::<anyhow::Result<Vec<_>>>()?;
	tracing::info!(monitor = monitor.framework().uid(), compasses = compasses.len(), "windrose running");

	let deadline = config.monitor.duration().map(|duration| Instant::now() + duration);
	loop {
		let wait = match deadline {
			Some(deadline) => config.monitor.refresh().min(deadline.saturating_duration_since(Instant::now())),
			None => config.monitor.refresh(),
		};
		std::thread::sleep(wait);
		network.flush()?;
		print_frame(&monitor);
		if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			break;
		}
	}

	for compass in &compasses {
		compass.stop();
	}
	network.flush()?;
	tracing::info!(tabs = ?monitor.tab_titles(), "compasses stopped");
	monitor.stop();
	Ok(())
}

fn print_frame(monitor: &Monitor) {
	println!("{}", "=".repeat(60));
	println!("{}", monitor.render());
}
