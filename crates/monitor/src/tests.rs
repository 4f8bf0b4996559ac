use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use windrose_registry::{Framework, Properties};
use windrose_remote::LoopbackNetwork;

use crate::app::{Monitor, start_compass};
use crate::config::Config;

fn config() -> Config {
	let mut config = Config::default();
	config.compass.tick_ms = 20;
	config.compass.seed = Some(11);
	config
}

/// Polls `check` until it holds, syncing the network and UI in between.
fn wait_for(network: &LoopbackNetwork, monitor: &Monitor, what: &str, check: impl Fn(&Monitor) -> bool) {
	let deadline = Instant::now() + Duration::from_secs(5);
	loop {
		network.flush().unwrap();
		let _ = monitor.ui().flush();
		if check(monitor) {
			return;
		}
		assert!(Instant::now() < deadline, "timed out waiting for {what}:\n{}", monitor.render());
		std::thread::sleep(Duration::from_millis(10));
	}
}

fn start(network: &LoopbackNetwork) -> Monitor {
	Monitor::start(&config(), network).unwrap()
}

fn compass(network: &LoopbackNetwork) -> Framework {
	start_compass(&config(), network, 0).unwrap()
}

#[test]
fn local_framework_is_shown_alone() {
	let network = LoopbackNetwork::new().unwrap();
	let monitor = start(&network);
	wait_for(&network, &monitor, "the local tab", |m| m.tab_titles() == ["Local"]);

	let text = monitor.render();
	assert!(text.starts_with("[Local]\n  [Services]\n"), "{text}");
	assert!(text.contains("windrose.probe"), "{text}");
	assert!(text.contains("windrose.ui.frame.main"), "{text}");
	assert!(!text.contains("[Compass]"), "{text}");
	monitor.stop();
}

#[test]
fn compass_framework_gets_a_tab_with_a_heading() {
	let network = LoopbackNetwork::new().unwrap();
	let monitor = start(&network);
	let remote = compass(&network);
	let uid = remote.uid().to_string();

	wait_for(&network, &monitor, "the compass tab", |m| m.tab_titles().contains(&uid));
	assert_eq!(monitor.tab_titles()[0], "Local");
	wait_for(&network, &monitor, "a heading", |m| m.render().contains("Heading: ") && !m.render().contains("Heading: --"));

	let text = monitor.render();
	let tab = text.find(&format!("[{uid}]")).unwrap();
	let remote_part = &text[tab..];
	assert!(remote_part.contains("  [Services]"), "{text}");
	assert!(remote_part.contains("  [Compass]"), "{text}");
	assert!(remote_part.contains("windrose.compass"), "{text}");
	monitor.stop();
}

#[test]
fn stopped_compass_loses_its_tab() {
	let network = LoopbackNetwork::new().unwrap();
	let monitor = start(&network);
	let remote = compass(&network);
	let uid = remote.uid().to_string();
	wait_for(&network, &monitor, "the compass tab", |m| m.tab_titles().contains(&uid));

	remote.stop();
	wait_for(&network, &monitor, "the tab to go", |m| m.tab_titles() == ["Local"]);
	assert!(!monitor.render().contains(&uid));
	monitor.stop();
}

#[test]
fn services_table_follows_the_registry() {
	let network = LoopbackNetwork::new().unwrap();
	let monitor = start(&network);
	wait_for(&network, &monitor, "the local tab", |m| m.tab_titles() == ["Local"]);

	let registry = monitor.framework().registry();
	let handle = registry.register(["demo.extra"], Properties::new().with("colour", "teal"), 1_u8);
	wait_for(&network, &monitor, "the new row", |m| m.render().contains("demo.extra"));
	assert!(monitor.render().contains("colour: teal"));

	registry.update_properties(&handle, Properties::new().with("colour", "amber"));
	wait_for(&network, &monitor, "the updated row", |m| m.render().contains("colour: amber"));

	registry.unregister(&handle);
	wait_for(&network, &monitor, "the row to go", |m| !m.render().contains("demo.extra"));
	monitor.stop();
}

#[test]
fn stopped_monitor_renders_nothing() {
	let network = LoopbackNetwork::new().unwrap();
	let monitor = start(&network);
	wait_for(&network, &monitor, "the local tab", |m| !m.tab_titles().is_empty());
	monitor.stop();
	assert_eq!(monitor.render(), "");
	assert!(monitor.tab_titles().is_empty());
}
