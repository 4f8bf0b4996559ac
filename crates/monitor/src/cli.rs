use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "windrose")]
#[command(about = "Watches simulated compass frameworks through remote service probes")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Configuration file (defaults to ./windrose.toml when present)
	#[arg(long, short = 'c', value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Number of simulated compass frameworks
	#[arg(long, short = 'n', value_name = "COUNT")]
	pub compasses: Option<usize>,

	/// Stop after this many seconds (runs until interrupted if omitted)
	#[arg(long, short = 'd', value_name = "SECS")]
	pub duration: Option<u64>,

	/// Compass tick period in milliseconds
	#[arg(long, short = 't', value_name = "MS")]
	pub tick: Option<u64>,

	/// Seed of the simulated sensors
	#[arg(long, value_name = "SEED")]
	pub seed: Option<u64>,

	/// More logging (-v debug, -vv trace)
	#[arg(short, action = ArgAction::Count)]
	pub verbose: u8,
}

impl Cli {
	/// Overrides the file settings with the flags that were given.
	pub fn apply(&self, config: &mut Config) {
		if let Some(count) = self.compasses {
			config.compass.frameworks = count;
		}
		if let Some(secs) = self.duration {
			config.monitor.duration_secs = Some(secs);
		}
		if let Some(ms) = self.tick {
			config.compass.tick_ms = ms;
		}
		if let Some(seed) = self.seed {
			config.compass.seed = Some(seed);
		}
	}

	/// Default log filter for the verbosity level.
	pub fn log_filter(&self) -> &'static str {
		match self.verbose {
			0 => "warn,windrose=info",
			1 => "info,windrose=debug",
			_ => "debug,windrose=trace",
		}
	}
}
