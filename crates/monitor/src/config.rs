//! `windrose.toml` configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use windrose_registry::RegistryConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "windrose.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("compass.tick_ms must be greater than zero")]
	ZeroTick,
	#[error("monitor.refresh_ms must be greater than zero")]
	ZeroRefresh,
}

/// Simulated compass frameworks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompassConfig {
	/// Number of compass frameworks started next to the monitor.
	pub frameworks: usize,
	/// Period between two angle events.
	pub tick_ms: u64,
	/// Seed of the first simulated sensor; the others use the following values.
	pub seed: Option<u64>,
}

impl Default for CompassConfig {
	fn default() -> Self {
		Self {
			frameworks: 1,
			tick_ms: 1000,
			seed: None,
		}
	}
}

impl CompassConfig {
	pub fn tick(&self) -> Duration {
		Duration::from_millis(self.tick_ms)
	}
}

/// Monitor run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
	/// Stop after this many seconds; run until killed when unset.
	pub duration_secs: Option<u64>,
	/// Period between two renderings of the main frame.
	pub refresh_ms: u64,
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			duration_secs: None,
			refresh_ms: 1000,
		}
	}
}

impl MonitorConfig {
	pub fn duration(&self) -> Option<Duration> {
		self.duration_secs.map(Duration::from_secs)
	}

	pub fn refresh(&self) -> Duration {
		Duration::from_millis(self.refresh_ms)
	}
}

/// Whole configuration file. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub compass: CompassConfig,
	pub monitor: MonitorConfig,
	/// Applied to every framework.
	pub registry: RegistryConfig,
}

impl Config {
	pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Reads `path`, or `windrose.toml` when present, or falls back to defaults.
	///
	/// An explicit path must exist.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let (path, required) = match path {
			Some(path) => (path.to_path_buf(), true),
			None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
		};
		match std::fs::read_to_string(&path) {
			Ok(text) => {
				tracing::debug!(path = %path.display(), "config.load");
				Self::parse(&text, &path)
			}
			Err(source) if !required && source.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
			Err(source) => Err(ConfigError::Read { path, source }),
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.compass.tick_ms == 0 {
			return Err(ConfigError::ZeroTick);
		}
		if self.monitor.refresh_ms == 0 {
			return Err(ConfigError::ZeroRefresh);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use windrose_registry::Ranking;

	use super::*;

	#[test]
	fn empty_file_is_all_defaults() {
		let config = Config::parse("", Path::new("windrose.toml")).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.compass.frameworks, 1);
		assert_eq!(config.compass.tick(), Duration::from_secs(1));
		assert_eq!(config.monitor.duration(), None);
	}

	#[test]
	fn partial_sections_keep_other_defaults() {
		let text = r#"
[compass]
tick_ms = 100
seed = 7

[registry]
ranking = "service-ranking"
"#;
		let config = Config::parse(text, Path::new("windrose.toml")).unwrap();
		assert_eq!(config.compass.tick_ms, 100);
		assert_eq!(config.compass.seed, Some(7));
		assert_eq!(config.compass.frameworks, 1);
		assert_eq!(config.registry.ranking, Ranking::ServiceRanking);
		assert_eq!(config.monitor, MonitorConfig::default());
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = Config::parse("[compass]\nspeed = 3\n", Path::new("bad.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
		assert!(err.to_string().starts_with("failed to parse bad.toml"));
	}

	#[test]
	fn zero_periods_are_rejected() {
		let err = Config::parse("[compass]\ntick_ms = 0\n", Path::new("windrose.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::ZeroTick));
		let err = Config::parse("[monitor]\nrefresh_ms = 0\n", Path::new("windrose.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::ZeroRefresh));
	}

	#[test]
	fn explicit_path_must_exist() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("nope.toml");
		assert!(matches!(Config::load(Some(&missing)), Err(ConfigError::Read { .. })));

		let present = dir.path().join("windrose.toml");
		std::fs::write(&present, "[monitor]\nduration_secs = 5\n").unwrap();
		let config = Config::load(Some(&present)).unwrap();
		assert_eq!(config.monitor.duration(), Some(Duration::from_secs(5)));
	}
}
