//! Compass sender: posts the heading of a magnetic sensor at a fixed rate.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use windrose_events::{EVENT_ADMIN_SPEC, EventAdmin};
use windrose_registry::props::keys;
use windrose_registry::{
	Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, Instantiated, Properties, Requirement,
	ServiceObject, ServiceReference,
};
use windrose_worker::{GenerationClock, LifecycleToken, TaskClass, spawn_interval};

use crate::{ANGLE_TOPIC, COMPASS_SPEC, MAGNETIC_SENSOR_SPEC};

pub const FACTORY: &str = "compass-event-sender-factory";
pub const INSTANCE: &str = "compass-event-sender";
/// Tick period of the sender, in milliseconds.
pub const TICK_PROPERTY: &str = "clock.tick";

/// Three-axis magnetic field sensor.
pub trait MagneticSensor: Send + Sync + 'static {
	fn enable(&self, enabled: bool);

	/// Field strength along x, y and z.
	fn reading(&self) -> (f64, f64, f64);
}

/// Signed angle in degrees, in `(-180, 180]`, rotating `(x, y)` onto north `(0, 1)`.
pub fn heading(x: f64, y: f64) -> f64 {
	-x.atan2(y).to_degrees()
}

struct SimState {
	rng: StdRng,
	degrees: f64,
	enabled: bool,
}

/// Sensor whose heading drifts randomly by up to ten degrees per reading while enabled.
pub struct SimulatedSensor {
	state: Mutex<SimState>,
}

impl SimulatedSensor {
	pub fn new(seed: Option<u64>) -> Self {
		let mut rng = match seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};
		let degrees = f64::from(rng.gen_range(0..360_i32));
		Self {
			state: Mutex::new(SimState { rng, degrees, enabled: false }),
		}
	}
}

impl MagneticSensor for SimulatedSensor {
	fn enable(&self, enabled: bool) {
		self.state.lock().enabled = enabled;
	}

	fn reading(&self) -> (f64, f64, f64) {
		let mut state = self.state.lock();
		// A disabled sensor reports its last field.
		if state.enabled {
			let step = state.rng.gen_range(-10..=10_i32);
			state.degrees = (state.degrees + f64::from(step)).rem_euclid(360.0);
		}
		let radians = state.degrees.to_radians();
		(-radians.sin(), radians.cos(), 0.0)
	}
}

/// Wraps a sensor so it can be registered under [`MAGNETIC_SENSOR_SPEC`].
pub fn sensor_service(sensor: Arc<dyn MagneticSensor>) -> ServiceObject {
	ServiceObject::new(sensor)
}

#[derive(Default)]
struct Bound {
	events: Option<Arc<EventAdmin>>,
	sensor: Option<Arc<dyn MagneticSensor>>,
}

/// Posts `windrose/compass/angle` events while valid.
pub struct CompassSender {
	bound: Arc<Mutex<Bound>>,
	clock: GenerationClock,
	ticker: Mutex<Option<LifecycleToken>>,
}

impl Default for CompassSender {
	fn default() -> Self {
		Self::new()
	}
}

impl CompassSender {
	pub fn new() -> Self {
		Self {
			bound: Arc::new(Mutex::new(Bound::default())),
			clock: GenerationClock::new(),
			ticker: Mutex::new(None),
		}
	}

	/// Sender description; the compass service is exported.
	pub fn spec(tick: Duration) -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("event", EVENT_ADMIN_SPEC, Cardinality::Single))
			.requires(Requirement::new("hardware", MAGNETIC_SENSOR_SPEC, Cardinality::Single))
			.provides(COMPASS_SPEC)
			.property(TICK_PROPERTY, u64::try_from(tick.as_millis()).unwrap_or(u64::MAX))
			.property(keys::EXPORTED_INTERFACES, vec![COMPASS_SPEC])
	}
}

fn post_angle(bound: &Mutex<Bound>) -> bool {
	let (events, sensor) = {
		let bound = bound.lock();
		match (&bound.events, &bound.sensor) {
			(Some(events), Some(sensor)) => (Arc::clone(events), Arc::clone(sensor)),
			// Late tick.
			_ => return false,
		}
	};
	let (x, y, _) = sensor.reading();
	let angle = heading(x, y);
	tracing::trace!(angle, "compass.tick");
	events.post(ANGLE_TOPIC, Properties::new().with("angle", angle));
	true
}

impl Component for CompassSender {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		let mut bound = self.bound.lock();
		match field {
			"event" => bound.events = service.get::<Arc<EventAdmin>>(),
			"hardware" => bound.sensor = service.get::<Arc<dyn MagneticSensor>>(),
			_ => {}
		}
		Ok(())
	}

	fn unbind(&self, field: &str, _service: &ServiceReference) -> HookResult {
		let mut bound = self.bound.lock();
		match field {
			"event" => bound.events = None,
			"hardware" => bound.sensor = None,
			_ => {}
		}
		Ok(())
	}

	fn validate(&self, ctx: &ComponentContext) -> HookResult {
		let millis = ctx.properties().get_int(TICK_PROPERTY).and_then(|ms| u64::try_from(ms).ok()).unwrap_or(1000);
		let Some(sensor) = self.bound.lock().sensor.clone() else {
			anyhow::bail!("validated without a magnetic sensor");
		};
		sensor.enable(true);

		let token = self.clock.token();
		tracing::debug!(instance = ctx.instance_name(), generation = token.generation(), tick_ms = millis, "compass.start");
		let bound = Arc::clone(&self.bound);
		spawn_interval(TaskClass::Interactive, Duration::from_millis(millis.max(1)), token.clone(), move || post_angle(&bound));
		if let Some(previous) = self.ticker.lock().replace(token) {
			previous.cancel();
		}
		Ok(())
	}

	fn invalidate(&self, ctx: &ComponentContext) -> HookResult {
		if let Some(token) = self.ticker.lock().take() {
			tracing::debug!(instance = ctx.instance_name(), generation = token.generation(), "compass.stop");
			token.cancel();
		}
		if let Some(sensor) = self.bound.lock().sensor.clone() {
			sensor.enable(false);
		}
		Ok(())
	}
}

/// Registers the sender factory and starts the sender.
pub fn install(container: &Container, tick: Duration) -> windrose_registry::Result<InstanceHandle> {
	container.register_factory(CompassSender::spec(tick), |_| Ok(Instantiated::new(Arc::new(CompassSender::new()))))?;
	container.instantiate(FACTORY, InstanceConfig::new(INSTANCE))
}
