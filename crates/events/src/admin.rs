//! The event admin component.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use windrose_registry::{
	Cardinality, Component, ComponentContext, ComponentSpec, Container, HookResult, InstanceConfig, InstanceHandle, Instantiated, Properties, Requirement,
	ServiceId, ServiceObject, ServiceReference,
};
use windrose_worker::{TaskClass, panic_message, spawn_named_thread};

use crate::event::Event;
use crate::topic::parse_patterns;
use crate::{EVENT_ADMIN_SPEC, EVENT_HANDLER_SPEC, keys};

/// Receives events whose topic matches the handler service's `event.topics`.
pub trait EventHandler: Send + Sync + 'static {
	fn handle_event(&self, event: &Event) -> anyhow::Result<()>;

	/// Typed filter applied after topic matching.
	fn accepts(&self, event: &Event) -> bool {
		let _ = event;
		true
	}
}

/// Wraps a handler so it can be published under [`EVENT_HANDLER_SPEC`].
pub fn handler_service(handler: Arc<dyn EventHandler>) -> ServiceObject {
	ServiceObject::new(handler)
}

pub const FACTORY: &str = "windrose-event-admin-factory";
pub const INSTANCE: &str = "windrose-event-admin";

enum Job {
	Deliver(Event),
	Flush(oneshot::Sender<()>),
}

struct Subscriber {
	service: ServiceReference,
	handler: Arc<dyn EventHandler>,
}

struct Shared {
	framework_uid: String,
	subscribers: RwLock<Vec<Subscriber>>,
}

impl Shared {
	fn deliver(&self, event: &Event) {
		let targets: Vec<(ServiceId, Arc<dyn EventHandler>)> = self
			.subscribers
			.read()
			.iter()
			.filter(|s| {
				let properties = s.service.properties();
				let topics = properties.get(keys::EVENT_TOPICS).map(|v| parse_patterns(v.strings())).unwrap_or_default();
				topics.iter().any(|t| t.matches(event.topic()))
			})
			.map(|s| (s.service.id(), Arc::clone(&s.handler)))
			.collect();

		tracing::trace!(topic = event.topic(), handlers = targets.len(), "events.deliver");
		for (service, handler) in targets {
			if !handler.accepts(event) {
				continue;
			}
			match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle_event(event))) {
				Ok(Ok(())) => {}
				Ok(Err(error)) => {
					tracing::error!(%service, topic = event.topic(), error = %format!("{error:#}"), "event handler failed");
				}
				Err(payload) => {
					tracing::error!(%service, topic = event.topic(), panic = %panic_message(payload.as_ref()), "event handler panicked");
				}
			}
		}
	}
}

/// Delivers events to every bound handler whose topics match.
///
/// `post` queues the event for a dedicated delivery thread, which exists
/// while the component is valid; `send` delivers on the calling thread.
pub struct EventAdmin {
	shared: Arc<Shared>,
	queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl EventAdmin {
	pub fn new(framework_uid: impl Into<String>) -> Self {
		Self {
			shared: Arc::new(Shared {
				framework_uid: framework_uid.into(),
				subscribers: RwLock::new(Vec::new()),
			}),
			queue: Mutex::new(None),
		}
	}

	/// Component description: aggregate optional handlers, provides [`EVENT_ADMIN_SPEC`].
	pub fn spec() -> ComponentSpec {
		ComponentSpec::new(FACTORY)
			.requires(Requirement::new("handlers", EVENT_HANDLER_SPEC, Cardinality::OptionalAggregate))
			.provides(EVENT_ADMIN_SPEC)
	}

	/// Registers the factory in `container` and starts the single instance.
	pub fn install(container: &Container) -> windrose_registry::Result<InstanceHandle> {
		let uid = container.registry().framework_uid().to_string();
		container.register_factory(Self::spec(), move |_| Ok(Instantiated::new(Arc::new(EventAdmin::new(uid.clone())))))?;
		container.instantiate(FACTORY, InstanceConfig::new(INSTANCE))
	}

	pub fn framework_uid(&self) -> &str {
		&self.shared.framework_uid
	}

	/// Queues an event for asynchronous, ordered delivery.
	///
	/// Returns false when the admin is not running.
	pub fn post(&self, topic: impl Into<String>, properties: Properties) -> bool {
		let event = self.prepare(topic, properties);
		let sent = self.queue.lock().as_ref().is_some_and(|tx| tx.send(Job::Deliver(event)).is_ok());
		if !sent {
			tracing::debug!(uid = %self.shared.framework_uid, "event posted while the event admin is stopped");
		}
		sent
	}

	/// Delivers an event on the calling thread.
	pub fn send(&self, topic: impl Into<String>, properties: Properties) {
		let event = self.prepare(topic, properties);
		self.shared.deliver(&event);
	}

	/// Blocks until every event posted before this call has been delivered.
	///
	/// Must not be called from a component hook: handlers may be waiting on
	/// the registry the hook is holding.
	pub fn flush(&self) {
		let (ack_tx, ack_rx) = oneshot::channel();
		let sent = self.queue.lock().as_ref().is_some_and(|tx| tx.send(Job::Flush(ack_tx)).is_ok());
		if sent {
			let _ = ack_rx.blocking_recv();
		}
	}

	pub fn handler_count(&self) -> usize {
		self.shared.subscribers.read().len()
	}

	fn prepare(&self, topic: impl Into<String>, properties: Properties) -> Event {
		let mut event = Event::new(topic, properties);
		event.stamp_origin(&self.shared.framework_uid);
		event
	}
}

impl Component for EventAdmin {
	fn bind(&self, _field: &str, service: &ServiceReference) -> HookResult {
		let Some(handler) = service.get::<Arc<dyn EventHandler>>() else {
			anyhow::bail!("service {} is not an event handler", service.id());
		};
		self.shared.subscribers.write().push(Subscriber {
			service: service.clone(),
			handler,
		});
		Ok(())
	}

	fn unbind(&self, _field: &str, service: &ServiceReference) -> HookResult {
		self.shared.subscribers.write().retain(|s| s.service != *service);
		Ok(())
	}

	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		let shared = Arc::clone(&self.shared);
		spawn_named_thread(TaskClass::Background, "windrose-events", move || {
			while let Some(job) = rx.blocking_recv() {
				match job {
					Job::Deliver(event) => shared.deliver(&event),
					Job::Flush(ack) => {
						let _ = ack.send(());
					}
				}
			}
			tracing::debug!(uid = %shared.framework_uid, "events.loop.exited");
		})?;
		*self.queue.lock() = Some(tx);
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		// Dropping the sender lets the delivery thread finish the queue and exit.
		self.queue.lock().take();
		Ok(())
	}
}
