//! Ordered callback delivery.

use std::cell::Cell;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use windrose_worker::panic_message;

use super::{Ranking, RegistryState, ServiceRegistry};
use crate::component::{HookResult, InstanceCore, LifecycleState};
use crate::service::{ListenerId, ServiceEvent, ServiceListener, ServiceReference};

/// One queued callback.
pub(crate) enum Notification {
	Bind {
		core: Arc<InstanceCore>,
		field: Arc<str>,
		service: ServiceReference,
	},
	Unbind {
		core: Arc<InstanceCore>,
		field: Arc<str>,
		service: ServiceReference,
	},
	Validate {
		core: Arc<InstanceCore>,
	},
	Invalidate {
		core: Arc<InstanceCore>,
	},
	/// Last notification of a killed instance; later deliveries to it are dropped.
	Dispose {
		core: Arc<InstanceCore>,
	},
	Service {
		listener: ListenerId,
		target: Arc<dyn ServiceListener>,
		event: ServiceEvent,
	},
}

/// Clears the deferred-delivery flag even if planning or delivery unwinds.
struct DeferGuard<'a>(&'a Cell<bool>);

impl Drop for DeferGuard<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}

impl ServiceRegistry {
	/// Plans one mutation under the state lock, then delivers the queue unless
	/// an outer call on this thread is already delivering.
	pub(super) fn dispatch<R>(&self, plan: impl FnOnce(&mut RegistryState, Ranking) -> R) -> R {
		let ranking = self.inner.config.ranking;
		self.run_serialized(|| plan(&mut self.inner.state.lock(), ranking))
	}

	pub(super) fn run_serialized<R>(&self, f: impl FnOnce() -> R) -> R {
		let deferred = self.inner.dispatch.lock();
		if deferred.get() {
			return f();
		}
		deferred.set(true);
		let _reset = DeferGuard(&deferred);
		let result = f();
		self.drain();
		result
	}

	fn drain(&self) {
		loop {
			let next = self.inner.state.lock().queue.pop_front();
			let Some(notification) = next else {
				break;
			};
			self.deliver(notification);
		}
	}

	fn deliver(&self, notification: Notification) {
		match notification {
			Notification::Bind { core, field, service } => {
				if core.is_disposed() {
					return;
				}
				tracing::trace!(instance = core.name(), field = &*field, service = %service.id(), "registry.deliver.bind");
				run_hook(&core, "bind", || core.component.bind(&field, &service));
			}
			Notification::Unbind { core, field, service } => {
				if core.is_disposed() {
					return;
				}
				tracing::trace!(instance = core.name(), field = &*field, service = %service.id(), "registry.deliver.unbind");
				run_hook(&core, "unbind", || core.component.unbind(&field, &service));
			}
			Notification::Validate { core } => {
				if core.is_disposed() {
					return;
				}
				tracing::debug!(instance = core.name(), "component validated");
				let validated = run_hook(&core, "validate", || core.component.validate(&core.context));
				// Publish only while the plan still holds the instance valid.
				if let Some(provided) = &core.provided
					&& validated
					&& core.state() == LifecycleState::Validated
				{
					let handle = self.register_object(provided.specs.iter().cloned(), core.context.properties().clone(), provided.object.clone());
					*core.registration.lock() = Some(handle);
				}
			}
			Notification::Invalidate { core } => {
				if core.is_disposed() {
					return;
				}
				tracing::debug!(instance = core.name(), "component invalidated");
				// Usually withdrawn while planning; this catches a registration made after that plan.
				let registration = core.registration.lock().take();
				if let Some(handle) = registration {
					self.unregister(&handle);
				}
				run_hook(&core, "invalidate", || core.component.invalidate(&core.context));
			}
			Notification::Dispose { core } => core.dispose(),
			Notification::Service { listener, target, event } => {
				if !self.inner.state.lock().listeners.contains_key(&listener) {
					return;
				}
				if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| target.service_changed(&event))) {
					tracing::error!(service = %event.reference.id(), kind = event.kind.as_str(), panic = %panic_message(payload.as_ref()), "service listener panicked");
				}
			}
		}
	}
}

/// Error boundary around one component hook. Returns true when the hook succeeded.
fn run_hook(core: &InstanceCore, hook: &'static str, f: impl FnOnce() -> HookResult) -> bool {
	match std::panic::catch_unwind(AssertUnwindSafe(f)) {
		Ok(Ok(())) => true,
		Ok(Err(error)) => {
			tracing::error!(instance = core.name(), hook, error = %format!("{error:#}"), "component hook failed");
			false
		}
		Err(payload) => {
			tracing::error!(instance = core.name(), hook, panic = %panic_message(payload.as_ref()), "component hook panicked");
			false
		}
	}
}
