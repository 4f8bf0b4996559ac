//! The service registry.
//!
//! Every mutation (register, unregister, property update, instance creation
//! and kill) is planned under a short-lived state lock: bound sets and
//! lifecycle states are updated at once and the resulting callbacks are
//! appended to one FIFO queue. The queue is drained outside the state lock by
//! the outermost caller, under a re-entrant dispatch lock that serializes all
//! deliveries of the registry. Mutations issued from inside a callback only
//! enqueue; their callbacks run right after the current one returns.

use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};

use crate::component::{InstanceCore, InstanceId, LifecycleState, Requirement};
use crate::filter::Filter;
use crate::props::Properties;
use crate::service::{
	ListenerId, ServiceEvent, ServiceEventKind, ServiceHandle, ServiceId, ServiceListener, ServiceObject, ServiceReference,
};

mod binder;
mod dispatch;
#[cfg(test)]
mod tests;

use binder::ConsumerSlot;
use dispatch::Notification;

/// Order in which matching services are returned and bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ranking {
	/// Earlier registrations first.
	#[default]
	RegistrationOrder,
	/// Higher `service.ranking` first, then earlier registrations.
	ServiceRanking,
}

impl Ranking {
	pub(crate) fn sort(self, services: &mut [ServiceReference]) {
		match self {
			Self::RegistrationOrder => services.sort_by_key(ServiceReference::id),
			Self::ServiceRanking => services.sort_by(|a, b| b.ranking().cmp(&a.ranking()).then_with(|| a.id().cmp(&b.id()))),
		}
	}
}

/// Registry settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
	pub ranking: Ranking,
}

#[derive(Default)]
pub(crate) struct RegistryState {
	next_service: u64,
	next_instance: u64,
	next_listener: u64,
	services: BTreeMap<ServiceId, ServiceReference>,
	consumers: BTreeMap<InstanceId, ConsumerSlot>,
	listeners: BTreeMap<ListenerId, Arc<dyn ServiceListener>>,
	queue: VecDeque<Notification>,
	closed: bool,
}

impl RegistryState {
	fn notify_listeners(&mut self, kind: ServiceEventKind, reference: &ServiceReference) {
		for (id, listener) in &self.listeners {
			self.queue.push_back(Notification::Service {
				listener: *id,
				target: Arc::clone(listener),
				event: ServiceEvent {
					kind,
					reference: reference.clone(),
				},
			});
		}
	}
}

struct RegistryInner {
	uid: Arc<str>,
	config: RegistryConfig,
	state: Mutex<RegistryState>,
	/// Re-entrant so callbacks may call back into the registry; the flag is
	/// set while an outer call on this thread owns the drain.
	dispatch: ReentrantMutex<Cell<bool>>,
}

/// Shared handle to one framework's service registry.
#[derive(Clone)]
pub struct ServiceRegistry {
	inner: Arc<RegistryInner>,
}

impl fmt::Debug for ServiceRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ServiceRegistry")
			.field("uid", &self.inner.uid)
			.field("ranking", &self.inner.config.ranking)
			.finish_non_exhaustive()
	}
}

impl Default for ServiceRegistry {
	fn default() -> Self {
		Self::new(RegistryConfig::default())
	}
}

impl ServiceRegistry {
	/// Creates a registry with a random framework UID.
	pub fn new(config: RegistryConfig) -> Self {
		Self::with_uid(uuid::Uuid::new_v4().to_string(), config)
	}

	pub fn with_uid(uid: impl Into<Arc<str>>, config: RegistryConfig) -> Self {
		Self {
			inner: Arc::new(RegistryInner {
				uid: uid.into(),
				config,
				state: Mutex::new(RegistryState::default()),
				dispatch: ReentrantMutex::new(Cell::new(false)),
			}),
		}
	}

	pub fn framework_uid(&self) -> &str {
		&self.inner.uid
	}

	pub fn config(&self) -> &RegistryConfig {
		&self.inner.config
	}

	/// Registers `instance` under `specs`. Never fails.
	pub fn register<T, S>(&self, specs: impl IntoIterator<Item = S>, properties: Properties, instance: T) -> ServiceHandle
	where
		T: Send + Sync + 'static,
		S: Into<Arc<str>>,
	{
		self.register_object(specs, properties, ServiceObject::new(instance))
	}

	/// Registers an already type-erased instance.
	pub fn register_object<S>(&self, specs: impl IntoIterator<Item = S>, properties: Properties, object: ServiceObject) -> ServiceHandle
	where
		S: Into<Arc<str>>,
	{
		let specs: Vec<Arc<str>> = specs.into_iter().map(Into::into).collect();
		self.dispatch(|state, ranking| {
			state.next_service += 1;
			let reference = ServiceReference::new(ServiceId(state.next_service), specs, properties, object);
			if state.closed {
				tracing::warn!(service = %reference.id(), "registration on a closed registry ignored");
				return ServiceHandle::new(reference);
			}
			tracing::debug!(service = %reference.id(), specs = ?reference.specs(), "registry.register");
			state.services.insert(reference.id(), reference.clone());
			state.notify_listeners(ServiceEventKind::Registered, &reference);
			state.reconcile_for(&reference, ranking);
			ServiceHandle::new(reference)
		})
	}

	/// Removes a service and unbinds it from every consumer.
	///
	/// Returns false for unknown or already removed handles.
	pub fn unregister(&self, handle: &ServiceHandle) -> bool {
		self.dispatch(|state, ranking| state.withdraw(handle.id(), ranking))
	}

	/// Replaces the properties of a service and re-evaluates every filter.
	///
	/// `service.id` and `objectClass` are kept. Returns false for unknown handles.
	pub fn update_properties(&self, handle: &ServiceHandle, properties: Properties) -> bool {
		self.dispatch(|state, ranking| {
			let Some(reference) = state.services.get(&handle.id()).cloned() else {
				return false;
			};
			reference.replace_properties(properties);
			tracing::debug!(service = %reference.id(), "registry.modified");
			state.notify_listeners(ServiceEventKind::Modified, &reference);
			state.reconcile_for(&reference, ranking);
			true
		})
	}

	/// Snapshot of the services registered under `spec` matching `filter`, best ranked first.
	pub fn find(&self, spec: &str, filter: &Filter) -> Vec<ServiceReference> {
		let mut found: Vec<ServiceReference> = {
			let state = self.inner.state.lock();
			state
				.services
				.values()
				.filter(|s| s.has_spec(spec) && filter.matches(&s.properties()))
				.cloned()
				.collect()
		};
		self.inner.config.ranking.sort(&mut found);
		found
	}

	pub fn find_first(&self, spec: &str, filter: &Filter) -> Option<ServiceReference> {
		self.find(spec, filter).into_iter().next()
	}

	/// Every registered service, in registration order.
	pub fn services(&self) -> Vec<ServiceReference> {
		self.inner.state.lock().services.values().cloned().collect()
	}

	pub fn add_service_listener(&self, listener: Arc<dyn ServiceListener>) -> ListenerId {
		let mut state = self.inner.state.lock();
		state.next_listener += 1;
		let id = ListenerId(state.next_listener);
		state.listeners.insert(id, listener);
		id
	}

	/// Pending events for a removed listener are dropped.
	pub fn remove_service_listener(&self, id: ListenerId) -> bool {
		self.inner.state.lock().listeners.remove(&id).is_some()
	}

	/// Kills every instance and drops every service. Later mutations are ignored.
	pub fn close(&self) {
		let uid = Arc::clone(&self.inner.uid);
		self.dispatch(|state, _| {
			if state.closed {
				return;
			}
			state.closed = true;
			let consumers = std::mem::take(&mut state.consumers);
			for (_, slot) in consumers.into_iter().rev() {
				slot.retire(&mut state.queue);
			}
			state.services.clear();
			state.listeners.clear();
			tracing::debug!(uid = %uid, "registry.closed");
		});
	}

	pub fn is_closed(&self) -> bool {
		self.inner.state.lock().closed
	}

	/// Runs `f` as one atomic step with respect to every other registry mutation.
	///
	/// Callbacks caused by mutations made inside `f` are delivered after `f`
	/// returns, so `f` can check-then-act without being re-entered.
	pub fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
		self.run_serialized(f)
	}

	pub(crate) fn next_instance_id(&self) -> InstanceId {
		let mut state = self.inner.state.lock();
		state.next_instance += 1;
		InstanceId(state.next_instance)
	}

	pub(crate) fn add_consumer(&self, core: Arc<InstanceCore>, requirements: Vec<Requirement>) {
		self.dispatch(|state, ranking| {
			if state.closed {
				tracing::warn!(instance = core.name(), "instantiation on a closed registry ignored");
				core.set_state(LifecycleState::Destroyed);
				core.dispose();
				return;
			}
			let id = core.id;
			tracing::debug!(instance = core.name(), "registry.instance.added");
			state.consumers.insert(id, ConsumerSlot::new(core, requirements));
			state.reconcile(id, ranking);
		});
	}

	pub(crate) fn kill(&self, id: InstanceId) {
		self.dispatch(|state, ranking| {
			if let Some(core) = state.retire(id, ranking) {
				tracing::debug!(instance = core.name(), "registry.instance.killed");
			}
		});
	}

	/// Current bound set of one requirement of a live instance.
	pub(crate) fn bound(&self, id: InstanceId, field: &str) -> Vec<ServiceReference> {
		let state = self.inner.state.lock();
		state.consumers.get(&id).map(|slot| slot.bound_for(field)).unwrap_or_default()
	}
}
