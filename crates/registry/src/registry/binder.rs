//! Bound-set planning for component instances.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use super::dispatch::Notification;
use super::{Ranking, RegistryState};
use crate::component::{InstanceCore, InstanceId, LifecycleState, Requirement};
use crate::service::{ServiceEventKind, ServiceId, ServiceReference};

/// Registry-side state of one live instance.
pub(crate) struct ConsumerSlot {
	pub core: Arc<InstanceCore>,
	requirements: Vec<Requirement>,
	bound: Vec<Vec<ServiceReference>>,
	state: LifecycleState,
}

struct BindingChange {
	index: usize,
	removed: Vec<ServiceReference>,
	added: Vec<ServiceReference>,
}

impl ConsumerSlot {
	pub fn new(core: Arc<InstanceCore>, requirements: Vec<Requirement>) -> Self {
		let bound = vec![Vec::new(); requirements.len()];
		Self {
			core,
			requirements,
			bound,
			state: LifecycleState::Created,
		}
	}

	pub fn bound_for(&self, field: &str) -> Vec<ServiceReference> {
		self.requirements
			.iter()
			.position(|r| r.field() == field)
			.map(|index| self.bound[index].clone())
			.unwrap_or_default()
	}

	fn depends_on(&self, service: &ServiceReference) -> bool {
		self.requirements.iter().any(|r| service.has_spec(r.spec()))
	}

	fn is_satisfied(&self) -> bool {
		self.requirements
			.iter()
			.zip(&self.bound)
			.all(|(requirement, bound)| requirement.cardinality().is_optional() || !bound.is_empty())
	}

	fn set_state(&mut self, state: LifecycleState) {
		self.state = state;
		self.core.set_state(state);
	}

	/// Recomputes every bound set against `services` and queues the resulting callbacks.
	///
	/// Queue order for one instance: invalidate (if a required set emptied),
	/// then per requirement unbinds before binds, then validate (if every
	/// required set is now filled). Returns true when an invalidate was queued.
	fn reconcile(&mut self, services: &BTreeMap<ServiceId, ServiceReference>, ranking: Ranking, queue: &mut VecDeque<Notification>) -> bool {
		let mut changes = Vec::new();
		for (index, requirement) in self.requirements.iter().enumerate() {
			let mut matches: Vec<ServiceReference> = services.values().filter(|s| requirement.accepts(s)).cloned().collect();
			ranking.sort(&mut matches);

			let old = &self.bound[index];
			let next: Vec<ServiceReference> = if requirement.cardinality().is_aggregate() {
				let mut kept: Vec<ServiceReference> = old.iter().filter(|s| matches.contains(s)).cloned().collect();
				for candidate in matches {
					if !kept.contains(&candidate) {
						kept.push(candidate);
					}
				}
				kept
			} else {
				// Single bindings always follow the best-ranked match.
				matches.into_iter().take(1).collect()
			};

			let removed: Vec<_> = old.iter().filter(|s| !next.contains(s)).cloned().collect();
			let added: Vec<_> = next.iter().filter(|s| !old.contains(s)).cloned().collect();
			if !removed.is_empty() || !added.is_empty() {
				changes.push(BindingChange { index, removed, added });
			}
			self.bound[index] = next;
		}

		let satisfied = self.is_satisfied();
		let invalidated = self.state == LifecycleState::Validated && !satisfied;
		if invalidated {
			queue.push_back(Notification::Invalidate {
				core: Arc::clone(&self.core),
			});
			self.set_state(LifecycleState::Invalidated);
		}

		for change in changes {
			let field = Arc::clone(self.requirements[change.index].field_arc());
			for service in change.removed {
				queue.push_back(Notification::Unbind {
					core: Arc::clone(&self.core),
					field: Arc::clone(&field),
					service,
				});
			}
			for service in change.added {
				queue.push_back(Notification::Bind {
					core: Arc::clone(&self.core),
					field: Arc::clone(&field),
					service,
				});
			}
		}

		if self.state != LifecycleState::Validated && satisfied {
			queue.push_back(Notification::Validate {
				core: Arc::clone(&self.core),
			});
			self.set_state(LifecycleState::Validated);
		}
		invalidated
	}

	/// Queues the teardown of a killed instance: invalidate when valid, unbind everything, dispose.
	pub fn retire(mut self, queue: &mut VecDeque<Notification>) {
		if self.state == LifecycleState::Validated {
			queue.push_back(Notification::Invalidate {
				core: Arc::clone(&self.core),
			});
		}
		for (requirement, bound) in self.requirements.iter().zip(self.bound.iter_mut()) {
			for service in bound.drain(..) {
				queue.push_back(Notification::Unbind {
					core: Arc::clone(&self.core),
					field: Arc::clone(requirement.field_arc()),
					service,
				});
			}
		}
		self.set_state(LifecycleState::Destroyed);
		queue.push_back(Notification::Dispose {
			core: Arc::clone(&self.core),
		});
	}
}

impl RegistryState {
	/// Re-plans every instance with a requirement on one of `changed`'s specifications.
	pub(super) fn reconcile_for(&mut self, changed: &ServiceReference, ranking: Ranking) {
		let ids: Vec<InstanceId> = self
			.consumers
			.iter()
			.filter(|(_, slot)| slot.depends_on(changed))
			.map(|(id, _)| *id)
			.collect();
		for id in ids {
			self.reconcile(id, ranking);
		}
	}

	/// Re-plans one instance.
	///
	/// When the instance loses validity its provided service is withdrawn
	/// first, so consumers of that service are invalidated and unbound
	/// before the provider's own invalidate.
	pub(super) fn reconcile(&mut self, id: InstanceId, ranking: Ranking) {
		let Some(slot) = self.consumers.get_mut(&id) else {
			return;
		};
		let mut planned = VecDeque::new();
		if slot.reconcile(&self.services, ranking, &mut planned) {
			let core = Arc::clone(&slot.core);
			self.withdraw_provided(&core, ranking);
		}
		self.queue.extend(planned);
	}

	/// Removes a killed instance and queues its teardown after its provided service is gone.
	pub(super) fn retire(&mut self, id: InstanceId, ranking: Ranking) -> Option<Arc<InstanceCore>> {
		let slot = self.consumers.remove(&id)?;
		let core = Arc::clone(&slot.core);
		self.withdraw_provided(&core, ranking);
		slot.retire(&mut self.queue);
		Some(core)
	}

	fn withdraw_provided(&mut self, core: &InstanceCore, ranking: Ranking) {
		let registration = core.registration.lock().take();
		if let Some(handle) = registration {
			self.withdraw(handle.id(), ranking);
		}
	}

	/// Drops a service and re-plans its consumers. False when it is not registered.
	pub(super) fn withdraw(&mut self, id: ServiceId, ranking: Ranking) -> bool {
		let Some(reference) = self.services.remove(&id) else {
			return false;
		};
		tracing::debug!(service = %reference.id(), "registry.unregister");
		self.notify_listeners(ServiceEventKind::Unregistering, &reference);
		self.reconcile_for(&reference, ranking);
		true
	}
}
