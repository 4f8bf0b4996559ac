use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::bail;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::component::{Cardinality, Component, ComponentContext, ComponentSpec, HookResult, InstanceConfig, InstanceHandle, Requirement};
use crate::container::{Container, Instantiated};
use crate::props::{PropValue, keys};
use crate::service::ServiceHandle;

#[derive(Default)]
struct Recorder {
	log: Mutex<Vec<String>>,
	fail_unbind: AtomicBool,
	panic_unbind: AtomicBool,
}

impl Recorder {
	fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.log.lock())
	}
}

impl Component for Recorder {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		self.log.lock().push(format!("bind {field} {}", service.id()));
		Ok(())
	}

	fn unbind(&self, field: &str, service: &ServiceReference) -> HookResult {
		self.log.lock().push(format!("unbind {field} {}", service.id()));
		if self.panic_unbind.load(Ordering::SeqCst) {
			panic!("unbind exploded");
		}
		if self.fail_unbind.load(Ordering::SeqCst) {
			bail!("unbind refused");
		}
		Ok(())
	}

	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		self.log.lock().push("validate".into());
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		self.log.lock().push("invalidate".into());
		Ok(())
	}
}

fn consumer(container: &Container, name: &str, spec: ComponentSpec) -> (InstanceHandle, Arc<Recorder>) {
	let factory = spec.factory().to_string();
	container.register_factory(spec, |_| Ok(Instantiated::new(Arc::new(Recorder::default())))).unwrap();
	let handle = container.instantiate(&factory, InstanceConfig::new(name)).unwrap();
	let recorder = handle.component::<Recorder>().unwrap();
	(handle, recorder)
}

fn registry(ranking: Ranking) -> (ServiceRegistry, Container) {
	let registry = ServiceRegistry::new(RegistryConfig { ranking });
	let container = Container::new(registry.clone());
	(registry, container)
}

fn owned(owner: &str) -> Properties {
	Properties::new().with("owner", owner)
}

fn ranked(ranking: i64) -> Properties {
	Properties::new().with(keys::SERVICE_RANKING, ranking)
}

#[test]
fn dependency_loss_and_recovery() {
	let (registry, container) = registry(Ranking::default());
	let e1 = registry.register(["S"], owned("fw1"), ());
	let spec = ComponentSpec::new("watcher").requires(Requirement::new("dep", "S", Cardinality::Single).with_filter(Filter::eq("owner", "fw1")));
	let (handle, rec) = consumer(&container, "watcher-1", spec);

	assert_eq!(handle.state(), LifecycleState::Validated);
	assert_eq!(rec.take(), vec![format!("bind dep {}", e1.id()), "validate".to_string()]);

	assert!(registry.unregister(&e1));
	assert_eq!(handle.state(), LifecycleState::Invalidated);
	assert_eq!(rec.take(), vec!["invalidate".to_string(), format!("unbind dep {}", e1.id())]);

	let e2 = registry.register(["S"], owned("fw1"), ());
	assert_eq!(handle.state(), LifecycleState::Validated);
	assert_eq!(rec.take(), vec![format!("bind dep {}", e2.id()), "validate".to_string()]);
	assert_eq!(handle.bound("dep"), vec![e2.reference().clone()]);
}

#[test]
fn single_rebinds_to_next_best_with_one_unbind_and_one_bind() {
	let (registry, container) = registry(Ranking::ServiceRanking);
	let low = registry.register(["S"], ranked(1), ());
	let high = registry.register(["S"], ranked(10), ());
	let (handle, rec) = consumer(&container, "single", ComponentSpec::new("single").requires(Requirement::new("dep", "S", Cardinality::Single)));
	assert_eq!(rec.take(), vec![format!("bind dep {}", high.id()), "validate".to_string()]);

	registry.unregister(&high);
	assert_eq!(rec.take(), vec![format!("unbind dep {}", high.id()), format!("bind dep {}", low.id())]);
	assert_eq!(handle.state(), LifecycleState::Validated);
}

#[test]
fn higher_ranked_arrival_displaces_bound_service() {
	let (registry, container) = registry(Ranking::ServiceRanking);
	let low = registry.register(["S"], ranked(1), ());
	let (_handle, rec) = consumer(&container, "single", ComponentSpec::new("single").requires(Requirement::new("dep", "S", Cardinality::OptionalSingle)));
	rec.take();

	let same = registry.register(["S"], ranked(1), ());
	assert!(rec.take().is_empty(), "equal ranking must not displace {}", same.id());

	let high = registry.register(["S"], ranked(5), ());
	assert_eq!(rec.take(), vec![format!("unbind dep {}", low.id()), format!("bind dep {}", high.id())]);
}

#[test]
fn registration_order_keeps_first_match() {
	let (registry, container) = registry(Ranking::RegistrationOrder);
	let first = registry.register(["S"], ranked(1), ());
	let (handle, rec) = consumer(&container, "single", ComponentSpec::new("single").requires(Requirement::new("dep", "S", Cardinality::Single)));
	rec.take();
	registry.register(["S"], ranked(100), ());
	assert!(rec.take().is_empty());
	assert_eq!(handle.bound("dep"), vec![first.reference().clone()]);
}

#[test]
fn aggregate_binds_every_match_and_unbinds_only_the_removed_one() {
	let (registry, container) = registry(Ranking::default());
	let (handle, rec) = consumer(&container, "agg", ComponentSpec::new("agg").requires(Requirement::new("deps", "S", Cardinality::Aggregate)));
	assert_eq!(handle.state(), LifecycleState::Created);

	let a = registry.register(["S"], Properties::new(), ());
	let b = registry.register(["S"], Properties::new(), ());
	assert_eq!(rec.take(), vec![format!("bind deps {}", a.id()), "validate".to_string(), format!("bind deps {}", b.id())]);

	registry.unregister(&a);
	assert_eq!(rec.take(), vec![format!("unbind deps {}", a.id())]);
	assert_eq!(handle.bound("deps"), vec![b.reference().clone()]);
	assert_eq!(handle.state(), LifecycleState::Validated);
}

#[test]
fn binds_are_delivered_before_validate() {
	let (registry, container) = registry(Ranking::default());
	let a = registry.register(["A"], Properties::new(), ());
	let spec = ComponentSpec::new("pair")
		.requires(Requirement::new("a", "A", Cardinality::Single))
		.requires(Requirement::new("b", "B", Cardinality::Single));
	let (handle, rec) = consumer(&container, "pair", spec);
	assert_eq!(rec.take(), vec![format!("bind a {}", a.id())]);
	assert_eq!(handle.state(), LifecycleState::Created);

	let b = registry.register(["B"], Properties::new(), ());
	assert_eq!(rec.take(), vec![format!("bind b {}", b.id()), "validate".to_string()]);
}

#[test]
fn property_updates_rebind() {
	let (registry, container) = registry(Ranking::default());
	let svc = registry.register(["S"], owned("fw2"), ());
	let spec = ComponentSpec::new("watcher").requires(Requirement::new("dep", "S", Cardinality::Single).with_filter(Filter::eq("owner", "fw1")));
	let (handle, rec) = consumer(&container, "watcher", spec);
	assert!(rec.take().is_empty());

	assert!(registry.update_properties(&svc, owned("fw1")));
	assert_eq!(rec.take(), vec![format!("bind dep {}", svc.id()), "validate".to_string()]);
	assert_eq!(svc.reference().property(keys::SERVICE_ID), Some(PropValue::Int(svc.id().get() as i64)));

	registry.update_properties(&svc, owned("fw3"));
	assert_eq!(rec.take(), vec!["invalidate".to_string(), format!("unbind dep {}", svc.id())]);
	assert_eq!(handle.state(), LifecycleState::Invalidated);
}

#[test]
fn failing_hook_does_not_block_other_consumers() {
	let (registry, container) = registry(Ranking::default());
	let svc = registry.register(["S"], Properties::new(), ());
	let requirement = || Requirement::new("dep", "S", Cardinality::OptionalAggregate);
	let (_a, rec_a) = consumer(&container, "a", ComponentSpec::new("a").requires(requirement()));
	let (_b, rec_b) = consumer(&container, "b", ComponentSpec::new("b").requires(requirement()));
	let (_c, rec_c) = consumer(&container, "c", ComponentSpec::new("c").requires(requirement()));
	rec_a.fail_unbind.store(true, Ordering::SeqCst);
	rec_b.panic_unbind.store(true, Ordering::SeqCst);
	rec_c.take();

	registry.unregister(&svc);
	assert_eq!(rec_c.take(), vec![format!("unbind dep {}", svc.id())]);
	assert!(rec_a.take().contains(&format!("unbind dep {}", svc.id())));
	assert!(rec_b.take().contains(&format!("unbind dep {}", svc.id())));
}

struct Chain {
	registry: ServiceRegistry,
	log: Mutex<Vec<String>>,
	second: Mutex<Option<ServiceHandle>>,
}

impl Component for Chain {
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		self.log.lock().push(format!("bind {field} {}", service.id()));
		if field == "a" {
			let handle = self.registry.register(["B"], Properties::new(), ());
			self.log.lock().push(format!("registered {}", handle.id()));
			*self.second.lock() = Some(handle);
		}
		Ok(())
	}
}

#[test]
fn nested_mutations_are_delivered_after_the_running_callback() {
	let (registry, container) = registry(Ranking::default());
	let spec = ComponentSpec::new("chain")
		.requires(Requirement::new("a", "A", Cardinality::OptionalAggregate))
		.requires(Requirement::new("b", "B", Cardinality::OptionalAggregate));
	let inner = registry.clone();
	container
		.register_factory(spec, move |_| {
			Ok(Instantiated::new(Arc::new(Chain {
				registry: inner.clone(),
				log: Mutex::new(Vec::new()),
				second: Mutex::new(None),
			})))
		})
		.unwrap();
	let handle = container.instantiate("chain", InstanceConfig::new("chain")).unwrap();
	let chain = handle.component::<Chain>().unwrap();

	let a = registry.register(["A"], Properties::new(), ());
	let b = chain.second.lock().clone().unwrap();
	assert_eq!(
		*chain.log.lock(),
		vec![format!("bind a {}", a.id()), format!("registered {}", b.id()), format!("bind b {}", b.id())]
	);
}

#[derive(Default)]
struct EventLog(Mutex<Vec<(ServiceEventKind, ServiceId)>>);

impl ServiceListener for EventLog {
	fn service_changed(&self, event: &ServiceEvent) {
		self.0.lock().push((event.kind, event.reference.id()));
	}
}

#[test]
fn listeners_see_every_change_until_removed() {
	let registry = ServiceRegistry::default();
	let events = Arc::new(EventLog::default());
	let id = registry.add_service_listener(events.clone());

	let svc = registry.register(["S"], Properties::new(), ());
	registry.update_properties(&svc, owned("x"));
	registry.unregister(&svc);
	assert_eq!(
		*events.0.lock(),
		vec![
			(ServiceEventKind::Registered, svc.id()),
			(ServiceEventKind::Modified, svc.id()),
			(ServiceEventKind::Unregistering, svc.id()),
		]
	);

	assert!(registry.remove_service_listener(id));
	registry.register(["S"], Properties::new(), ());
	assert_eq!(events.0.lock().len(), 3);
}

#[test]
fn unknown_handles_are_ignored() {
	let registry = ServiceRegistry::default();
	let svc = registry.register(["S"], Properties::new(), ());
	assert!(registry.unregister(&svc));
	assert!(!registry.unregister(&svc));
	assert!(!registry.update_properties(&svc, Properties::new()));
}

#[test]
fn kill_invalidates_then_unbinds_then_goes_silent() {
	let (registry, container) = registry(Ranking::default());
	let svc = registry.register(["S"], Properties::new(), ());
	let (handle, rec) = consumer(&container, "victim", ComponentSpec::new("victim").requires(Requirement::new("dep", "S", Cardinality::Aggregate)));
	rec.take();

	handle.kill();
	assert_eq!(rec.take(), vec!["invalidate".to_string(), format!("unbind dep {}", svc.id())]);
	assert_eq!(handle.state(), LifecycleState::Destroyed);
	assert!(!handle.is_alive());

	handle.kill();
	registry.register(["S"], Properties::new(), ());
	assert!(rec.take().is_empty());
	assert!(handle.bound("dep").is_empty());
}

#[test]
fn kill_of_unvalidated_instance_skips_invalidate() {
	let (registry, container) = registry(Ranking::default());
	let a = registry.register(["A"], Properties::new(), ());
	let spec = ComponentSpec::new("pair")
		.requires(Requirement::new("a", "A", Cardinality::Single))
		.requires(Requirement::new("b", "B", Cardinality::Single));
	let (handle, rec) = consumer(&container, "pair", spec);
	rec.take();
	handle.kill();
	assert_eq!(rec.take(), vec![format!("unbind a {}", a.id())]);
}

struct Provider;

impl Component for Provider {}

#[test]
fn provided_service_follows_validity() {
	let (registry, container) = registry(Ranking::default());
	let spec = ComponentSpec::new("provider")
		.requires(Requirement::new("dep", "S", Cardinality::Single))
		.provides("P")
		.property("flavor", "plain");
	container.register_factory(spec, |_| Ok(Instantiated::new(Arc::new(Provider)))).unwrap();
	container.instantiate("provider", InstanceConfig::new("provider-1")).unwrap();
	assert!(registry.find("P", &Filter::All).is_empty());

	let svc = registry.register(["S"], Properties::new(), ());
	let provided = registry.find_first("P", &Filter::All).unwrap();
	assert_eq!(provided.properties().get_str(keys::INSTANCE_NAME), Some("provider-1"));
	assert_eq!(provided.properties().get_str("flavor"), Some("plain"));
	assert!(provided.get::<Arc<Provider>>().is_some());

	registry.unregister(&svc);
	assert!(registry.find("P", &Filter::All).is_empty());
}

#[test]
fn consumers_of_provided_services_are_chained() {
	let (registry, container) = registry(Ranking::default());
	container
		.register_factory(
			ComponentSpec::new("provider").requires(Requirement::new("dep", "S", Cardinality::Single)).provides("P"),
			|_| Ok(Instantiated::new(Arc::new(Provider))),
		)
		.unwrap();
	container.instantiate("provider", InstanceConfig::new("provider")).unwrap();
	let (user, rec) = consumer(&container, "user", ComponentSpec::new("user").requires(Requirement::new("p", "P", Cardinality::Single)));

	let svc = registry.register(["S"], Properties::new(), ());
	assert_eq!(user.state(), LifecycleState::Validated);
	assert_eq!(rec.take().last().map(String::as_str), Some("validate"));

	registry.unregister(&svc);
	assert_eq!(user.state(), LifecycleState::Invalidated);
}

struct Journal {
	name: &'static str,
	log: Arc<Mutex<Vec<String>>>,
}

impl Component for Journal {
	fn unbind(&self, field: &str, _service: &ServiceReference) -> HookResult {
		self.log.lock().push(format!("{} unbind {field}", self.name));
		Ok(())
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		self.log.lock().push(format!("{} invalidate", self.name));
		Ok(())
	}
}

/// Provider `a` needs S and publishes P; `b` needs P. Returns the S registration.
fn provider_chain(registry: &ServiceRegistry, container: &Container, log: &Arc<Mutex<Vec<String>>>) -> (ServiceHandle, InstanceHandle, InstanceHandle) {
	let specs = [
		("a", ComponentSpec::new("a").requires(Requirement::new("s", "S", Cardinality::Single)).provides("P")),
		("b", ComponentSpec::new("b").requires(Requirement::new("p", "P", Cardinality::Single))),
	];
	let mut handles = Vec::new();
	for (name, spec) in specs {
		let log = Arc::clone(log);
		container
			.register_factory(spec, move |_| Ok(Instantiated::new(Arc::new(Journal { name, log: Arc::clone(&log) }))))
			.unwrap();
		handles.push(container.instantiate(name, InstanceConfig::new(name)).unwrap());
	}
	let svc = registry.register(["S"], Properties::new(), ());
	let b = handles.pop().unwrap();
	let a = handles.pop().unwrap();
	assert_eq!(b.state(), LifecycleState::Validated);
	(svc, a, b)
}

#[test]
fn consumers_of_a_provided_service_go_first_on_dependency_loss() {
	let (registry, container) = registry(Ranking::default());
	let log = Arc::new(Mutex::new(Vec::new()));
	let (svc, a, b) = provider_chain(&registry, &container, &log);
	log.lock().clear();

	registry.unregister(&svc);
	assert_eq!(*log.lock(), vec!["b invalidate", "b unbind p", "a invalidate", "a unbind s"]);
	assert_eq!(a.state(), LifecycleState::Invalidated);
	assert_eq!(b.state(), LifecycleState::Invalidated);
	assert!(registry.find("P", &Filter::All).is_empty());

	registry.register(["S"], Properties::new(), ());
	assert_eq!(b.state(), LifecycleState::Validated);
	assert_eq!(registry.find("P", &Filter::All).len(), 1);
}

#[test]
fn consumers_of_a_provided_service_go_first_on_kill() {
	let (registry, container) = registry(Ranking::default());
	let log = Arc::new(Mutex::new(Vec::new()));
	let (svc, a, b) = provider_chain(&registry, &container, &log);
	log.lock().clear();

	a.kill();
	assert_eq!(*log.lock(), vec!["b invalidate", "b unbind p", "a invalidate", "a unbind s"]);
	assert_eq!(b.state(), LifecycleState::Invalidated);
	assert!(registry.find("P", &Filter::All).is_empty());
	assert!(registry.unregister(&svc));
}

struct Refusing;

impl Component for Refusing {
	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		bail!("not ready")
	}
}

#[test]
fn failed_validate_publishes_nothing() {
	let (registry, container) = registry(Ranking::default());
	container
		.register_factory(ComponentSpec::new("refusing").requires(Requirement::new("dep", "S", Cardinality::Single)).provides("P"), |_| {
			Ok(Instantiated::new(Arc::new(Refusing)))
		})
		.unwrap();
	let handle = container.instantiate("refusing", InstanceConfig::new("refusing")).unwrap();
	let (user, rec) = consumer(&container, "user", ComponentSpec::new("user").requires(Requirement::new("p", "P", Cardinality::Single)));

	let svc = registry.register(["S"], Properties::new(), ());
	assert_eq!(handle.state(), LifecycleState::Validated);
	assert!(registry.find("P", &Filter::All).is_empty());
	assert_eq!(user.state(), LifecycleState::Created);
	assert!(rec.take().is_empty());

	registry.unregister(&svc);
	assert_eq!(handle.state(), LifecycleState::Invalidated);
	assert!(registry.services().is_empty());
}

#[test]
fn close_kills_consumers_and_ignores_later_mutations() {
	let (registry, container) = registry(Ranking::default());
	let svc = registry.register(["S"], Properties::new(), ());
	let (handle, rec) = consumer(&container, "c", ComponentSpec::new("c").requires(Requirement::new("dep", "S", Cardinality::Single)));
	rec.take();

	registry.close();
	assert!(registry.is_closed());
	assert_eq!(rec.take(), vec!["invalidate".to_string(), format!("unbind dep {}", svc.id())]);
	assert_eq!(handle.state(), LifecycleState::Destroyed);
	assert!(registry.services().is_empty());

	registry.register(["S"], Properties::new(), ());
	assert!(registry.services().is_empty());
	registry.close();
}

#[test]
fn find_orders_by_ranking_policy() {
	let registry = ServiceRegistry::new(RegistryConfig { ranking: Ranking::ServiceRanking });
	let a = registry.register(["S"], ranked(1), ());
	let b = registry.register(["S"], ranked(3), ());
	let c = registry.register(["S"], ranked(3), ());
	registry.register(["T"], ranked(9), ());
	let ids: Vec<ServiceId> = registry.find("S", &Filter::All).iter().map(ServiceReference::id).collect();
	assert_eq!(ids, vec![b.id(), c.id(), a.id()]);

	let plain = ServiceRegistry::default();
	let first = plain.register(["S"], ranked(1), ());
	plain.register(["S"], ranked(3), ());
	assert_eq!(plain.find_first("S", &Filter::All).map(|s| s.id()), Some(first.id()));
}

#[test]
fn registry_stamps_identity_properties() {
	let registry = ServiceRegistry::default();
	let svc = registry.register(["A", "B"], Properties::new(), 5_u32);
	let props = svc.reference().properties();
	assert_eq!(props.get_int(keys::SERVICE_ID), Some(svc.id().get() as i64));
	assert_eq!(props.get(keys::OBJECT_CLASS), Some(&PropValue::from(vec!["A", "B"])));
	assert_eq!(svc.reference().get::<u32>(), Some(5));
}

struct Exclusive {
	busy: AtomicBool,
	overlaps: AtomicUsize,
}

impl Exclusive {
	fn enter(&self) -> HookResult {
		if self.busy.swap(true, Ordering::SeqCst) {
			self.overlaps.fetch_add(1, Ordering::SeqCst);
		}
		std::thread::yield_now();
		self.busy.store(false, Ordering::SeqCst);
		Ok(())
	}
}

impl Component for Exclusive {
	fn bind(&self, _field: &str, _service: &ServiceReference) -> HookResult {
		self.enter()
	}

	fn unbind(&self, _field: &str, _service: &ServiceReference) -> HookResult {
		self.enter()
	}

	fn validate(&self, _ctx: &ComponentContext) -> HookResult {
		self.enter()
	}

	fn invalidate(&self, _ctx: &ComponentContext) -> HookResult {
		self.enter()
	}
}

#[test]
fn concurrent_mutations_never_overlap_callbacks() {
	let (registry, container) = registry(Ranking::default());
	container
		.register_factory(ComponentSpec::new("exclusive").requires(Requirement::new("dep", "S", Cardinality::Aggregate)), |_| {
			Ok(Instantiated::new(Arc::new(Exclusive {
				busy: AtomicBool::new(false),
				overlaps: AtomicUsize::new(0),
			})))
		})
		.unwrap();
	let handle = container.instantiate("exclusive", InstanceConfig::new("exclusive")).unwrap();

	let threads: Vec<_> = (0..4)
		.map(|_| {
			let registry = registry.clone();
			std::thread::spawn(move || {
				for _ in 0..200 {
					let svc = registry.register(["S"], Properties::new(), ());
					registry.unregister(&svc);
				}
			})
		})
		.collect();
	for thread in threads {
		thread.join().unwrap();
	}

	let exclusive = handle.component::<Exclusive>().unwrap();
	assert_eq!(exclusive.overlaps.load(Ordering::SeqCst), 0);
	assert_eq!(handle.state(), LifecycleState::Invalidated);
	assert!(handle.bound("dep").is_empty());
}

proptest! {
	#[test]
	fn aggregate_bound_set_tracks_matching_services(ops in prop::collection::vec((any::<bool>(), 0usize..8, any::<bool>()), 1..40)) {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let (registry, container) = registry(Ranking::default());
		let spec = ComponentSpec::new("agg").requires(Requirement::new("dep", "S", Cardinality::OptionalAggregate).with_filter(Filter::eq("owner", "a")));
		let (handle, _rec) = consumer(&container, "agg", spec);

		let mut live: Vec<(ServiceHandle, bool)> = Vec::new();
		for (register, slot, matching) in ops {
			if register || live.is_empty() {
				let owner = if matching { "a" } else { "b" };
				live.push((registry.register(["S"], owned(owner), ()), matching));
			} else {
				let (svc, _) = live.remove(slot % live.len());
				registry.unregister(&svc);
			}
			let mut expected: Vec<ServiceId> = live.iter().filter(|(_, matching)| *matching).map(|(svc, _)| svc.id()).collect();
			let mut bound: Vec<ServiceId> = handle.bound("dep").iter().map(ServiceReference::id).collect();
			expected.sort();
			bound.sort();
			prop_assert_eq!(bound, expected);
			prop_assert_eq!(handle.state(), LifecycleState::Validated);
		}
	}

	#[test]
	fn validity_tracks_required_matches(ops in prop::collection::vec((any::<bool>(), any::<bool>(), 0usize..8), 1..40), start in 0usize..40) {
		let (registry, container) = registry(Ranking::default());
		let spec = ComponentSpec::new("needy")
			.requires(Requirement::new("one", "S", Cardinality::Single))
			.requires(Requirement::new("many", "T", Cardinality::Aggregate));
		container.register_factory(spec, |_| Ok(Instantiated::new(Arc::new(Recorder::default())))).unwrap();

		let mut handle: Option<InstanceHandle> = None;
		let mut live: Vec<(ServiceHandle, &str)> = Vec::new();
		let steps = ops.len();
		for (step, (register, single, slot)) in ops.into_iter().enumerate() {
			if step == start.min(steps - 1) {
				handle = Some(container.instantiate("needy", InstanceConfig::new("needy")).unwrap());
			}
			let spec = if single { "S" } else { "T" };
			if register || live.is_empty() {
				live.push((registry.register([spec], Properties::new(), ()), spec));
			} else {
				let (svc, _) = live.remove(slot % live.len());
				registry.unregister(&svc);
			}

			let Some(handle) = &handle else {
				continue;
			};
			let singles = live.iter().filter(|(_, spec)| *spec == "S").count();
			let many = live.len() - singles;
			prop_assert_eq!(handle.state() == LifecycleState::Validated, singles > 0 && many > 0);
			prop_assert_eq!(handle.bound("one").len(), singles.min(1));
			prop_assert_eq!(handle.bound("many").len(), many);
		}
	}
}
