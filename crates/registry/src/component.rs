//! Component descriptors and instance handles.
//!
//! A component declares what it needs with a [`ComponentSpec`] built once at
//! startup. Each instance gets its own bound sets and lifecycle, driven by
//! the registry that owns it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::filter::Filter;
use crate::props::{PropValue, Properties};
use crate::registry::ServiceRegistry;
use crate::service::{ServiceHandle, ServiceObject, ServiceReference};

/// Result type of component hooks.
pub type HookResult = anyhow::Result<()>;

/// How many services a requirement binds and whether it gates validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
	/// Exactly one bound service, required for validation.
	Single,
	/// At most one bound service.
	OptionalSingle,
	/// Every matching service, at least one required for validation.
	Aggregate,
	/// Every matching service, possibly none.
	OptionalAggregate,
}

impl Cardinality {
	pub const fn is_optional(self) -> bool {
		matches!(self, Self::OptionalSingle | Self::OptionalAggregate)
	}

	pub const fn is_aggregate(self) -> bool {
		matches!(self, Self::Aggregate | Self::OptionalAggregate)
	}
}

/// One dependency declared by a component.
#[derive(Debug, Clone)]
pub struct Requirement {
	field: Arc<str>,
	spec: Arc<str>,
	filter: Filter,
	cardinality: Cardinality,
}

impl Requirement {
	/// Declares a dependency named `field` on services registered under `spec`.
	pub fn new(field: impl Into<Arc<str>>, spec: impl Into<Arc<str>>, cardinality: Cardinality) -> Self {
		Self {
			field: field.into(),
			spec: spec.into(),
			filter: Filter::All,
			cardinality,
		}
	}

	#[must_use]
	pub fn with_filter(mut self, filter: Filter) -> Self {
		self.filter = filter;
		self
	}

	pub fn field(&self) -> &str {
		&self.field
	}

	pub fn spec(&self) -> &str {
		&self.spec
	}

	pub fn filter(&self) -> &Filter {
		&self.filter
	}

	pub fn cardinality(&self) -> Cardinality {
		self.cardinality
	}

	pub(crate) fn field_arc(&self) -> &Arc<str> {
		&self.field
	}

	pub(crate) fn accepts(&self, service: &ServiceReference) -> bool {
		service.has_spec(&self.spec) && self.filter.matches(&service.properties())
	}
}

/// Lifecycle of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
	/// Instantiated, required dependencies not satisfied yet.
	Created = 0,
	/// Every required dependency is bound and `validate` ran.
	Validated = 1,
	/// Was valid, lost a required dependency.
	Invalidated = 2,
	/// Killed; no more callbacks.
	Destroyed = 3,
}

impl LifecycleState {
	const fn from_u8(raw: u8) -> Self {
		match raw {
			0 => Self::Created,
			1 => Self::Validated,
			2 => Self::Invalidated,
			_ => Self::Destroyed,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::Validated => "validated",
			Self::Invalidated => "invalidated",
			Self::Destroyed => "destroyed",
		}
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Callbacks driven by the registry.
///
/// Hooks run outside the registry's state lock and never concurrently with
/// each other for a given registry. Registry calls made from inside a hook are
/// applied at once, and their notifications are delivered right after the
/// running hook returns. Errors and panics are logged and swallowed.
pub trait Component: Send + Sync + 'static {
	/// A service joined the bound set of `field`.
	fn bind(&self, field: &str, service: &ServiceReference) -> HookResult {
		let _ = (field, service);
		Ok(())
	}

	/// A service left the bound set of `field`.
	fn unbind(&self, field: &str, service: &ServiceReference) -> HookResult {
		let _ = (field, service);
		Ok(())
	}

	/// Every required dependency is bound.
	fn validate(&self, ctx: &ComponentContext) -> HookResult {
		let _ = ctx;
		Ok(())
	}

	/// A required dependency is about to be unbound, or the instance is being killed.
	fn invalidate(&self, ctx: &ComponentContext) -> HookResult {
		let _ = ctx;
		Ok(())
	}
}

/// Instance-level view handed to `validate` / `invalidate`.
#[derive(Clone)]
pub struct ComponentContext {
	registry: ServiceRegistry,
	name: Arc<str>,
	properties: Arc<Properties>,
}

impl ComponentContext {
	pub fn registry(&self) -> &ServiceRegistry {
		&self.registry
	}

	pub fn instance_name(&self) -> &str {
		&self.name
	}

	pub fn properties(&self) -> &Properties {
		&self.properties
	}

	pub fn property(&self, key: &str) -> Option<&PropValue> {
		self.properties.get(key)
	}

	/// UID of the framework owning the registry.
	pub fn framework_uid(&self) -> &str {
		self.registry.framework_uid()
	}
}

/// Declarative description of a component factory.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
	factory: Arc<str>,
	requirements: Vec<Requirement>,
	provides: Vec<Arc<str>>,
	properties: Properties,
}

impl ComponentSpec {
	pub fn new(factory: impl Into<Arc<str>>) -> Self {
		Self {
			factory: factory.into(),
			requirements: Vec::new(),
			provides: Vec::new(),
			properties: Properties::new(),
		}
	}

	#[must_use]
	pub fn requires(mut self, requirement: Requirement) -> Self {
		self.requirements.push(requirement);
		self
	}

	/// Registers the instance's service under `spec` while it is valid.
	#[must_use]
	pub fn provides(mut self, spec: impl Into<Arc<str>>) -> Self {
		self.provides.push(spec.into());
		self
	}

	/// Default instance property, also published on the provided service.
	#[must_use]
	pub fn property(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
		self.properties.insert(key, value);
		self
	}

	pub fn factory(&self) -> &str {
		&self.factory
	}

	pub fn requirements(&self) -> &[Requirement] {
		&self.requirements
	}

	pub fn provided_specs(&self) -> &[Arc<str>] {
		&self.provides
	}

	pub fn properties(&self) -> &Properties {
		&self.properties
	}
}

/// Per-instance settings passed to `instantiate`.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
	name: Arc<str>,
	properties: Properties,
	filters: HashMap<String, Filter>,
}

impl InstanceConfig {
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self {
			name: name.into(),
			properties: Properties::new(),
			filters: HashMap::new(),
		}
	}

	#[must_use]
	pub fn property(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
		self.properties.insert(key, value);
		self
	}

	/// Replaces the filter of the requirement named `field` for this instance only.
	#[must_use]
	pub fn filter(mut self, field: impl Into<String>, filter: Filter) -> Self {
		self.filters.insert(field.into(), filter);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn properties(&self) -> &Properties {
		&self.properties
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.properties.get_str(key)
	}

	pub(crate) fn name_arc(&self) -> &Arc<str> {
		&self.name
	}

	pub(crate) fn filters(&self) -> &HashMap<String, Filter> {
		&self.filters
	}
}

/// Identifier of a component instance within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub(crate) u64);

pub(crate) struct ProvidedService {
	pub specs: Vec<Arc<str>>,
	pub object: ServiceObject,
}

/// State shared between the registry and every handle of one instance.
pub(crate) struct InstanceCore {
	pub id: InstanceId,
	pub component: Arc<dyn Component>,
	pub concrete: Arc<dyn Any + Send + Sync>,
	pub context: ComponentContext,
	pub provided: Option<ProvidedService>,
	pub registration: Mutex<Option<ServiceHandle>>,
	state: AtomicU8,
	disposed: AtomicBool,
}

impl InstanceCore {
	pub fn new(
		id: InstanceId,
		registry: ServiceRegistry,
		name: Arc<str>,
		properties: Properties,
		component: Arc<dyn Component>,
		concrete: Arc<dyn Any + Send + Sync>,
		provided: Option<ProvidedService>,
	) -> Self {
		Self {
			id,
			component,
			concrete,
			context: ComponentContext {
				registry,
				name,
				properties: Arc::new(properties),
			},
			provided,
			registration: Mutex::new(None),
			state: AtomicU8::new(LifecycleState::Created as u8),
			disposed: AtomicBool::new(false),
		}
	}

	pub fn name(&self) -> &str {
		&self.context.name
	}

	pub fn state(&self) -> LifecycleState {
		LifecycleState::from_u8(self.state.load(Ordering::Acquire))
	}

	pub fn set_state(&self, state: LifecycleState) {
		self.state.store(state as u8, Ordering::Release);
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	pub fn dispose(&self) {
		self.disposed.store(true, Ordering::Release);
	}
}

/// Handle to a component instance.
#[derive(Clone)]
pub struct InstanceHandle {
	core: Arc<InstanceCore>,
}

impl InstanceHandle {
	pub(crate) fn new(core: Arc<InstanceCore>) -> Self {
		Self { core }
	}

	pub fn id(&self) -> InstanceId {
		self.core.id
	}

	pub fn name(&self) -> &str {
		self.core.name()
	}

	pub fn state(&self) -> LifecycleState {
		self.core.state()
	}

	/// False once the instance has been killed.
	pub fn is_alive(&self) -> bool {
		self.core.state() != LifecycleState::Destroyed
	}

	pub fn properties(&self) -> &Properties {
		self.core.context.properties()
	}

	/// The concrete component, if it is a `C`.
	pub fn component<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
		Arc::clone(&self.core.concrete).downcast::<C>().ok()
	}

	/// Services currently bound to the requirement named `field`.
	pub fn bound(&self, field: &str) -> Vec<ServiceReference> {
		self.core.context.registry.bound(self.core.id, field)
	}

	/// Kills the instance. Killing a dead instance is a no-op.
	pub fn kill(&self) {
		self.core.context.registry.kill(self.core.id);
	}
}

impl PartialEq for InstanceHandle {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.core, &other.core)
	}
}

impl Eq for InstanceHandle {}

impl fmt::Debug for InstanceHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InstanceHandle")
			.field("name", &self.core.name())
			.field("state", &self.core.state())
			.finish()
	}
}
