//! Service entries as seen by consumers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::props::{PropValue, Properties, keys};

/// Registry-assigned service identifier. Lower IDs were registered earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub(crate) u64);

impl ServiceId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ServiceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "svc#{}", self.0)
	}
}

/// Type-erased service instance.
///
/// Trait-object services are registered as their `Arc<dyn Trait>` and read
/// back with [`ServiceObject::get`] using the same type.
#[derive(Clone)]
pub struct ServiceObject(Arc<dyn Any + Send + Sync>);

impl ServiceObject {
	pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
		Self(Arc::new(value))
	}

	/// Returns a clone of the instance if it was registered as a `T`.
	pub fn get<T: Clone + 'static>(&self) -> Option<T> {
		self.0.downcast_ref::<T>().cloned()
	}

	pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
		self.0.downcast_ref::<T>()
	}
}

impl fmt::Debug for ServiceObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("ServiceObject(..)")
	}
}

pub(crate) struct ServiceRecord {
	id: ServiceId,
	specs: Vec<Arc<str>>,
	object: ServiceObject,
	properties: RwLock<Arc<Properties>>,
}

/// Non-owning handle to a registered service.
///
/// Property reads are live: they reflect the latest `update_properties`.
#[derive(Clone)]
pub struct ServiceReference(Arc<ServiceRecord>);

impl ServiceReference {
	pub(crate) fn new(id: ServiceId, specs: Vec<Arc<str>>, mut properties: Properties, object: ServiceObject) -> Self {
		stamp(&mut properties, id, &specs);
		Self(Arc::new(ServiceRecord {
			id,
			specs,
			object,
			properties: RwLock::new(Arc::new(properties)),
		}))
	}

	pub fn id(&self) -> ServiceId {
		self.0.id
	}

	pub fn specs(&self) -> &[Arc<str>] {
		&self.0.specs
	}

	pub fn has_spec(&self, spec: &str) -> bool {
		self.0.specs.iter().any(|s| &**s == spec)
	}

	/// Snapshot of the current properties.
	pub fn properties(&self) -> Arc<Properties> {
		Arc::clone(&self.0.properties.read())
	}

	pub fn property(&self, key: &str) -> Option<PropValue> {
		self.0.properties.read().get(key).cloned()
	}

	/// `service.ranking`, defaulting to zero.
	pub fn ranking(&self) -> i64 {
		self.0.properties.read().get_int(keys::SERVICE_RANKING).unwrap_or(0)
	}

	pub fn object(&self) -> &ServiceObject {
		&self.0.object
	}

	/// Shorthand for `self.object().get::<T>()`.
	pub fn get<T: Clone + 'static>(&self) -> Option<T> {
		self.0.object.get::<T>()
	}

	pub(crate) fn replace_properties(&self, mut properties: Properties) {
		stamp(&mut properties, self.0.id, &self.0.specs);
		*self.0.properties.write() = Arc::new(properties);
	}
}

fn stamp(properties: &mut Properties, id: ServiceId, specs: &[Arc<str>]) {
	properties.insert(keys::SERVICE_ID, id.0);
	properties.insert(keys::OBJECT_CLASS, specs.iter().map(|s| s.to_string()).collect::<Vec<_>>());
}

impl PartialEq for ServiceReference {
	fn eq(&self, other: &Self) -> bool {
		self.0.id == other.0.id
	}
}

impl Eq for ServiceReference {}

impl std::hash::Hash for ServiceReference {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.0.id.hash(state);
	}
}

impl fmt::Debug for ServiceReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ServiceReference")
			.field("id", &self.0.id)
			.field("specs", &self.0.specs)
			.finish_non_exhaustive()
	}
}

/// Registration handle returned by [`crate::ServiceRegistry::register`].
#[derive(Debug, Clone)]
pub struct ServiceHandle {
	reference: ServiceReference,
}

impl ServiceHandle {
	pub(crate) fn new(reference: ServiceReference) -> Self {
		Self { reference }
	}

	pub fn id(&self) -> ServiceId {
		self.reference.id()
	}

	pub fn reference(&self) -> &ServiceReference {
		&self.reference
	}
}

/// Kind of registry change reported to service listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
	Registered,
	Modified,
	Unregistering,
}

impl ServiceEventKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Registered => "REGISTERED",
			Self::Modified => "MODIFIED",
			Self::Unregistering => "UNREGISTERING",
		}
	}
}

/// A registry change.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
	pub kind: ServiceEventKind,
	pub reference: ServiceReference,
}

/// Receives every registry change, in delivery order.
pub trait ServiceListener: Send + Sync + 'static {
	fn service_changed(&self, event: &ServiceEvent);
}

/// Identifier of a registered service listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);
