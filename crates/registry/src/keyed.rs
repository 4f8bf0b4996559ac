//! Per-key scoped component instances.
//!
//! A [`KeyedFactory`] owns at most one instance per [`InstanceKey`]. Keys
//! usually identify a remote framework; the missing key stands for the local
//! framework and narrows requirements with an absence filter instead of a
//! wildcard.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::{InstanceConfig, InstanceHandle};
use crate::container::Container;
use crate::error::Result;
use crate::filter::Filter;

/// Normalized instance key. Empty strings collapse into the local key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InstanceKey(Option<Arc<str>>);

impl InstanceKey {
	pub const LOCAL_LABEL: &'static str = "local";

	pub fn local() -> Self {
		Self(None)
	}

	pub fn new(key: Option<&str>) -> Self {
		Self(key.filter(|k| !k.is_empty()).map(Arc::from))
	}

	pub fn as_str(&self) -> Option<&str> {
		self.0.as_deref()
	}

	pub fn is_local(&self) -> bool {
		self.0.is_none()
	}

	/// The key, or `"local"`; used to build instance names.
	pub fn label(&self) -> &str {
		self.as_str().unwrap_or(Self::LOCAL_LABEL)
	}

	/// Services whose `property` equals this key, or lacks it entirely for the local key.
	pub fn filter_on(&self, property: &str) -> Filter {
		match self.as_str() {
			Some(key) => Filter::eq(property, key),
			None => Filter::absent(property),
		}
	}
}

impl From<&str> for InstanceKey {
	fn from(value: &str) -> Self {
		Self::new(Some(value))
	}
}

impl From<Option<&str>> for InstanceKey {
	fn from(value: Option<&str>) -> Self {
		Self::new(value)
	}
}

impl From<String> for InstanceKey {
	fn from(value: String) -> Self {
		Self::new(Some(&value))
	}
}

impl fmt::Display for InstanceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

type ConfigureFn = dyn Fn(&InstanceKey) -> InstanceConfig + Send + Sync;

/// Makes and deletes one instance of a factory per key.
pub struct KeyedFactory {
	container: Container,
	factory: Arc<str>,
	configure: Box<ConfigureFn>,
	instances: Mutex<BTreeMap<InstanceKey, InstanceHandle>>,
}

impl KeyedFactory {
	/// `configure` names the instance for a key and narrows its requirement filters.
	pub fn new(container: Container, factory: impl Into<Arc<str>>, configure: impl Fn(&InstanceKey) -> InstanceConfig + Send + Sync + 'static) -> Self {
		Self {
			container,
			factory: factory.into(),
			configure: Box::new(configure),
			instances: Mutex::new(BTreeMap::new()),
		}
	}

	pub fn factory(&self) -> &str {
		&self.factory
	}

	/// Returns the live instance for `key`, instantiating it first if needed.
	pub fn make(&self, key: impl Into<InstanceKey>) -> Result<InstanceHandle> {
		let key = key.into();
		self.container.registry().serialized(|| {
			let mut instances = self.instances.lock();
			if let Some(existing) = instances.get(&key)
				&& existing.is_alive()
			{
				return Ok(existing.clone());
			}
			let handle = self.container.instantiate(&self.factory, (self.configure)(&key))?;
			tracing::debug!(factory = &*self.factory, key = %key, instance = handle.name(), "keyed.make");
			instances.insert(key, handle.clone());
			Ok(handle)
		})
	}

	/// Kills the instance of `key`. Unknown keys are ignored.
	pub fn delete(&self, key: impl Into<InstanceKey>) -> bool {
		let key = key.into();
		self.container.registry().serialized(|| {
			let removed = self.instances.lock().remove(&key);
			let Some(handle) = removed else {
				return false;
			};
			tracing::debug!(factory = &*self.factory, key = %key, "keyed.delete");
			self.kill(&handle);
			true
		})
	}

	/// Deletes every key.
	pub fn clear(&self) {
		self.container.registry().serialized(|| {
			let drained = std::mem::take(&mut *self.instances.lock());
			for (key, handle) in drained {
				tracing::debug!(factory = &*self.factory, key = %key, "keyed.delete");
				self.kill(&handle);
			}
		});
	}

	fn kill(&self, handle: &InstanceHandle) {
		// A dead handle's name may already belong to a newer instance.
		if handle.is_alive() {
			self.container.kill(handle.name());
		}
	}

	pub fn get(&self, key: impl Into<InstanceKey>) -> Option<InstanceHandle> {
		self.instances.lock().get(&key.into()).filter(|h| h.is_alive()).cloned()
	}

	pub fn keys(&self) -> Vec<InstanceKey> {
		self.instances.lock().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.instances.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.instances.lock().is_empty()
	}
}

impl fmt::Debug for KeyedFactory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyedFactory")
			.field("factory", &self.factory)
			.field("keys", &self.keys())
			.finish_non_exhaustive()
	}
}
