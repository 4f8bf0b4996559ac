//! Service and component properties.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Well-known property keys.
pub mod keys {
	/// Registry-assigned service identifier.
	pub const SERVICE_ID: &str = "service.id";
	/// Specifications a service is registered under.
	pub const OBJECT_CLASS: &str = "objectClass";
	/// Integer ranking used by the `service-ranking` policy.
	pub const SERVICE_RANKING: &str = "service.ranking";
	/// Name of the component instance that provides a service.
	pub const INSTANCE_NAME: &str = "instance.name";
	/// UID of the framework hosting a registry.
	pub const FRAMEWORK_UID: &str = "framework.uid";
	/// Specifications of a service to export to remote frameworks.
	pub const EXPORTED_INTERFACES: &str = "service.exported.interfaces";
	/// Export configurations requested for an exported service.
	pub const EXPORTED_CONFIGS: &str = "service.exported.configs";
	/// UID of the framework that exported an imported service.
	pub const ENDPOINT_FRAMEWORK_UUID: &str = "endpoint.framework.uuid";
	/// Identifier of the endpoint an imported service comes from.
	pub const ENDPOINT_ID: &str = "endpoint.id";
	/// Set on services registered by an importer.
	pub const SERVICE_IMPORTED: &str = "service.imported";
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	List(Vec<PropValue>),
	Map(Properties),
}

impl PropValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Self::Float(f) => Some(*f),
			Self::Int(i) => Some(*i as f64),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&Properties> {
		match self {
			Self::Map(map) => Some(map),
			_ => None,
		}
	}

	/// Equality test used by filters: a list matches when any element equals `expected`.
	pub fn matches(&self, expected: &PropValue) -> bool {
		if self == expected {
			return true;
		}
		match self {
			Self::List(items) => items.iter().any(|item| item == expected),
			_ => false,
		}
	}

	/// Iterates over string values, flattening lists.
	pub fn strings(&self) -> impl Iterator<Item = &str> {
		let slice: &[PropValue] = match self {
			Self::List(items) => items,
			other => std::slice::from_ref(other),
		};
		slice.iter().filter_map(PropValue::as_str)
	}
}

impl fmt::Display for PropValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(x) => write!(f, "{x}"),
			Self::Str(s) => f.write_str(s),
			Self::List(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
			Self::Map(map) => write!(f, "{map}"),
		}
	}
}

impl From<bool> for PropValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for PropValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for PropValue {
	fn from(value: i32) -> Self {
		Self::Int(i64::from(value))
	}
}

impl From<u64> for PropValue {
	fn from(value: u64) -> Self {
		Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
	}
}

impl From<f64> for PropValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for PropValue {
	fn from(value: &str) -> Self {
		Self::Str(value.to_string())
	}
}

impl From<String> for PropValue {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}

impl From<&String> for PropValue {
	fn from(value: &String) -> Self {
		Self::Str(value.clone())
	}
}

impl From<Properties> for PropValue {
	fn from(value: Properties) -> Self {
		Self::Map(value)
	}
}

impl<T: Into<PropValue>> From<Vec<T>> for PropValue {
	fn from(value: Vec<T>) -> Self {
		Self::List(value.into_iter().map(Into::into).collect())
	}
}

/// Ordered key → value property set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(IndexMap<String, PropValue>);

impl Properties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	#[must_use]
	pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
		self.0.insert(key.into(), value.into())
	}

	pub fn remove(&mut self, key: &str) -> Option<PropValue> {
		self.0.shift_remove(key)
	}

	pub fn get(&self, key: &str) -> Option<&PropValue> {
		self.0.get(key)
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(PropValue::as_str)
	}

	pub fn get_int(&self, key: &str) -> Option<i64> {
		self.get(key).and_then(PropValue::as_int)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Copies every entry of `other` into `self`, overriding existing keys.
	pub fn merge(&mut self, other: &Properties) {
		for (key, value) in other.iter() {
			self.0.insert(key.to_string(), value.clone());
		}
	}
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

impl fmt::Display for Properties {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("{")?;
		for (i, (key, value)) in self.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{key}: {value}")?;
		}
		f.write_str("}")
	}
}
