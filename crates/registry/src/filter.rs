//! Typed property filters.
//!
//! Filters select services by their properties. They compose like LDAP
//! filters (`and`, `or`, `not`, presence, equality) and render in that
//! syntax for logs, but are never parsed from strings.

use std::fmt;
use std::sync::Arc;

use crate::props::{PropValue, Properties};

type Predicate = Arc<dyn Fn(&Properties) -> bool + Send + Sync>;

/// A predicate over a property set.
#[derive(Clone, Default)]
pub enum Filter {
	/// Matches every property set.
	#[default]
	All,
	/// The key is set and its value equals (or, for lists, contains) the value.
	Equals(String, PropValue),
	/// The key is set, whatever its value.
	Present(String),
	And(Vec<Filter>),
	Or(Vec<Filter>),
	Not(Box<Filter>),
	/// Arbitrary predicate.
	Predicate(Predicate),
}

impl Filter {
	pub fn all() -> Self {
		Self::All
	}

	pub fn eq(key: impl Into<String>, value: impl Into<PropValue>) -> Self {
		Self::Equals(key.into(), value.into())
	}

	pub fn present(key: impl Into<String>) -> Self {
		Self::Present(key.into())
	}

	/// Matches property sets where `key` is not set at all.
	pub fn absent(key: impl Into<String>) -> Self {
		Self::Not(Box::new(Self::Present(key.into())))
	}

	pub fn predicate(f: impl Fn(&Properties) -> bool + Send + Sync + 'static) -> Self {
		Self::Predicate(Arc::new(f))
	}

	/// Conjunction, flattening nested `And`s and dropping `All`.
	#[must_use]
	pub fn and(self, other: Filter) -> Self {
		match (self, other) {
			(Self::All, f) | (f, Self::All) => f,
			(Self::And(mut lhs), Self::And(rhs)) => {
				lhs.extend(rhs);
				Self::And(lhs)
			}
			(Self::And(mut lhs), f) => {
				lhs.push(f);
				Self::And(lhs)
			}
			(f, Self::And(mut rhs)) => {
				rhs.insert(0, f);
				Self::And(rhs)
			}
			(lhs, rhs) => Self::And(vec![lhs, rhs]),
		}
	}

	#[must_use]
	pub fn or(self, other: Filter) -> Self {
		match (self, other) {
			(Self::Or(mut lhs), rhs) => {
				lhs.push(rhs);
				Self::Or(lhs)
			}
			(lhs, rhs) => Self::Or(vec![lhs, rhs]),
		}
	}

	#[must_use]
	#[allow(clippy::should_implement_trait, reason = "builder reads better than `!filter`")]
	pub fn not(self) -> Self {
		match self {
			Self::Not(inner) => *inner,
			f => Self::Not(Box::new(f)),
		}
	}

	pub fn matches(&self, props: &Properties) -> bool {
		match self {
			Self::All => true,
			Self::Equals(key, value) => props.get(key).is_some_and(|v| v.matches(value)),
			Self::Present(key) => props.contains_key(key),
			Self::And(filters) => filters.iter().all(|f| f.matches(props)),
			Self::Or(filters) => filters.iter().any(|f| f.matches(props)),
			Self::Not(inner) => !inner.matches(props),
			Self::Predicate(f) => f(props),
		}
	}
}

impl fmt::Display for Filter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::All => f.write_str("(*)"),
			Self::Equals(key, value) => write!(f, "({key}={value})"),
			Self::Present(key) => write!(f, "({key}=*)"),
			Self::And(filters) => {
				f.write_str("(&")?;
				for inner in filters {
					write!(f, "{inner}")?;
				}
				f.write_str(")")
			}
			Self::Or(filters) => {
				f.write_str("(|")?;
				for inner in filters {
					write!(f, "{inner}")?;
				}
				f.write_str(")")
			}
			Self::Not(inner) => write!(f, "(!{inner})"),
			Self::Predicate(_) => f.write_str("(<predicate>)"),
		}
	}
}

impl fmt::Debug for Filter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Filter{self}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::props::keys;

	fn probe(uid: Option<&str>) -> Properties {
		let props = Properties::new().with(keys::SERVICE_ID, 1);
		match uid {
			Some(uid) => props.with(keys::ENDPOINT_FRAMEWORK_UUID, uid),
			None => props,
		}
	}

	#[test]
	fn absence_is_not_a_wildcard() {
		let local = Filter::absent(keys::ENDPOINT_FRAMEWORK_UUID);
		assert!(local.matches(&probe(None)));
		assert!(!local.matches(&probe(Some("fw1"))));
		assert!(!local.matches(&probe(Some(""))));
	}

	#[test]
	fn equality_selects_one_owner() {
		let fw1 = Filter::eq(keys::ENDPOINT_FRAMEWORK_UUID, "fw1");
		assert!(fw1.matches(&probe(Some("fw1"))));
		assert!(!fw1.matches(&probe(Some("fw2"))));
		assert!(!fw1.matches(&probe(None)));
	}

	#[test]
	fn combinators_flatten() {
		let f = Filter::all().and(Filter::present("a")).and(Filter::eq("b", 1)).and(Filter::present("c"));
		match &f {
			Filter::And(items) => assert_eq!(items.len(), 3),
			other => panic!("expected And, got {other:?}"),
		}
		assert_eq!(f.to_string(), "(&(a=*)(b=1)(c=*))");
		assert_eq!(Filter::present("a").not().not().to_string(), "(a=*)");
	}

	#[test]
	fn predicate_filters_run_closures() {
		let ranked = Filter::predicate(|p| p.get_int(keys::SERVICE_RANKING).unwrap_or(0) > 5);
		assert!(ranked.matches(&Properties::new().with(keys::SERVICE_RANKING, 10)));
		assert!(!ranked.matches(&Properties::new()));
		assert!(Filter::eq("x", 1).or(ranked).matches(&Properties::new().with("x", 1)));
	}
}
