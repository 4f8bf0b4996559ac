use std::fmt;
use std::str::FromStr;

/// Topic pattern declared by an event handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPattern {
	/// `*`: every topic.
	Any,
	/// `a/b`: exactly this topic.
	Exact(String),
	/// `a/b/*`: every topic below `a/b`.
	Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
	#[error("empty topic pattern")]
	Empty,
	#[error("wildcard is only allowed as the last segment: {0}")]
	MisplacedWildcard(String),
	#[error("empty segment in topic pattern: {0}")]
	EmptySegment(String),
}

impl TopicPattern {
	pub fn matches(&self, topic: &str) -> bool {
		match self {
			Self::Any => true,
			Self::Exact(exact) => exact == topic,
			Self::Prefix(prefix) => topic.strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/') && rest.len() > 1),
		}
	}
}

impl FromStr for TopicPattern {
	type Err = TopicError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		if raw.is_empty() {
			return Err(TopicError::Empty);
		}
		if raw == "*" {
			return Ok(Self::Any);
		}
		let (body, wildcard) = match raw.strip_suffix("/*") {
			Some(body) => (body, true),
			None => (raw, false),
		};
		if body.split('/').any(str::is_empty) {
			return Err(TopicError::EmptySegment(raw.to_string()));
		}
		if body.contains('*') {
			return Err(TopicError::MisplacedWildcard(raw.to_string()));
		}
		Ok(if wildcard { Self::Prefix(body.to_string()) } else { Self::Exact(body.to_string()) })
	}
}

impl fmt::Display for TopicPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Any => f.write_str("*"),
			Self::Exact(topic) => f.write_str(topic),
			Self::Prefix(prefix) => write!(f, "{prefix}/*"),
		}
	}
}

/// Parses every pattern, logging and skipping the invalid ones.
pub(crate) fn parse_patterns<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<TopicPattern> {
	raw.into_iter()
		.filter_map(|p| match p.parse() {
			Ok(pattern) => Some(pattern),
			Err(error) => {
				tracing::warn!(pattern = p, %error, "ignoring invalid event topic pattern");
				None
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pattern(raw: &str) -> TopicPattern {
		raw.parse().unwrap()
	}

	#[test]
	fn exact_topics_match_only_themselves() {
		let p = pattern("windrose/compass/angle");
		assert!(p.matches("windrose/compass/angle"));
		assert!(!p.matches("windrose/compass"));
		assert!(!p.matches("windrose/compass/angle/raw"));
	}

	#[test]
	fn prefix_matches_every_subtopic() {
		let p = pattern("windrose/framework/*");
		assert!(p.matches("windrose/framework/ServiceEvent/REGISTERED"));
		assert!(p.matches("windrose/framework/x"));
		assert!(!p.matches("windrose/framework"));
		assert!(!p.matches("windrose/frameworks/x"));
		assert!(pattern("*").matches("anything/at/all"));
	}

	#[test]
	fn malformed_patterns_are_rejected() {
		assert_eq!("".parse::<TopicPattern>(), Err(TopicError::Empty));
		assert!(matches!("a/*/b".parse::<TopicPattern>(), Err(TopicError::MisplacedWildcard(_))));
		assert!(matches!("a//b".parse::<TopicPattern>(), Err(TopicError::EmptySegment(_))));
		assert_eq!(parse_patterns(["a/b", "a/*/c", "c/*"]), vec![pattern("a/b"), pattern("c/*")]);
	}

	#[test]
	fn display_round_trips() {
		for raw in ["*", "a/b", "a/b/*"] {
			assert_eq!(pattern(raw).to_string(), raw);
		}
	}
}
