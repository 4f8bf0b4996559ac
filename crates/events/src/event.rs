use serde::{Deserialize, Serialize};
use windrose_registry::{PropValue, Properties};

use crate::keys;

/// A posted event: a topic plus properties.
///
/// The properties always carry `event.topic`; events leaving an event admin
/// also carry `event.framework.uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	topic: String,
	properties: Properties,
}

impl Event {
	pub fn new(topic: impl Into<String>, mut properties: Properties) -> Self {
		let topic = topic.into();
		properties.insert(keys::EVENT_TOPIC, topic.as_str());
		Self { topic, properties }
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub fn properties(&self) -> &Properties {
		&self.properties
	}

	pub fn property(&self, key: &str) -> Option<&PropValue> {
		self.properties.get(key)
	}

	/// UID of the framework the event was posted in.
	pub fn framework_uid(&self) -> Option<&str> {
		self.properties.get_str(keys::EVENT_FRAMEWORK_UID)
	}

	pub(crate) fn stamp_origin(&mut self, uid: &str) {
		if !self.properties.contains_key(keys::EVENT_FRAMEWORK_UID) {
			self.properties.insert(keys::EVENT_FRAMEWORK_UID, uid);
		}
	}
}
