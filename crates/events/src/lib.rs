//! Publish/subscribe events between windrose components.
//!
//! Handlers are ordinary services registered under [`EVENT_HANDLER_SPEC`]
//! with an `event.topics` property; the [`EventAdmin`] component binds all of
//! them and routes each event to the handlers whose patterns match.

mod admin;
mod event;
mod topic;

pub use admin::{EventAdmin, EventHandler, FACTORY, INSTANCE, handler_service};
pub use event::Event;
pub use topic::{TopicError, TopicPattern};

/// Specification of the event admin service.
pub const EVENT_ADMIN_SPEC: &str = "windrose.event.admin";
/// Specification of event handler services.
pub const EVENT_HANDLER_SPEC: &str = "windrose.event.handler";

/// Event property keys.
pub mod keys {
	/// Topic patterns of a handler service: a string or a list of strings.
	pub const EVENT_TOPICS: &str = "event.topics";
	/// Topic of an event.
	pub const EVENT_TOPIC: &str = "event.topic";
	/// UID of the framework an event was posted in.
	pub const EVENT_FRAMEWORK_UID: &str = "event.framework.uid";
}
