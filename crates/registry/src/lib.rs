//! Dynamic service registry with dependency injection.
//!
//! * [`ServiceRegistry`]: services registered under specifications with
//!   ordered properties, looked up with typed [`Filter`]s
//! * [`Component`]s declare [`Requirement`]s in a [`ComponentSpec`]; the
//!   registry binds matching services and drives each instance through
//!   [`LifecycleState`]
//! * [`Container`] builds named instances from factories, [`KeyedFactory`]
//!   scopes one instance per external key
//! * [`Framework`] owns one registry and its container
//!
//! All mutations of one registry are serialized. Component hooks run outside
//! the registry's state lock, one at a time, and may call back into the
//! registry.

mod component;
mod container;
mod error;
mod filter;
mod framework;
mod gate;
mod keyed;
pub mod props;
mod registry;
mod service;

pub use component::{
	Cardinality, Component, ComponentContext, ComponentSpec, HookResult, InstanceConfig, InstanceHandle, InstanceId, LifecycleState, Requirement,
};
pub use container::{Container, Instantiated};
pub use error::{RegistryError, Result};
pub use filter::Filter;
pub use framework::{Framework, FrameworkConfig};
pub use gate::ActivationGate;
pub use keyed::{InstanceKey, KeyedFactory};
pub use props::{PropValue, Properties};
pub use registry::{Ranking, RegistryConfig, ServiceRegistry};
pub use service::{ListenerId, ServiceEvent, ServiceEventKind, ServiceHandle, ServiceId, ServiceListener, ServiceObject, ServiceReference};
