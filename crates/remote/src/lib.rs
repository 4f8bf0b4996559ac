//! Remote services between windrose frameworks.
//!
//! The [`Exporter`] of a framework announces each local service carrying
//! `service.exported.interfaces` as an [`EndpointDescription`] on a
//! [`LoopbackNetwork`]. The [`Importer`] of every other framework registers a
//! proxy for it, tagged with `endpoint.framework.uuid` and `service.imported`,
//! and removes it when the endpoint is withdrawn.

mod endpoint;
mod error;
pub mod exporter;
pub mod importer;
mod network;

use std::sync::Arc;

pub use endpoint::{Beacon, EndpointDescription};
pub use error::{RemoteError, Result};
pub use exporter::Exporter;
pub use importer::Importer;
pub use network::{BeaconListener, LoopbackNetwork, PeerId};
use windrose_registry::{Container, InstanceConfig, InstanceHandle, Instantiated};

/// Handles of the remote-services components of one framework.
#[derive(Debug, Clone)]
pub struct RemoteServices {
	pub exporter: InstanceHandle,
	pub importer: InstanceHandle,
}

impl RemoteServices {
	/// Registers the exporter and importer factories and starts one instance of each.
	pub fn install(container: &Container, network: &LoopbackNetwork) -> windrose_registry::Result<Self> {
		let registry = container.registry().clone();
		let net = network.clone();
		container.register_factory(Exporter::spec(), move |_| Ok(Instantiated::new(Arc::new(Exporter::new(registry.clone(), net.clone())))))?;
		let registry = container.registry().clone();
		let net = network.clone();
		container.register_factory(Importer::spec(), move |_| Ok(Instantiated::new(Arc::new(Importer::new(registry.clone(), net.clone())))))?;

		Ok(Self {
			exporter: container.instantiate(exporter::FACTORY, InstanceConfig::new(exporter::INSTANCE))?,
			importer: container.instantiate(importer::FACTORY, InstanceConfig::new(importer::INSTANCE))?,
		})
	}
}
