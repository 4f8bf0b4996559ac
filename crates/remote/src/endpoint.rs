use serde::{Deserialize, Serialize};
use windrose_registry::props::keys;
use windrose_registry::{Properties, ServiceReference};

use crate::error::{RemoteError, Result};

/// Description of one exported service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescription {
	/// Unique across frameworks: `<framework uid>/<service id>`.
	pub endpoint_id: String,
	/// UID of the exporting framework.
	pub framework_uid: String,
	/// Exported specifications.
	pub specs: Vec<String>,
	/// Service properties, without registry-local identity keys.
	pub properties: Properties,
}

impl EndpointDescription {
	/// Describes `service` as exported by `framework_uid`, or `None` when it is not exported.
	///
	/// `service.exported.interfaces` lists the exported specifications, or
	/// `*` for all of them. Imported services are never re-exported.
	pub fn from_service(framework_uid: &str, service: &ServiceReference) -> Option<Self> {
		let properties = service.properties();
		if properties.get(keys::SERVICE_IMPORTED).and_then(|v| v.as_bool()) == Some(true) {
			return None;
		}
		let exported: Vec<&str> = properties.get(keys::EXPORTED_INTERFACES)?.strings().collect();
		let specs: Vec<String> = if exported.contains(&"*") {
			service.specs().iter().map(|s| s.to_string()).collect()
		} else {
			exported.into_iter().filter(|e| service.has_spec(e)).map(str::to_string).collect()
		};
		if specs.is_empty() {
			tracing::warn!(service = %service.id(), "exported interfaces match none of the service specifications");
			return None;
		}

		let mut described = (*properties).clone();
		described.remove(keys::SERVICE_ID);
		described.remove(keys::OBJECT_CLASS);
		Some(Self {
			endpoint_id: format!("{framework_uid}/{}", service.id().get()),
			framework_uid: framework_uid.to_string(),
			specs,
			properties: described,
		})
	}

	/// Properties of the local proxy registered by an importer.
	pub fn import_properties(&self) -> Properties {
		let mut properties = self.properties.clone();
		properties.remove(keys::EXPORTED_INTERFACES);
		properties.remove(keys::EXPORTED_CONFIGS);
		properties.insert(keys::ENDPOINT_ID, self.endpoint_id.as_str());
		properties.insert(keys::ENDPOINT_FRAMEWORK_UUID, self.framework_uid.as_str());
		properties.insert(keys::SERVICE_IMPORTED, true);
		properties
	}
}

/// Discovery message exchanged on the network, encoded as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Beacon {
	Add { endpoint: EndpointDescription },
	Update { endpoint: EndpointDescription },
	Remove { framework_uid: String, endpoint_id: String },
}

impl Beacon {
	pub fn framework_uid(&self) -> &str {
		match self {
			Self::Add { endpoint } | Self::Update { endpoint } => &endpoint.framework_uid,
			Self::Remove { framework_uid, .. } => framework_uid,
		}
	}

	pub fn endpoint_id(&self) -> &str {
		match self {
			Self::Add { endpoint } | Self::Update { endpoint } => &endpoint.endpoint_id,
			Self::Remove { endpoint_id, .. } => endpoint_id,
		}
	}

	pub fn to_json(&self) -> Result<String> {
		serde_json::to_string(self).map_err(RemoteError::Encode)
	}

	pub fn from_json(raw: &str) -> Result<Self> {
		serde_json::from_str(raw).map_err(RemoteError::Decode)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use windrose_registry::ServiceRegistry;

	use super::*;

	#[test]
	fn only_exported_services_are_described() {
		let registry = ServiceRegistry::default();
		let plain = registry.register(["probe"], Properties::new(), ());
		assert!(EndpointDescription::from_service("fw", plain.reference()).is_none());

		let exported = registry.register(["probe", "other"], Properties::new().with(keys::EXPORTED_INTERFACES, "*").with("x", 1_i64), ());
		let endpoint = EndpointDescription::from_service("fw", exported.reference()).unwrap();
		assert_eq!(endpoint.specs, vec!["probe", "other"]);
		assert_eq!(endpoint.endpoint_id, format!("fw/{}", exported.id().get()));
		assert!(!endpoint.properties.contains_key(keys::SERVICE_ID));
		assert_eq!(endpoint.properties.get_int("x"), Some(1));
	}

	#[test]
	fn explicit_interface_list_narrows_specs() {
		let registry = ServiceRegistry::default();
		let svc = registry.register(["a", "b"], Properties::new().with(keys::EXPORTED_INTERFACES, vec!["b", "zzz"]), ());
		let endpoint = EndpointDescription::from_service("fw", svc.reference()).unwrap();
		assert_eq!(endpoint.specs, vec!["b"]);

		let none = registry.register(["a"], Properties::new().with(keys::EXPORTED_INTERFACES, "zzz"), ());
		assert!(EndpointDescription::from_service("fw", none.reference()).is_none());
	}

	#[test]
	fn imported_services_are_not_reexported() {
		let registry = ServiceRegistry::default();
		let svc = registry.register(["a"], Properties::new().with(keys::EXPORTED_INTERFACES, "*").with(keys::SERVICE_IMPORTED, true), ());
		assert!(EndpointDescription::from_service("fw", svc.reference()).is_none());
	}

	#[test]
	fn import_properties_mark_the_origin() {
		let endpoint = EndpointDescription {
			endpoint_id: "fw1/3".into(),
			framework_uid: "fw1".into(),
			specs: vec!["probe".into()],
			properties: Properties::new().with(keys::EXPORTED_INTERFACES, "*").with("name", "p"),
		};
		let imported = endpoint.import_properties();
		assert_eq!(imported.get_str(keys::ENDPOINT_FRAMEWORK_UUID), Some("fw1"));
		assert_eq!(imported.get_str(keys::ENDPOINT_ID), Some("fw1/3"));
		assert_eq!(imported.get(keys::SERVICE_IMPORTED).and_then(|v| v.as_bool()), Some(true));
		assert!(!imported.contains_key(keys::EXPORTED_INTERFACES));
		assert_eq!(imported.get_str("name"), Some("p"));
	}

	#[test]
	fn beacons_are_tagged_json() {
		let beacon = Beacon::Remove {
			framework_uid: "fw1".into(),
			endpoint_id: "fw1/3".into(),
		};
		let json = beacon.to_json().unwrap();
		assert!(json.contains(r#""event":"remove""#));
		assert_eq!(Beacon::from_json(&json).unwrap(), beacon);
		assert!(matches!(Beacon::from_json("{\"event\":\"explode\"}"), Err(RemoteError::Decode(_))));
	}
}
