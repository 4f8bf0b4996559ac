use thiserror::Error;

/// Errors raised by the discovery network.
#[derive(Error, Debug)]
pub enum RemoteError {
	/// A beacon could not be encoded.
	#[error("failed to encode beacon: {0}")]
	Encode(#[source] serde_json::Error),
	/// A received beacon is not valid JSON for [`crate::Beacon`].
	#[error("malformed beacon: {0}")]
	Decode(#[source] serde_json::Error),
	/// The network delivery thread has stopped.
	#[error("discovery network is closed")]
	NetworkClosed,
	/// The network delivery thread could not be started.
	#[error("failed to start discovery network: {0}")]
	Spawn(#[from] std::io::Error),
}

pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
