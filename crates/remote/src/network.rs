//! In-process discovery network.
//!
//! Frameworks publish [`Beacon`]s as JSON strings; every other joined peer
//! receives them on the network's delivery thread, in publication order.
//! Exported service objects are kept in a table keyed by endpoint id, which
//! importers resolve instead of talking a wire protocol.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use windrose_registry::ServiceObject;
use windrose_worker::{TaskClass, panic_message, spawn_named_thread};

use crate::endpoint::Beacon;
use crate::error::{RemoteError, Result};

/// Receives raw beacons published by other frameworks.
pub trait BeaconListener: Send + Sync + 'static {
	fn on_beacon(&self, raw: &str);
}

/// Identifier of a joined peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

enum NetJob {
	Broadcast { origin: String, raw: String },
	Replay { peer: PeerId },
	Flush(oneshot::Sender<()>),
}

struct Peer {
	framework_uid: String,
	listener: Arc<dyn BeaconListener>,
}

#[derive(Default)]
struct NetState {
	next_peer: u64,
	peers: BTreeMap<PeerId, Peer>,
	/// Live endpoints, by id: owning framework and last `add`/`update` beacon.
	endpoints: IndexMap<String, (String, String)>,
	objects: HashMap<String, ServiceObject>,
}

fn notify(peer: &Peer, raw: &str) {
	if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| peer.listener.on_beacon(raw))) {
		tracing::error!(peer = %peer.framework_uid, panic = %panic_message(payload.as_ref()), "beacon listener panicked");
	}
}

/// Cloneable handle to a loopback discovery network.
#[derive(Clone)]
pub struct LoopbackNetwork {
	tx: mpsc::UnboundedSender<NetJob>,
	state: Arc<Mutex<NetState>>,
}

impl std::fmt::Debug for LoopbackNetwork {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("LoopbackNetwork")
			.field("peers", &state.peers.len())
			.field("endpoints", &state.endpoints.len())
			.finish()
	}
}

impl LoopbackNetwork {
	/// Starts the delivery thread. It stops once every handle is dropped.
	pub fn new() -> Result<Self> {
		let (tx, mut rx) = mpsc::unbounded_channel::<NetJob>();
		let state = Arc::new(Mutex::new(NetState::default()));
		let shared = Arc::clone(&state);
		spawn_named_thread(TaskClass::Background, "windrose-discovery", move || {
			while let Some(job) = rx.blocking_recv() {
				match job {
					NetJob::Broadcast { origin, raw } => {
						let targets: Vec<(String, Arc<dyn BeaconListener>)> = shared
							.lock()
							.peers
							.values()
							.filter(|p| p.framework_uid != origin)
							.map(|p| (p.framework_uid.clone(), Arc::clone(&p.listener)))
							.collect();
						for (framework_uid, listener) in targets {
							notify(&Peer { framework_uid, listener }, &raw);
						}
					}
					NetJob::Replay { peer } => {
						let pending: Vec<String> = {
							let state = shared.lock();
							let Some(target) = state.peers.get(&peer) else {
								continue;
							};
							state
								.endpoints
								.values()
								.filter(|(owner, _)| *owner != target.framework_uid)
								.map(|(_, raw)| raw.clone())
								.collect()
						};
						for raw in pending {
							let target = shared.lock().peers.get(&peer).map(|p| (p.framework_uid.clone(), Arc::clone(&p.listener)));
							if let Some((framework_uid, listener)) = target {
								notify(&Peer { framework_uid, listener }, &raw);
							}
						}
					}
					NetJob::Flush(ack) => {
						let _ = ack.send(());
					}
				}
			}
			tracing::debug!("discovery.loop.exited");
		})?;
		Ok(Self { tx, state })
	}

	/// Joins as `framework_uid`; endpoints already published by others are replayed.
	pub fn join(&self, framework_uid: &str, listener: Arc<dyn BeaconListener>) -> Result<PeerId> {
		let peer = {
			let mut state = self.state.lock();
			state.next_peer += 1;
			let peer = PeerId(state.next_peer);
			state.peers.insert(
				peer,
				Peer {
					framework_uid: framework_uid.to_string(),
					listener,
				},
			);
			peer
		};
		tracing::debug!(framework = framework_uid, ?peer, "discovery.join");
		self.tx.send(NetJob::Replay { peer }).map_err(|_| RemoteError::NetworkClosed)?;
		Ok(peer)
	}

	/// Pending beacons for a departed peer are dropped.
	pub fn leave(&self, peer: PeerId) -> bool {
		self.state.lock().peers.remove(&peer).is_some()
	}

	/// Publishes an endpoint and the object importers resolve it to.
	pub fn export(&self, beacon: &Beacon, object: ServiceObject) -> Result<()> {
		self.state.lock().objects.insert(beacon.endpoint_id().to_string(), object);
		self.publish(beacon)
	}

	/// Encodes and broadcasts `beacon` to every other framework.
	pub fn publish(&self, beacon: &Beacon) -> Result<()> {
		let raw = beacon.to_json()?;
		{
			let mut state = self.state.lock();
			match beacon {
				Beacon::Add { .. } | Beacon::Update { .. } => {
					state.endpoints.insert(beacon.endpoint_id().to_string(), (beacon.framework_uid().to_string(), raw.clone()));
				}
				Beacon::Remove { .. } => {
					state.endpoints.shift_remove(beacon.endpoint_id());
					state.objects.remove(beacon.endpoint_id());
				}
			}
		}
		tracing::trace!(endpoint = beacon.endpoint_id(), "discovery.publish");
		self.tx
			.send(NetJob::Broadcast {
				origin: beacon.framework_uid().to_string(),
				raw,
			})
			.map_err(|_| RemoteError::NetworkClosed)
	}

	/// The exported object behind `endpoint_id`.
	pub fn resolve(&self, endpoint_id: &str) -> Option<ServiceObject> {
		self.state.lock().objects.get(endpoint_id).cloned()
	}

	/// Ids of every live endpoint, in publication order.
	pub fn endpoints(&self) -> Vec<String> {
		self.state.lock().endpoints.keys().cloned().collect()
	}

	/// Blocks until every beacon published before this call has been delivered.
	pub fn flush(&self) -> Result<()> {
		let (ack_tx, ack_rx) = oneshot::channel();
		self.tx.send(NetJob::Flush(ack_tx)).map_err(|_| RemoteError::NetworkClosed)?;
		ack_rx.blocking_recv().map_err(|_| RemoteError::NetworkClosed)
	}
}
