use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation clock for component activations.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a new generation clock starting at generation 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation ID.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	/// Returns a fresh token stamped with the next generation.
	pub fn token(&self) -> LifecycleToken {
		LifecycleToken::new(self.next(), CancellationToken::new())
	}
}

/// Generation-scoped cancellation token for one validated lifetime of a component.
///
/// Work started while a component is valid carries the token of that activation,
/// so a late tick from a previous activation can be told apart from the current one.
#[derive(Debug, Clone)]
pub struct LifecycleToken {
	generation: u64,
	cancel: CancellationToken,
}

impl LifecycleToken {
	/// Creates a new generation token.
	pub fn new(generation: u64, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	/// Returns generation ID.
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generations_are_monotonic() {
		let clock = GenerationClock::new();
		let first = clock.token();
		let second = clock.token();
		assert_eq!(first.generation(), 1);
		assert_eq!(second.generation(), 2);
	}

	#[test]
	fn clones_share_cancellation() {
		let token = GenerationClock::new().token();
		let ticker = token.clone();
		token.cancel();
		assert!(ticker.is_cancelled());
		assert_eq!(ticker.generation(), token.generation());
	}
}
