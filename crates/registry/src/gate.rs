//! Lock plus active flag for components whose bind callbacks must wait for validation.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;

/// Guards bind and unbind bodies of a component against its own lifecycle.
///
/// Binds arriving while inactive are dropped: `activate` replays the bound
/// state itself. Once `deactivate` ran, a late bind cannot bring the
/// component back to life.
#[derive(Debug, Default)]
pub struct ActivationGate {
	lock: ReentrantMutex<()>,
	active: AtomicBool,
}

impl ActivationGate {
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs `f` under the gate lock, then marks the gate active.
	pub fn activate<R>(&self, f: impl FnOnce() -> R) -> R {
		let _guard = self.lock.lock();
		let result = f();
		self.active.store(true, Ordering::Release);
		result
	}

	/// Marks the gate inactive, then runs `f` under the gate lock.
	pub fn deactivate<R>(&self, f: impl FnOnce() -> R) -> R {
		let _guard = self.lock.lock();
		self.active.store(false, Ordering::Release);
		f()
	}

	/// Runs `f` only while active.
	pub fn when_active<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
		let _guard = self.lock.lock();
		self.active.load(Ordering::Acquire).then(f)
	}

	/// Runs `f` under the gate lock whatever the state.
	pub fn locked<R>(&self, f: impl FnOnce() -> R) -> R {
		let _guard = self.lock.lock();
		f()
	}

	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn inactive_gate_skips_work() {
		let gate = ActivationGate::new();
		assert_eq!(gate.when_active(|| 1), None);
		gate.activate(|| ());
		assert_eq!(gate.when_active(|| 1), Some(1));
		gate.deactivate(|| ());
		assert_eq!(gate.when_active(|| 1), None);
	}

	#[test]
	fn activate_body_runs_before_flag_flips() {
		let gate = ActivationGate::new();
		let seen = gate.activate(|| gate.is_active());
		assert!(!seen);
		assert!(gate.is_active());
		let seen = gate.deactivate(|| gate.is_active());
		assert!(!seen);
	}

	#[test]
	fn gate_is_reentrant() {
		let gate = ActivationGate::new();
		gate.activate(|| ());
		let nested = gate.locked(|| gate.when_active(|| 7));
		assert_eq!(nested, Some(7));
	}
}
