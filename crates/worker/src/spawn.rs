use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::TaskClass;
use crate::token::LifecycleToken;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("windrose-worker-global")
			.build()
			.expect("failed to build windrose-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task with shared worker classification metadata.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Spawns a dedicated named OS thread with shared worker classification metadata.
pub fn spawn_named_thread<F, R>(class: TaskClass, name: impl Into<String>, f: F) -> std::io::Result<std::thread::JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_named_thread");
	std::thread::Builder::new().name(name.into()).spawn(f)
}

/// Runs `tick` every `period` until it returns `false` or `token` is cancelled.
///
/// The first tick fires one full period after the call, not immediately.
pub fn spawn_interval<F>(class: TaskClass, period: Duration, token: LifecycleToken, mut tick: F) -> JoinHandle<()>
where
	F: FnMut() -> bool + Send + 'static,
{
	spawn(class, async move {
		let start = tokio::time::Instant::now() + period;
		let mut interval = tokio::time::interval_at(start, period);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				_ = token.cancelled() => break,
				_ = interval.tick() => {
					if token.is_cancelled() || !tick() {
						break;
					}
				}
			}
		}
		tracing::trace!(generation = token.generation(), "worker.interval.stopped");
	})
}
