//! UI-thread dispatch.
//!
//! Widget trees are only touched from one thread. Any other thread hands work
//! over with [`UiDispatcher::run_on_ui`]; callbacks posted from the same thread
//! run in the order they were posted.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::{TaskClass, panic_message, spawn_named_thread};

type UiJob = Box<dyn FnOnce() + Send + 'static>;

enum UiCommand {
	Run(UiJob),
	Flush(oneshot::Sender<()>),
	Shutdown,
}

/// Error returned when the UI thread is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("UI thread has stopped")]
pub struct UiClosed;

struct UiInner {
	name: String,
	tx: mpsc::UnboundedSender<UiCommand>,
	thread_id: ThreadId,
	join: Mutex<Option<std::thread::JoinHandle<()>>>,
}

/// Cloneable handle to a dedicated UI thread.
#[derive(Clone)]
pub struct UiDispatcher {
	inner: Arc<UiInner>,
}

impl std::fmt::Debug for UiDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UiDispatcher").field("name", &self.inner.name).finish_non_exhaustive()
	}
}

impl UiDispatcher {
	/// Starts the UI thread.
	pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
		let name = name.into();
		let (tx, mut rx) = mpsc::unbounded_channel::<UiCommand>();
		let thread_name = name.clone();
		let join = spawn_named_thread(TaskClass::Interactive, name.clone(), move || {
			while let Some(cmd) = rx.blocking_recv() {
				match cmd {
					UiCommand::Run(job) => {
						if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(job)) {
							tracing::error!(ui = %thread_name, panic = %panic_message(payload.as_ref()), "UI callback panicked");
						}
					}
					UiCommand::Flush(ack) => {
						let _ = ack.send(());
					}
					UiCommand::Shutdown => break,
				}
			}
			tracing::debug!(ui = %thread_name, "ui.loop.exited");
		})?;

		Ok(Self {
			inner: Arc::new(UiInner {
				name,
				tx,
				thread_id: join.thread().id(),
				join: Mutex::new(Some(join)),
			}),
		})
	}

	/// Schedules `callback` on the UI thread.
	pub fn run_on_ui<F>(&self, callback: F) -> Result<(), UiClosed>
	where
		F: FnOnce() + Send + 'static,
	{
		self.inner.tx.send(UiCommand::Run(Box::new(callback))).map_err(|_| UiClosed)
	}

	/// Returns true when called from the UI thread.
	pub fn is_ui_thread(&self) -> bool {
		std::thread::current().id() == self.inner.thread_id
	}

	/// Blocks until every callback posted before this call has run.
	///
	/// Returns immediately when called from the UI thread itself.
	pub fn flush(&self) -> Result<(), UiClosed> {
		if self.is_ui_thread() {
			return Ok(());
		}
		let (ack_tx, ack_rx) = oneshot::channel();
		self.inner.tx.send(UiCommand::Flush(ack_tx)).map_err(|_| UiClosed)?;
		ack_rx.blocking_recv().map_err(|_| UiClosed)
	}

	/// Stops the UI thread after the already queued callbacks, and joins it.
	pub fn shutdown(&self) {
		let _ = self.inner.tx.send(UiCommand::Shutdown);
		if self.is_ui_thread() {
			return;
		}
		if let Some(join) = self.inner.join.lock().take()
			&& join.join().is_err()
		{
			tracing::warn!(ui = %self.inner.name, "UI thread panicked during shutdown");
		}
	}
}
