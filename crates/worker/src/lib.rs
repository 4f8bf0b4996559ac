//! Worker primitives shared by windrose frameworks.
//!
//! * task classification and spawn helpers over a shared tokio runtime
//! * generation-scoped lifecycle tokens for per-activation background work
//! * a FIFO UI-thread dispatcher standing in for a GUI toolkit event loop

mod class;
mod panic;
mod spawn;
mod token;
pub mod ui;

pub use class::TaskClass;
pub use panic::panic_message;
pub use spawn::{spawn, spawn_interval, spawn_named_thread};
pub use token::{GenerationClock, LifecycleToken};
pub use ui::{UiClosed, UiDispatcher};
