// ─── Install Tasks ───
// Staged, cancellable units of work and the ordered groups that run them.
//
//   stage.rs     — per-task ordered stage lists
//   context.rs   — progress/cancellation handle passed to routines
//   observer.rs  — event sink seam (channel, Tauri, no-op)
//   runner.rs    — `TaskRoutine` + `InstallTask` state machine
//   group.rs     — insertion-ordered task groups

mod context;
mod group;
mod observer;
mod runner;
mod stage;

pub use context::{TaskContext, TaskProgress};
pub use group::{GroupOutcome, InstallTaskGroup};
#[cfg(feature = "tauri-events")]
pub use observer::TauriObserver;
pub use observer::{ChannelObserver, NoopObserver, TaskEvent, TaskObserver};
pub use runner::{InstallTask, Task, TaskRoutine, TaskState};
pub use stage::TaskStage;

#[cfg(test)]
pub(crate) use runner::testing::{Behaviour, Scripted};
#[cfg(test)]
pub(crate) use stage::testing::Step;
