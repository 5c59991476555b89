use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::context::TaskProgress;
use super::runner::TaskState;

/// Receives task events. Called from whichever worker drives the task, so
/// implementations hand events off instead of touching UI state directly.
pub trait TaskObserver: Send + Sync {
    fn on_stage_changed(&self, _task: &str, _stage: &str) {}

    fn on_progress(&self, _task: &str, _progress: &TaskProgress) {}

    fn on_complete(&self, _task: &str, _state: &TaskState) {}
}

pub struct NoopObserver;

impl TaskObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEvent {
    StageChanged {
        task: String,
        stage: String,
    },
    Progress {
        task: String,
        progress: TaskProgress,
    },
    Completed {
        task: String,
        state: String,
        error: Option<String>,
    },
}

/// Forwards events over an unbounded channel; the consumer drains it on
/// its own context.
pub struct ChannelObserver {
    tx: UnboundedSender<TaskEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: TaskEvent) {
        // receiver gone means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl TaskObserver for ChannelObserver {
    fn on_stage_changed(&self, task: &str, stage: &str) {
        self.send(TaskEvent::StageChanged {
            task: task.to_string(),
            stage: stage.to_string(),
        });
    }

    fn on_progress(&self, task: &str, progress: &TaskProgress) {
        self.send(TaskEvent::Progress {
            task: task.to_string(),
            progress: progress.clone(),
        });
    }

    fn on_complete(&self, task: &str, state: &TaskState) {
        self.send(completed_event(task, state));
    }
}

fn completed_event(task: &str, state: &TaskState) -> TaskEvent {
    TaskEvent::Completed {
        task: task.to_string(),
        state: state.label().to_string(),
        error: state.error().map(|e| e.to_string()),
    }
}

/// Emits `install-task` events on the Tauri event bus.
#[cfg(feature = "tauri-events")]
pub struct TauriObserver {
    app_handle: tauri::AppHandle,
}

#[cfg(feature = "tauri-events")]
impl TauriObserver {
    pub const EVENT: &'static str = "install-task";

    pub fn new(app_handle: tauri::AppHandle) -> Self {
        Self { app_handle }
    }

    fn emit(&self, event: TaskEvent) {
        use tauri::Emitter;
        let _ = self.app_handle.emit(Self::EVENT, event);
    }
}

#[cfg(feature = "tauri-events")]
impl TaskObserver for TauriObserver {
    fn on_stage_changed(&self, task: &str, stage: &str) {
        self.emit(TaskEvent::StageChanged {
            task: task.to_string(),
            stage: stage.to_string(),
        });
    }

    fn on_progress(&self, task: &str, progress: &TaskProgress) {
        self.emit(TaskEvent::Progress {
            task: task.to_string(),
            progress: progress.clone(),
        });
    }

    fn on_complete(&self, task: &str, state: &TaskState) {
        self.emit(completed_event(task, state));
    }
}
