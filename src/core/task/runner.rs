use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::context::{TaskContext, TaskProgress};
use super::observer::TaskObserver;
use super::stage::TaskStage;
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone)]
pub enum TaskState {
    Waiting,
    Running,
    Completed,
    Failed(Arc<LauncherError>),
    Cancelled,
}

impl TaskState {
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Waiting => "waiting",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed(_) => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed(_) | TaskState::Cancelled
        )
    }

    pub fn error(&self) -> Option<&LauncherError> {
        match self {
            TaskState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// The body of an install task: walks its stages through the context.
#[async_trait]
pub trait TaskRoutine: Send + Sync + 'static {
    type Stage: TaskStage;

    fn name(&self) -> String;

    async fn run(&self, ctx: &TaskContext<Self::Stage>) -> LauncherResult<()>;

    /// Wrap a failure into this task's own error kind.
    fn wrap_error(&self, error: LauncherError) -> LauncherError {
        error
    }
}

/// Object-safe view of an install task, used by groups.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> TaskState;

    fn state(&self) -> TaskState;

    fn progress(&self) -> TaskProgress;

    fn cancel(&self);
}

pub struct InstallTask<R: TaskRoutine> {
    routine: R,
    ctx: TaskContext<R::Stage>,
    state: Mutex<TaskState>,
}

impl<R: TaskRoutine> InstallTask<R> {
    pub fn new(routine: R, observer: Arc<dyn TaskObserver>) -> Self {
        let ctx = TaskContext::new(routine.name(), observer);
        Self {
            routine,
            ctx,
            state: Mutex::new(TaskState::Waiting),
        }
    }

    pub fn routine(&self) -> &R {
        &self.routine
    }

    /// Run the routine to its end and return the terminal state. The
    /// observer's `on_complete` fires exactly once, whatever the outcome.
    ///
    /// Starting a task that already left `Waiting` returns its current state
    /// without running anything.
    pub async fn start(&self) -> TaskState {
        {
            let mut state = self.lock_state();
            if !matches!(*state, TaskState::Waiting) {
                warn!("[{}] start ignored: task is {}", self.ctx.name(), state.label());
                return state.clone();
            }
            *state = TaskState::Running;
        }
        info!("[{}] started", self.ctx.name());

        let result = match self.ctx.check_cancelled() {
            Ok(()) => self.routine.run(&self.ctx).await,
            Err(e) => Err(e),
        };

        let terminal = match result {
            Ok(()) => {
                self.ctx.finish();
                info!("[{}] completed", self.ctx.name());
                TaskState::Completed
            }
            Err(e) if e.is_cancelled() => {
                info!("[{}] cancelled", self.ctx.name());
                TaskState::Cancelled
            }
            Err(e) => {
                let wrapped = self.routine.wrap_error(e);
                error!("[{}] failed: {}", self.ctx.name(), wrapped);
                TaskState::Failed(Arc::new(wrapped))
            }
        };

        *self.lock_state() = terminal.clone();
        self.ctx.observer().on_complete(self.ctx.name(), &terminal);
        terminal
    }

    pub fn state(&self) -> TaskState {
        self.lock_state().clone()
    }

    pub fn progress(&self) -> TaskProgress {
        self.ctx.snapshot()
    }

    /// Cooperative: the routine stops at its next check.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<R: TaskRoutine> Task for InstallTask<R> {
    fn name(&self) -> &str {
        self.ctx.name()
    }

    async fn start(&self) -> TaskState {
        InstallTask::start(self).await
    }

    fn state(&self) -> TaskState {
        InstallTask::state(self)
    }

    fn progress(&self) -> TaskProgress {
        InstallTask::progress(self)
    }

    fn cancel(&self) {
        InstallTask::cancel(self)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Behaviour, Scripted};
    use super::*;
    use crate::core::task::observer::{ChannelObserver, NoopObserver, TaskEvent};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn successful_run_completes_at_full_progress() {
        let task = InstallTask::new(Scripted::new("ok", Behaviour::Succeed), Arc::new(NoopObserver));
        assert!(matches!(task.state(), TaskState::Waiting));

        let state = task.start().await;
        assert!(matches!(state, TaskState::Completed));
        assert_eq!(task.progress().overall, 1.0);
    }

    #[tokio::test]
    async fn failure_is_wrapped_and_reported_once() {
        let (observer, mut rx) = ChannelObserver::new();
        let task = InstallTask::new(Scripted::new("pack", Behaviour::Fail), Arc::new(observer));

        let state = task.start().await;
        let err = state.error().unwrap();
        assert_eq!(err.to_string(), "Modpack install failed: pack, pack broke");

        let mut completions = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, TaskEvent::Completed { .. }) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn cancellation_is_not_a_failure() {
        let task = InstallTask::new(
            Scripted::new("c", Behaviour::CancelSelf),
            Arc::new(NoopObserver),
        );
        assert!(matches!(task.start().await, TaskState::Cancelled));
    }

    #[tokio::test]
    async fn cancel_before_start_skips_the_routine() {
        let routine = Scripted::new("early", Behaviour::Succeed);
        let runs = routine.runs.clone();
        let task = InstallTask::new(routine, Arc::new(NoopObserver));
        task.cancel();

        assert!(matches!(task.start().await, TaskState::Cancelled));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_start_does_not_rerun() {
        let routine = Scripted::new("once", Behaviour::Succeed);
        let runs = routine.runs.clone();
        let task = InstallTask::new(routine, Arc::new(NoopObserver));

        task.start().await;
        assert!(matches!(task.start().await, TaskState::Completed));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
