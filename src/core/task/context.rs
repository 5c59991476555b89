use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use super::observer::TaskObserver;
use super::stage::{overall_progress, TaskStage};
use crate::core::downloader::DownloadMonitor;
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskProgress {
    pub stage: Option<String>,
    /// Completion of the current stage, reset to 0 on every transition.
    pub stage_progress: f64,
    /// Weighted completion across all stages.
    pub overall: f64,
    pub total_files: usize,
    pub remaining_files: usize,
}

struct Inner<S> {
    stage: Option<S>,
    progress: TaskProgress,
}

/// Handle a routine uses to report stages and progress and to poll for
/// cancellation.
pub struct TaskContext<S: TaskStage> {
    name: String,
    inner: Mutex<Inner<S>>,
    cancelled: AtomicBool,
    observer: Arc<dyn TaskObserver>,
}

impl<S: TaskStage> TaskContext<S> {
    pub fn new(name: impl Into<String>, observer: Arc<dyn TaskObserver>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                stage: None,
                progress: TaskProgress::default(),
            }),
            cancelled: AtomicBool::new(false),
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> Option<S> {
        self.lock().stage
    }

    pub fn snapshot(&self) -> TaskProgress {
        self.lock().progress.clone()
    }

    /// Move to `stage`. Stages only move forward; progress restarts at 0.
    pub fn enter_stage(&self, stage: S) -> LauncherResult<()> {
        self.check_cancelled()?;
        let progress = {
            let mut inner = self.lock();
            if let Some(current) = inner.stage {
                if stage <= current {
                    return Err(LauncherError::StageRegression {
                        from: current.label().to_string(),
                        to: stage.label().to_string(),
                    });
                }
            }
            inner.stage = Some(stage);
            inner.progress = TaskProgress {
                stage: Some(stage.label().to_string()),
                stage_progress: 0.0,
                overall: overall_progress(stage, 0.0),
                total_files: 0,
                remaining_files: 0,
            };
            inner.progress.clone()
        };

        info!("[{}] stage: {}", self.name, stage.label());
        self.observer.on_stage_changed(&self.name, stage.label());
        self.observer.on_progress(&self.name, &progress);
        Ok(())
    }

    /// Report progress of the current stage. Values are clamped to `[0, 1]`
    /// and anything below the last reported value is ignored.
    pub fn set_stage_progress(&self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let published = {
            let mut inner = self.lock();
            let Some(stage) = inner.stage else {
                return;
            };
            if fraction <= inner.progress.stage_progress {
                return;
            }
            inner.progress.stage_progress = fraction;
            inner.progress.overall = overall_progress(stage, fraction);
            inner.progress.clone()
        };
        self.observer.on_progress(&self.name, &published);
    }

    pub fn set_files(&self, total: usize) {
        let mut inner = self.lock();
        inner.progress.total_files = total;
        inner.progress.remaining_files = total;
    }

    /// One file of the current stage is done; stage progress follows the
    /// file count.
    pub fn file_completed(&self) {
        let fraction = {
            let mut inner = self.lock();
            let progress = &mut inner.progress;
            progress.remaining_files = progress.remaining_files.saturating_sub(1);
            if progress.total_files == 0 {
                return;
            }
            (progress.total_files - progress.remaining_files) as f64 / progress.total_files as f64
        };
        self.set_stage_progress(fraction);
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("[{}] cancellation requested", self.name);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check_cancelled(&self) -> LauncherResult<()> {
        if self.is_cancelled() {
            Err(LauncherError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(super) fn finish(&self) {
        let progress = {
            let mut inner = self.lock();
            inner.progress.stage_progress = 1.0;
            inner.progress.overall = 1.0;
            inner.progress.remaining_files = 0;
            inner.progress.clone()
        };
        self.observer.on_progress(&self.name, &progress);
    }

    pub(super) fn observer(&self) -> &dyn TaskObserver {
        self.observer.as_ref()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: TaskStage> DownloadMonitor for TaskContext<S> {
    fn on_progress(&self, fraction: f64) {
        self.set_stage_progress(fraction);
    }

    fn is_cancelled(&self) -> bool {
        TaskContext::is_cancelled(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::observer::{ChannelObserver, NoopObserver, TaskEvent};
    use crate::core::task::stage::testing::Step;

    fn context() -> TaskContext<Step> {
        TaskContext::new("test", Arc::new(NoopObserver))
    }

    #[test]
    fn stages_only_move_forward() {
        let ctx = context();
        ctx.enter_stage(Step::Fetch).unwrap();
        ctx.enter_stage(Step::Unpack).unwrap();
        let err = ctx.enter_stage(Step::Fetch).unwrap_err();
        assert!(matches!(err, LauncherError::StageRegression { .. }));
        assert!(ctx.enter_stage(Step::Unpack).is_err());
        assert_eq!(ctx.stage(), Some(Step::Unpack));
    }

    #[test]
    fn progress_resets_on_transition_and_never_decreases() {
        let ctx = context();
        ctx.enter_stage(Step::Fetch).unwrap();
        ctx.set_stage_progress(0.6);
        ctx.set_stage_progress(0.4);
        assert_eq!(ctx.snapshot().stage_progress, 0.6);
        ctx.set_stage_progress(7.0);
        assert_eq!(ctx.snapshot().stage_progress, 1.0);

        ctx.enter_stage(Step::Unpack).unwrap();
        let progress = ctx.snapshot();
        assert_eq!(progress.stage_progress, 0.0);
        assert_eq!(progress.overall, 0.5);
        assert_eq!(progress.stage.as_deref(), Some("unpack"));
    }

    #[test]
    fn file_counts_drive_stage_progress() {
        let ctx = context();
        ctx.enter_stage(Step::Fetch).unwrap();
        ctx.set_files(4);
        ctx.file_completed();
        let progress = ctx.snapshot();
        assert_eq!(progress.remaining_files, 3);
        assert_eq!(progress.stage_progress, 0.25);
    }

    #[test]
    fn cancelled_context_refuses_new_stages() {
        let ctx = context();
        ctx.cancel();
        assert!(ctx.enter_stage(Step::Fetch).unwrap_err().is_cancelled());
        assert!(DownloadMonitor::is_cancelled(&ctx));
    }

    #[test]
    fn observer_sees_stage_then_progress() {
        let (observer, mut rx) = ChannelObserver::new();
        let ctx: TaskContext<Step> = TaskContext::new("obs", Arc::new(observer));
        ctx.enter_stage(Step::Fetch).unwrap();
        ctx.on_progress(0.5);

        assert_eq!(
            rx.try_recv().unwrap(),
            TaskEvent::StageChanged {
                task: "obs".into(),
                stage: "fetch".into()
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), TaskEvent::Progress { .. }));
        match rx.try_recv().unwrap() {
            TaskEvent::Progress { progress, .. } => assert_eq!(progress.stage_progress, 0.5),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
