use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use super::runner::{Task, TaskState};
use crate::core::error::LauncherError;

#[derive(Debug, Clone)]
pub enum GroupOutcome {
    Completed,
    Failed {
        key: String,
        error: Arc<LauncherError>,
    },
    Cancelled {
        key: String,
    },
}

type CompletionCallback = Box<dyn FnOnce(&GroupOutcome) + Send>;

/// Tasks keyed by name, run one after another in insertion order.
///
/// The completion callback fires once: after the last task completes or at
/// the first task that fails or is cancelled.
#[derive(Default)]
pub struct InstallTaskGroup {
    tasks: Vec<(String, Arc<dyn Task>)>,
    cancelled: AtomicBool,
    on_complete: Mutex<Option<CompletionCallback>>,
}

impl InstallTaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add under `key`. Reusing a key replaces the task but keeps its slot.
    pub fn insert(&mut self, key: impl Into<String>, task: Arc<dyn Task>) {
        let key = key.into();
        match self.tasks.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = task,
            None => self.tasks.push((key, task)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Task>> {
        self.tasks.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn on_complete(&self, callback: impl FnOnce(&GroupOutcome) + Send + 'static) {
        *self.lock_callback() = Some(Box::new(callback));
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        for (_, task) in &self.tasks {
            task.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mean overall progress of the members.
    pub fn progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.tasks.iter().map(|(_, t)| t.progress().overall).sum();
        sum / self.tasks.len() as f64
    }

    pub async fn run(&self) -> GroupOutcome {
        let mut outcome = GroupOutcome::Completed;

        for (key, task) in &self.tasks {
            if self.is_cancelled() {
                outcome = GroupOutcome::Cancelled { key: key.clone() };
                break;
            }
            info!("Running task '{}' ({})", key, task.name());
            match task.start().await {
                TaskState::Completed => continue,
                TaskState::Failed(error) => {
                    outcome = GroupOutcome::Failed {
                        key: key.clone(),
                        error,
                    };
                    break;
                }
                TaskState::Cancelled => {
                    outcome = GroupOutcome::Cancelled { key: key.clone() };
                    break;
                }
                other => {
                    warn!("Task '{}' returned while {}", key, other.label());
                    outcome = GroupOutcome::Failed {
                        key: key.clone(),
                        error: Arc::new(LauncherError::Other(format!(
                            "task '{}' did not finish",
                            key
                        ))),
                    };
                    break;
                }
            }
        }

        let callback = self.lock_callback().take();
        if let Some(callback) = callback {
            callback(&outcome);
        }
        outcome
    }

    fn lock_callback(&self) -> std::sync::MutexGuard<'_, Option<CompletionCallback>> {
        self.on_complete.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::observer::NoopObserver;
    use crate::core::task::runner::testing::{Behaviour, Scripted};
    use crate::core::task::runner::InstallTask;
    use std::sync::atomic::AtomicUsize;

    fn task(name: &'static str, behaviour: Behaviour) -> (Arc<dyn Task>, Arc<AtomicUsize>) {
        let routine = Scripted::new(name, behaviour);
        let runs = routine.runs.clone();
        (Arc::new(InstallTask::new(routine, Arc::new(NoopObserver))), runs)
    }

    #[tokio::test]
    async fn runs_in_insertion_order_and_stops_at_first_failure() {
        let mut group = InstallTaskGroup::new();
        let (game, game_runs) = task("game", Behaviour::Succeed);
        let (loader, _) = task("loader", Behaviour::Fail);
        let (mods, mods_runs) = task("mods", Behaviour::Succeed);
        group.insert("game", game);
        group.insert("loader", loader);
        group.insert("mods", mods);

        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        group.on_complete(move |outcome| {
            assert!(matches!(outcome, GroupOutcome::Failed { key, .. } if key == "loader"));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = group.run().await;
        assert!(matches!(outcome, GroupOutcome::Failed { .. }));
        assert_eq!(game_runs.load(Ordering::SeqCst), 1);
        assert_eq!(mods_runs.load(Ordering::SeqCst), 0);

        group.run().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replacing_a_key_keeps_its_position() {
        let mut group = InstallTaskGroup::new();
        group.insert("a", task("a1", Behaviour::Succeed).0);
        group.insert("b", task("b", Behaviour::Succeed).0);
        group.insert("a", task("a2", Behaviour::Succeed).0);

        assert_eq!(group.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(group.get("a").unwrap().name(), "a2");
    }

    #[tokio::test]
    async fn cancelled_group_runs_nothing() {
        let mut group = InstallTaskGroup::new();
        let (only, runs) = task("only", Behaviour::Succeed);
        group.insert("only", only);
        group.cancel();

        assert!(matches!(group.run().await, GroupOutcome::Cancelled { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn progress_is_the_mean_of_members() {
        let mut group = InstallTaskGroup::new();
        group.insert("done", task("done", Behaviour::Succeed).0);
        group.insert("idle", task("idle", Behaviour::Succeed).0);
        group.get("done").unwrap().start().await;
        assert_eq!(group.progress(), 0.5);
    }
}
