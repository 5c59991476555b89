use std::fmt::Debug;

/// Ordered stage list of one task kind. `Ord` must follow execution order.
pub trait TaskStage: Copy + Ord + Debug + Send + Sync + 'static {
    /// Every stage, in execution order.
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    /// Share of the task's overall progress. Weights need not sum to 1.
    fn weight(self) -> f64;
}

/// Overall completion when `stage` is `fraction` done.
pub(crate) fn overall_progress<S: TaskStage>(stage: S, fraction: f64) -> f64 {
    let total: f64 = S::ALL.iter().map(|s| s.weight()).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let before: f64 = S::ALL
        .iter()
        .filter(|s| **s < stage)
        .map(|s| s.weight())
        .sum();
    ((before + stage.weight() * fraction) / total).clamp(0.0, 1.0)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TaskStage;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub enum Step {
        Fetch,
        Unpack,
        Finish,
    }

    impl TaskStage for Step {
        const ALL: &'static [Self] = &[Step::Fetch, Step::Unpack, Step::Finish];

        fn label(self) -> &'static str {
            match self {
                Step::Fetch => "fetch",
                Step::Unpack => "unpack",
                Step::Finish => "finish",
            }
        }

        fn weight(self) -> f64 {
            match self {
                Step::Fetch => 0.5,
                Step::Unpack => 0.5,
                Step::Finish => 0.0,
            }
        }
    }
}
