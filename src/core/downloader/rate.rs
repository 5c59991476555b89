use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Rolling transfer-rate accumulator fed by every socket read.
pub struct TransferRate {
    window: Duration,
    samples: Mutex<VecDeque<(Instant, u64)>>,
}

impl Default for TransferRate {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl TransferRate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, bytes: usize) {
        self.record_at(Instant::now(), bytes as u64);
    }

    /// Bytes per second over the last window.
    pub fn bytes_per_second(&self) -> u64 {
        self.rate_at(Instant::now())
    }

    fn record_at(&self, at: Instant, bytes: u64) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.push_back((at, bytes));
        prune(&mut samples, at, self.window);
    }

    fn rate_at(&self, now: Instant) -> u64 {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        prune(&mut samples, now, self.window);
        let total: u64 = samples.iter().map(|(_, b)| b).sum();
        let secs = self.window.as_secs_f64();
        (total as f64 / secs) as u64
    }
}

fn prune(samples: &mut VecDeque<(Instant, u64)>, now: Instant, window: Duration) {
    while let Some((at, _)) = samples.front() {
        if now.saturating_duration_since(*at) > window {
            samples.pop_front();
        } else {
            break;
        }
    }
}
