//! Consecutive fetch failure counting per parachain.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::domain::{Parachain, ParachainId};
use crate::engine::FetchFailure;

#[derive(Debug, Clone)]
struct Streak {
    name: String,
    count: u32,
    last_error: String,
}

/// Counts consecutive failed fetches per parachain. Any success resets
/// the parachain's count.
#[derive(Debug, Default)]
pub struct FailureTracker {
    streaks: Mutex<BTreeMap<ParachainId, Streak>>,
}

impl FailureTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure and returns the new streak length.
    pub async fn record_failure(&self, parachain: &Parachain, error: &str) -> u32 {
        let mut streaks = self.streaks.lock().await;
        let streak = streaks.entry(parachain.id).or_insert_with(|| Streak {
            name: parachain.name.clone(),
            count: 0,
            last_error: String::new(),
        });
        streak.count = streak.count.saturating_add(1);
        streak.last_error = error.to_string();
        streak.count
    }

    /// Clears the parachain's streak.
    pub async fn record_success(&self, parachain_id: ParachainId) {
        self.streaks.lock().await.remove(&parachain_id);
    }

    /// Current streak length.
    pub async fn count(&self, parachain_id: ParachainId) -> u32 {
        self.streaks
            .lock()
            .await
            .get(&parachain_id)
            .map_or(0, |s| s.count)
    }

    /// Parachains whose streak is at least `threshold`, in id order.
    /// A threshold of zero disables the check.
    pub async fn at_or_above(&self, threshold: u32) -> Vec<FetchFailure> {
        if threshold == 0 {
            return Vec::new();
        }
        self.streaks
            .lock()
            .await
            .iter()
            .filter(|(_, s)| s.count >= threshold)
            .map(|(id, s)| FetchFailure {
                parachain_id: *id,
                parachain_name: s.name.clone(),
                consecutive: s.count,
                last_error: s.last_error.clone(),
            })
            .collect()
    }
}
