use crate::metrics::MetricsSink;
use crate::query::CorrelationStore;
use chrono::NaiveDateTime;
use std::time::Duration;

pub const EVICTED_STALE_QUERY: &str = "evicted_stale_query";
pub const EVICTED_OVERFLOW_QUERY: &str = "evicted_overflow_query";

/// Bounds for records that never become fully described: inserts, queries whose
/// memory line went to another log segment, and so on.
///
/// Ages are measured in log time, against the newest timestamp seen so far, so
/// replaying an old file evicts the same records as following it live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub max_age: Option<Duration>,
    pub max_records: Option<usize>,
    /// Lines between two sweeps.
    pub sweep_interval: u64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_age: Some(Duration::from_secs(3_600)),
            max_records: Some(100_000),
            sweep_interval: 1_000,
        }
    }
}

impl EvictionPolicy {
    pub fn disabled() -> Self {
        Self {
            max_age: None,
            max_records: None,
            sweep_interval: u64::MAX,
        }
    }

    /// Evict what the policy no longer allows. Returns the number of records removed.
    pub fn sweep(
        &self,
        store: &mut CorrelationStore,
        newest: Option<NaiveDateTime>,
        metrics: &dyn MetricsSink,
    ) -> usize {
        let mut evicted = 0;

        if let (Some(max_age), Some(newest)) = (self.max_age, newest) {
            let cutoff = chrono::Duration::from_std(max_age)
                .ok()
                .and_then(|age| newest.checked_sub_signed(age));

            if let Some(cutoff) = cutoff {
                for record in store.evict_older_than(cutoff) {
                    metrics.internal_error(EVICTED_STALE_QUERY);
                    tracing::debug!(id = %record.id, kind = %record.kind, "evicted stale query");
                    evicted += 1;
                }
            }
        }

        if let Some(max_records) = self.max_records {
            let overflow = store.evict_oldest_beyond(max_records);
            if !overflow.is_empty() {
                tracing::warn!(
                    count = overflow.len(),
                    max_records,
                    "too many open queries, evicting oldest"
                );
            }
            for _ in &overflow {
                metrics.internal_error(EVICTED_OVERFLOW_QUERY);
            }
            evicted += overflow.len();
        }

        evicted
    }
}
