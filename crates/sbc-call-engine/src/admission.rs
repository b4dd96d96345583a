//! Global/per-user/per-trunk concurrency admission control, per spec.md
//! §4.9 and §5. Grounded on the teacher's `call-engine::orchestrator::core`
//! active-call tracking shape (`DashMap` keyed by call identity, counters
//! updated under its own entry lock), adapted from a single active-calls
//! map to three independent counters since this system's caps are purely
//! numeric rather than full call records.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct AdmissionControl {
    global_max: usize,
    global_count: AtomicUsize,
    per_user_max: usize,
    per_user_count: DashMap<String, usize>,
    per_trunk_max: usize,
    per_trunk_count: DashMap<String, usize>,
}

impl AdmissionControl {
    pub fn new(global_max: usize, per_user_max: usize, per_trunk_max: usize) -> Self {
        AdmissionControl {
            global_max,
            global_count: AtomicUsize::new(0),
            per_user_max,
            per_user_count: DashMap::new(),
            per_trunk_max,
            per_trunk_count: DashMap::new(),
        }
    }

    /// Attempts to admit a new call. On success the global/user/trunk
    /// counters are all incremented together; on rejection none are.
    pub fn admit(&self, user_aor: Option<&str>, trunk_name: Option<&str>) -> Result<()> {
        if self.global_count.load(Ordering::SeqCst) >= self.global_max {
            return Err(Error::GlobalLimitReached);
        }
        if let Some(user) = user_aor {
            let count = self.per_user_count.get(user).map(|c| *c).unwrap_or(0);
            if count >= self.per_user_max {
                return Err(Error::UserLimitReached(user.to_string()));
            }
        }
        if let Some(trunk) = trunk_name {
            let count = self.per_trunk_count.get(trunk).map(|c| *c).unwrap_or(0);
            if count >= self.per_trunk_max {
                return Err(Error::TrunkLimitReached(trunk.to_string()));
            }
        }

        self.global_count.fetch_add(1, Ordering::SeqCst);
        if let Some(user) = user_aor {
            *self.per_user_count.entry(user.to_string()).or_insert(0) += 1;
        }
        if let Some(trunk) = trunk_name {
            *self.per_trunk_count.entry(trunk.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    pub fn release(&self, user_aor: Option<&str>, trunk_name: Option<&str>) {
        self.global_count.fetch_sub(1, Ordering::SeqCst);
        if let Some(user) = user_aor {
            if let Some(mut count) = self.per_user_count.get_mut(user) {
                *count = count.saturating_sub(1);
            }
        }
        if let Some(trunk) = trunk_name {
            if let Some(mut count) = self.per_trunk_count.get_mut(trunk) {
                *count = count.saturating_sub(1);
            }
        }
    }

    pub fn global_in_use(&self) -> usize {
        self.global_count.load(Ordering::SeqCst)
    }
}
