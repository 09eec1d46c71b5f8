//! Per-team job priority.
//!
//! Teams with few jobs in flight get the base priority. Past the bucket
//! limit, each further job is pushed back (a larger number runs later).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct JobPriorityTracker {
    base_priority: u32,
    bucket_limit: usize,
    in_flight: Mutex<HashMap<String, usize>>,
}

impl JobPriorityTracker {
    pub fn new(base_priority: u32, bucket_limit: usize) -> Self {
        Self {
            base_priority,
            bucket_limit,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new job for `team_id`.
    ///
    /// The returned slot carries the job's priority and releases the
    /// registration when dropped.
    pub fn acquire(self: &Arc<Self>, team_id: &str) -> PrioritySlot {
        let count = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let count = in_flight.entry(team_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        PrioritySlot {
            tracker: Arc::clone(self),
            team_id: team_id.to_string(),
            priority: self.priority_for(count),
        }
    }

    fn release(&self, team_id: &str) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(count) = in_flight.get_mut(team_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                in_flight.remove(team_id);
            }
        }
    }

    /// Jobs currently registered for `team_id`.
    pub fn in_flight(&self, team_id: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(team_id)
            .copied()
            .unwrap_or(0)
    }

    fn priority_for(&self, count: usize) -> u32 {
        if count <= self.bucket_limit {
            return self.base_priority;
        }
        let overflow = (count - self.bucket_limit) as f64;
        self.base_priority + (overflow * 0.5).ceil() as u32
    }
}

/// A job registered with a [`JobPriorityTracker`].
#[derive(Debug)]
pub struct PrioritySlot {
    tracker: Arc<JobPriorityTracker>,
    team_id: String,
    priority: u32,
}

impl PrioritySlot {
    pub fn priority(&self) -> u32 {
        self.priority
    }
}

impl Drop for PrioritySlot {
    fn drop(&mut self) {
        self.tracker.release(&self.team_id);
    }
}

impl Default for JobPriorityTracker {
    fn default() -> Self {
        Self::new(10, 25)
    }
}
