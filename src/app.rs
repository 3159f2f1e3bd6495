use crate::model::{BuildStatus, Job};
use std::collections::HashMap;
use std::time::Instant;

// Polling intervals (seconds)
pub const POLL_INTERVAL_ACTIVE: u64 = 3;
pub const POLL_INTERVAL_RECENT: u64 = 10;
pub const POLL_INTERVAL_IDLE: u64 = 30;
pub const POLL_RECENT_THRESHOLD_SECS: u64 = 60;

/// What a job looked like the last time it was polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub build_id: u64,
    pub status: String,
    pub last_seen: u64,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub build_id: u64,
    pub status: Option<BuildStatus>,
    pub message: String,
}

impl Notification {
    pub fn is_finished(&self) -> bool {
        self.status.is_some_and(BuildStatus::is_finished)
    }
}

pub struct WatchState {
    pub pipeline: String,

    pub jobs: Vec<Job>,
    pub previous_snapshot: HashMap<String, JobSnapshot>,
    pub poll_count: u64,

    // Polling
    pub poll_interval: u64,
    pub last_activity: Option<Instant>,

    pub notifications: Vec<Notification>,
    pub error: Option<String>,
    pub desktop_notify: bool,
}

impl WatchState {
    pub fn new(pipeline: String) -> Self {
        Self {
            pipeline,
            jobs: Vec::new(),
            previous_snapshot: HashMap::new(),
            poll_count: 0,
            poll_interval: POLL_INTERVAL_RECENT,
            last_activity: None,
            notifications: Vec::new(),
            error: None,
            desktop_notify: true,
        }
    }

    pub fn has_running_builds(&self) -> bool {
        self.jobs.iter().any(|job| {
            job.latest_build()
                .and_then(crate::model::Build::status)
                .is_some_and(BuildStatus::is_running)
        })
    }

    /// Fast while something runs, slower for a minute after activity, then idle.
    pub fn adaptive_interval(&self) -> u64 {
        if self.has_running_builds() {
            POLL_INTERVAL_ACTIVE
        } else if self
            .last_activity
            .is_some_and(|t| t.elapsed().as_secs() < POLL_RECENT_THRESHOLD_SECS)
        {
            POLL_INTERVAL_RECENT
        } else {
            POLL_INTERVAL_IDLE
        }
    }

    /// Record a successful poll. Returns the new interval when it changed.
    pub fn apply_poll(&mut self, jobs: Vec<Job>) -> Option<u64> {
        crate::diff::detect_changes(self, &jobs);
        self.jobs = jobs;
        self.error = None;
        if self.has_running_builds() || !self.notifications.is_empty() {
            self.last_activity = Some(Instant::now());
        }
        let interval = self.adaptive_interval();
        if interval == self.poll_interval {
            None
        } else {
            self.poll_interval = interval;
            Some(interval)
        }
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn set_error(&mut self, msg: String) {
        self.error = Some(msg);
    }

    /// Whether the last poll failed.
    pub fn is_failing(&self) -> bool {
        self.error.is_some()
    }
}
