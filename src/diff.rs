use crate::app::{JobSnapshot, Notification, WatchState};
use crate::model::{Build, BuildStatus, Job};

/// Maximum number of polls a job can be absent before being evicted from the snapshot.
const SNAPSHOT_EVICTION_POLLS: u64 = 10;

fn transition_message(job: &Job, build: &Build) -> String {
    let label = format!("{} #{}", job.name, build.name);
    match build.status() {
        Some(BuildStatus::Succeeded) => format!("{label} succeeded"),
        Some(BuildStatus::Failed) => format!("{label} failed"),
        Some(BuildStatus::Errored) => format!("{label} errored"),
        Some(BuildStatus::Aborted) => format!("{label} was aborted"),
        Some(BuildStatus::Started) => format!("{label} started"),
        Some(BuildStatus::Pending) => format!("{label} is pending"),
        Some(BuildStatus::Paused) => format!("{label} is paused"),
        None => format!("{label} changed to '{}'", build.status),
    }
}

/// Compare each job's latest build against the previous poll and queue a
/// notification for every job whose build or status moved. Jobs seen for
/// the first time only seed the snapshot.
pub fn detect_changes(state: &mut WatchState, new_jobs: &[Job]) {
    state.poll_count += 1;
    let current_poll = state.poll_count;

    for job in new_jobs {
        let Some(build) = job.latest_build() else {
            continue;
        };
        if let Some(old) = state.previous_snapshot.get(&job.name) {
            if old.build_id != build.id || old.status != build.status {
                state.notifications.push(Notification {
                    build_id: build.id,
                    status: build.status(),
                    message: transition_message(job, build),
                });
            }
        }
    }

    for job in new_jobs {
        if let Some(build) = job.latest_build() {
            state.previous_snapshot.insert(
                job.name.clone(),
                JobSnapshot {
                    build_id: build.id,
                    status: build.status.clone(),
                    last_seen: current_poll,
                },
            );
        }
    }

    state.previous_snapshot.retain(|_, snapshot| {
        current_poll.saturating_sub(snapshot.last_seen) <= SNAPSHOT_EVICTION_POLLS
    });
}
