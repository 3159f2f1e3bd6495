//! Background job polling for `watch`.
//!
//! The interval comes in through a `watch::Receiver<u64>` written by the
//! watch loop as pipeline activity changes, so the poller never has to be
//! restarted. Consecutive failures back off exponentially up to
//! `MAX_BACKOFF_SECS`; the next success resets to the base interval.

use super::api::ConcourseApi;
use super::service;
use crate::events::AppEvent;
use crate::model::Target;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time;

const MAX_BACKOFF_SECS: u64 = 300;

/// `min(base_interval * 2^failures, MAX_BACKOFF_SECS)`, never below one second.
pub fn backoff_delay(base_interval: u64, failures: u32) -> u64 {
    let multiplier = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
    base_interval
        .saturating_mul(multiplier)
        .clamp(1, MAX_BACKOFF_SECS)
}

pub struct Poller {
    api: Arc<dyn ConcourseApi>,
    target: Target,
    pipeline: String,
    tx: mpsc::UnboundedSender<AppEvent>,
    interval_rx: watch::Receiver<u64>,
}

enum PollOutcome {
    Success,
    Failure,
    ChannelClosed,
}

impl Poller {
    pub fn new(
        api: Arc<dyn ConcourseApi>,
        target: Target,
        pipeline: String,
        tx: mpsc::UnboundedSender<AppEvent>,
        interval_rx: watch::Receiver<u64>,
    ) -> Self {
        Self {
            api,
            target,
            pipeline,
            tx,
            interval_rx,
        }
    }

    pub async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            match self.poll_once(&mut failures).await {
                PollOutcome::Success | PollOutcome::Failure => {}
                PollOutcome::ChannelClosed => return,
            }

            let base_interval = *self.interval_rx.borrow();
            let delay = if failures > 0 {
                backoff_delay(base_interval, failures)
            } else {
                base_interval
            };
            // wake early when the interval changes
            tokio::select! {
                () = time::sleep(time::Duration::from_secs(delay)) => {},
                _ = self.interval_rx.changed() => {},
            }
        }
    }

    /// One fetch, reported as exactly one event. A failure carries the delay
    /// before the next attempt.
    async fn poll_once(&self, failures: &mut u32) -> PollOutcome {
        let (event, outcome) =
            match service::fetch_visible_jobs(self.api.as_ref(), &self.target, &self.pipeline)
                .await
            {
                Ok(jobs) => {
                    *failures = 0;
                    (AppEvent::PollResult(jobs), PollOutcome::Success)
                }
                Err(e) => {
                    *failures = failures.saturating_add(1);
                    let retry_in = backoff_delay(*self.interval_rx.borrow(), *failures);
                    tracing::debug!(failures = *failures, retry_in, "poll failed: {e}");
                    (
                        AppEvent::Error(format!("{e} (retrying in {retry_in}s)")),
                        PollOutcome::Failure,
                    )
                }
            };
        if self.tx.send(event).is_err() {
            tracing::warn!("poller: channel closed");
            return PollOutcome::ChannelClosed;
        }
        outcome
    }
}
