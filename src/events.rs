use crate::model::Job;

/// Messages from background tasks to the watch loop.
#[derive(Debug)]
pub enum AppEvent {
    PollResult(Vec<Job>),
    Error(String),
}
