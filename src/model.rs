//! Concourse domain records.
//!
//! These are the typed shapes the deserializers in [`crate::concourse::parser`]
//! produce. Server responses are loosely typed, so every field here has already
//! passed a presence and type check by the time one of these exists.

use std::fmt;

/// Server metadata from `/api/v1/info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Token {
    pub value: String,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Value for an `Authorization` header. Tokens handed out by newer
    /// servers already carry the scheme.
    pub fn auth_value(&self) -> String {
        if self.value.starts_with("Bearer ") {
            self.value.clone()
        } else {
            format!("Bearer {}", self.value)
        }
    }
}

/// One logged-in session: where the server lives, which team, which token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub api: String,
    pub team: String,
    pub token: Token,
    /// Accept self-signed or otherwise invalid TLS certificates.
    pub insecure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthKind {
    Basic,
    GitHub,
    Uaa,
}

impl AuthKind {
    pub const BASIC_DISPLAY_NAME: &'static str = "Basic Auth";
    pub const GITHUB_DISPLAY_NAME: &'static str = "GitHub";
    pub const UAA_DISPLAY_NAME: &'static str = "UAA";

    /// Maps the `(type, display_name)` pair the server reports.
    pub fn from_wire(kind: &str, display_name: &str) -> Option<Self> {
        match (kind, display_name) {
            ("basic", Self::BASIC_DISPLAY_NAME) => Some(Self::Basic),
            ("oauth", Self::GITHUB_DISPLAY_NAME) => Some(Self::GitHub),
            ("oauth", Self::UAA_DISPLAY_NAME) => Some(Self::Uaa),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMethod {
    pub kind: AuthKind,
    pub display_name: String,
    pub auth_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub name: String,
    pub public: bool,
    pub team_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    Pending,
    Started,
    Succeeded,
    Failed,
    Errored,
    Aborted,
    Paused,
}

impl BuildStatus {
    /// Lenient status lookup: surrounding whitespace and case are ignored.
    pub fn interpret(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "started" => Some(Self::Started),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "errored" => Some(Self::Errored),
            "aborted" => Some(Self::Aborted),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Pending | Self::Started)
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Errored | Self::Aborted
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Aborted => "aborted",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub id: u64,
    pub name: String,
    pub team_name: String,
    pub job_name: String,
    /// Raw status string as reported; see [`Build::status`].
    pub status: String,
    pub pipeline_name: String,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
}

impl Build {
    pub fn status(&self) -> Option<BuildStatus> {
        BuildStatus::interpret(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    pub next_build: Option<Build>,
    pub finished_build: Option<Build>,
    pub groups: Vec<String>,
}

impl Job {
    /// The in-flight build if there is one, else the last finished one.
    pub fn latest_build(&self) -> Option<&Build> {
        self.next_build.as_ref().or(self.finished_build.as_ref())
    }
}

/// A single line of build output carried by a `log` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobGroup {
    pub name: String,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineGroup {
    pub team_name: String,
    pub pipelines: Vec<Pipeline>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_value_adds_bearer_prefix() {
        assert_eq!(Token::new("abc").auth_value(), "Bearer abc");
    }

    #[test]
    fn auth_value_keeps_existing_prefix() {
        assert_eq!(Token::new("Bearer abc").auth_value(), "Bearer abc");
    }

    #[test]
    fn interpret_all_statuses() {
        let cases = [
            ("pending", BuildStatus::Pending),
            ("started", BuildStatus::Started),
            ("succeeded", BuildStatus::Succeeded),
            ("failed", BuildStatus::Failed),
            ("errored", BuildStatus::Errored),
            ("aborted", BuildStatus::Aborted),
            ("paused", BuildStatus::Paused),
        ];
        for (s, expected) in &cases {
            assert_eq!(BuildStatus::interpret(s), Some(*expected), "status: {s}");
            let upper = s.to_uppercase();
            assert_eq!(BuildStatus::interpret(&upper), Some(*expected));
            let padded = format!("  {s} ");
            assert_eq!(BuildStatus::interpret(&padded), Some(*expected));
        }
    }

    #[test]
    fn interpret_unknown_status() {
        assert_eq!(BuildStatus::interpret("turtle"), None);
        assert_eq!(BuildStatus::interpret(""), None);
    }

    #[test]
    fn display_round_trips_through_interpret() {
        let status = BuildStatus::Errored;
        assert_eq!(BuildStatus::interpret(&status.to_string()), Some(status));
    }

    #[test]
    fn running_and_finished_are_disjoint() {
        assert!(BuildStatus::Started.is_running());
        assert!(!BuildStatus::Started.is_finished());
        assert!(BuildStatus::Failed.is_finished());
        assert!(!BuildStatus::Paused.is_running());
        assert!(!BuildStatus::Paused.is_finished());
    }

    #[test]
    fn auth_kind_requires_matching_display_name() {
        assert_eq!(AuthKind::from_wire("basic", "Basic Auth"), Some(AuthKind::Basic));
        assert_eq!(AuthKind::from_wire("oauth", "GitHub"), Some(AuthKind::GitHub));
        assert_eq!(AuthKind::from_wire("oauth", "UAA"), Some(AuthKind::Uaa));
        assert_eq!(AuthKind::from_wire("basic", "GitHub"), None);
        assert_eq!(AuthKind::from_wire("oauth", "Gitlab"), None);
    }

    #[test]
    fn latest_build_prefers_next_build() {
        let build = |id: u64, status: &str| Build {
            id,
            name: id.to_string(),
            team_name: "main".to_string(),
            job_name: "unit".to_string(),
            status: status.to_string(),
            pipeline_name: "ci".to_string(),
            start_time: None,
            end_time: None,
        };
        let mut job = Job {
            name: "unit".to_string(),
            next_build: Some(build(2, "started")),
            finished_build: Some(build(1, "succeeded")),
            groups: vec![],
        };
        assert_eq!(job.latest_build().map(|b| b.id), Some(2));
        job.next_build = None;
        assert_eq!(job.latest_build().map(|b| b.id), Some(1));
    }
}
