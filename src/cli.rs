use clap::{Parser, Subcommand};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

pub const DEFAULT_TEAM: &str = "main";

#[derive(Parser, Debug)]
#[command(name = "ffly", version = VERSION, about = "Concourse CI command-line client")]
pub struct Cli {
    /// Saved target to use (see `ffly targets`)
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Concourse URL, for logging in or for anonymous access to public pipelines
    #[arg(short, long, global = true, value_parser = parse_api_url)]
    pub api: Option<String>,

    /// Team to log in to, or to browse anonymously [default: the saved
    /// target's team, else main]
    #[arg(long, global = true)]
    pub team: Option<String>,

    /// Accept self-signed or otherwise invalid TLS certificates
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// Enable verbose logging to $XDG_STATE_HOME/ffly/debug.log
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List saved targets
    Targets,

    /// Authenticate with a team and save the result as a target
    Login {
        /// Basic auth username
        #[arg(short, long, requires = "password")]
        username: Option<String>,

        /// Basic auth password
        #[arg(short, long, requires = "username")]
        password: Option<String>,

        /// Bearer token obtained elsewhere
        #[arg(long, conflicts_with_all = ["username", "password", "oauth"])]
        token: Option<String>,

        /// Print the GitHub/UAA login URL and read the resulting token from stdin
        #[arg(long, conflicts_with_all = ["username", "password"])]
        oauth: bool,
    },

    /// Forget a saved target
    Logout,

    /// Show the server version
    Info,

    /// List teams
    Teams,

    /// List the login methods a team offers
    AuthMethods,

    /// List pipelines
    Pipelines {
        /// List every public pipeline on the server, grouped by team
        #[arg(long)]
        public: bool,
    },

    /// List a pipeline's jobs with their latest build
    Jobs { pipeline: String },

    /// List recent builds
    Builds {
        /// Only builds of this pipeline's job (requires --job)
        #[arg(long, requires = "job")]
        pipeline: Option<String>,

        /// Only builds of this job (requires --pipeline)
        #[arg(long, requires = "pipeline")]
        job: Option<String>,

        /// Maximum number of builds to display
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Start a new build of a job
    Trigger {
        pipeline: String,
        job: String,

        /// Stream the new build's log until it finishes
        #[arg(short, long)]
        follow: bool,
    },

    /// Stream a build's log
    Logs { build_id: u64 },

    /// Poll a pipeline and report build status changes
    Watch {
        pipeline: String,

        /// Disable desktop notifications
        #[arg(long)]
        no_notify: bool,
    },
}

impl Cli {
    /// `--team` when given, else the saved target's team, else `main`.
    pub fn resolve_team(&self, saved: Option<&str>) -> String {
        self.team
            .as_deref()
            .or(saved)
            .unwrap_or(DEFAULT_TEAM)
            .to_string()
    }
}

/// Accepts an http(s) URL with a host and strips trailing slashes.
pub fn parse_api_url(input: &str) -> Result<String, String> {
    let trimmed = input.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| format!("Invalid URL '{input}'. Expected http(s)://host[:port]."))?;
    if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
        return Err(format!(
            "Invalid URL '{input}'. Expected http(s)://host[:port]."
        ));
    }
    Ok(trimmed.to_string())
}
