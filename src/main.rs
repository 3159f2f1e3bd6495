use ffly::app::WatchState;
use ffly::cli::{Cli, Command};
use ffly::concourse::poller::Poller;
use ffly::concourse::{service, ConcourseApi, HttpClient, SseConnection};
use ffly::config::{self, Config};
use ffly::elapsed::format_elapsed_now;
use ffly::error::ApiError;
use ffly::events::AppEvent;
use ffly::grouping;
use ffly::model::{AuthKind, Build, Target, Token};
use ffly::styling::StylingStripper;

use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

fn setup_verbose_logging() -> Result<()> {
    let state_dir = state_dir_or_fallback();
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ffly=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .init();
    tracing::info!(
        "ffly v{} starting with verbose logging",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

fn state_dir_or_fallback() -> PathBuf {
    if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
        PathBuf::from(state).join("ffly")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local").join("state").join("ffly")
    } else {
        PathBuf::from("/tmp/ffly")
    }
}

fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                match join_err.into_panic().downcast::<String>() {
                    Ok(s) => *s,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(s) => s.to_string(),
                        Err(_) => "unknown panic".to_string(),
                    },
                }
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

/// Adds a login hint to 401s.
fn explain(err: ApiError, target: &Target) -> Report {
    if err.is_unauthorized() && !target.name.is_empty() {
        eyre!("{err}. Log in again with `ffly -t {} login`.", target.name)
    } else {
        Report::new(err)
    }
}

/// Picks the target a command runs against: `--target`, else anonymous
/// access through `--api`, else the only saved target.
fn resolve_target(args: &Cli, config: &Config) -> Result<Target> {
    let mut target = if let Some(name) = &args.target {
        config.target(name).ok_or_else(|| {
            eyre!("Unknown target '{name}'. Run `ffly targets` to list saved targets.")
        })?
    } else if let Some(api) = &args.api {
        Target {
            name: String::new(),
            api: api.clone(),
            team: String::new(),
            token: Token::new(""),
            insecure: args.insecure,
        }
    } else {
        let mut targets = config.targets();
        if targets.len() != 1 {
            return Err(eyre!("No target selected. Pass --target NAME or --api URL."));
        }
        targets.remove(0)
    };
    let saved = (!target.team.is_empty()).then_some(target.team.as_str());
    target.team = args.resolve_team(saved);
    Ok(target)
}

fn build_line(build: &Build) -> String {
    format!(
        "{:>8}  {}/{} #{}  {}  {}",
        build.id,
        build.pipeline_name,
        build.job_name,
        build.name,
        build.status,
        format_elapsed_now(build.end_time.or(build.start_time)),
    )
}

async fn read_line(prompt: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

async fn stream_logs(client: &HttpClient, target: &Target, build_id: u64) -> Result<()> {
    let mut connection = SseConnection::open(client, target, build_id)
        .await
        .map_err(|e| explain(e, target))?;
    tracing::info!("streaming {}", connection.url());

    let mut stripper = StylingStripper::new();
    let mut stdout = tokio::io::stdout();
    while let Some(batch) = connection.next_batch().await {
        for event in batch.map_err(|e| explain(e, target))? {
            stdout
                .write_all(stripper.strip(&event.payload).as_bytes())
                .await?;
        }
        stdout.flush().await?;
    }
    stdout.write_all(stripper.finish().as_bytes()).await?;
    stdout.flush().await?;
    tracing::debug!(last_event_id = ?connection.last_event_id(), "log stream finished");
    Ok(())
}

async fn login(
    args: &Cli,
    config_path: &std::path::Path,
    config: &mut Config,
    username: Option<&str>,
    password: Option<&str>,
    token: Option<&str>,
    oauth: bool,
) -> Result<()> {
    let name = args
        .target
        .as_deref()
        .ok_or_else(|| eyre!("Name the target to save with --target NAME."))?;
    let existing = config.target(name);
    let api = args
        .api
        .clone()
        .or_else(|| existing.as_ref().map(|t| t.api.clone()))
        .ok_or_else(|| eyre!("Pass the Concourse URL with --api URL."))?;
    let insecure = args.insecure || existing.as_ref().is_some_and(|t| t.insecure);
    let team = args.resolve_team(existing.as_ref().map(|t| t.team.as_str()));

    let client = HttpClient::new(insecure)?;
    let info = service::fetch_info(&client, &api).await?;
    tracing::info!("Concourse {} at {api}", info.version);

    let token = match (username, password, token) {
        (Some(user), Some(pass), _) => service::login_basic(&client, &api, &team, user, pass).await?,
        (_, _, Some(raw)) => service::login_token(&client, &api, raw).await?,
        _ if oauth => {
            let methods = service::fetch_auth_methods(&client, &api, &team).await?;
            let method = methods
                .iter()
                .find(|m| matches!(m.kind, AuthKind::GitHub | AuthKind::Uaa))
                .ok_or_else(|| eyre!("Team '{team}' offers no OAuth login."))?;
            println!("Log in with {} at:\n\n  {}\n", method.display_name, method.auth_url);
            let raw = read_line("Paste the token shown after logging in: ").await?;
            service::login_token(&client, &api, &raw).await?
        }
        _ => service::login_unauthenticated(&client, &api, &team).await?,
    };

    let target = Target {
        name: name.to_string(),
        api,
        team,
        token,
        insecure,
    };
    config.upsert(&target);
    config.save(config_path)?;
    println!(
        "Logged in to team '{}' at {} (Concourse {}), saved as '{}'.",
        target.team, target.api, info.version, target.name
    );
    Ok(())
}

async fn watch_pipeline(target: Target, pipeline: String, no_notify: bool) -> Result<()> {
    let api: Arc<dyn ConcourseApi> = Arc::new(HttpClient::for_target(&target)?);
    let mut state = WatchState::new(pipeline.clone());
    state.desktop_notify = !no_notify;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (interval_tx, interval_rx) = watch::channel(state.poll_interval);

    let poller = Poller::new(api, target.clone(), pipeline.clone(), tx.clone(), interval_rx);
    spawn_monitored(tx, "poller", poller.run());

    println!("Watching {}/{} (Ctrl-C to stop)", target.team, pipeline);
    while let Some(event) = rx.recv().await {
        match event {
            AppEvent::PollResult(jobs) => {
                if state.is_failing() {
                    println!(
                        "[{}] polling recovered",
                        chrono::Local::now().format("%H:%M:%S")
                    );
                }
                let first = state.poll_count == 0;
                if let Some(interval) = state.apply_poll(jobs) {
                    tracing::debug!("poll interval now {interval}s");
                    if interval_tx.send(interval).is_err() {
                        tracing::warn!("interval: poller channel closed");
                    }
                }
                if first {
                    for job in &state.jobs {
                        let status = job.latest_build().map_or("no builds", |b| b.status.as_str());
                        println!("  {:<30} {status}", job.name);
                    }
                }
                for notification in state.take_notifications() {
                    println!(
                        "[{}] {}",
                        chrono::Local::now().format("%H:%M:%S"),
                        notification.message
                    );
                    #[cfg(feature = "desktop-notify")]
                    if state.desktop_notify && notification.is_finished() {
                        ffly::notify::send_desktop(&state.pipeline, &notification);
                    }
                }
            }
            AppEvent::Error(msg) => {
                eprintln!("warning: {msg}");
                state.set_error(msg);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    if args.verbose {
        setup_verbose_logging()?;
    }

    let config_path = config::config_path()?;
    let mut config = Config::load(&config_path)?;

    match &args.command {
        Command::Targets => {
            if config.is_empty() {
                println!("No saved targets. Add one with `ffly -t NAME --api URL login`.");
            }
            for target in config.targets() {
                let insecure = if target.insecure { "  (insecure)" } else { "" };
                println!("{:<16} {}  team {}{insecure}", target.name, target.api, target.team);
            }
        }
        Command::Login {
            username,
            password,
            token,
            oauth,
        } => {
            login(
                &args,
                &config_path,
                &mut config,
                username.as_deref(),
                password.as_deref(),
                token.as_deref(),
                *oauth,
            )
            .await?;
        }
        Command::Logout => {
            let name = args
                .target
                .as_deref()
                .ok_or_else(|| eyre!("Name the target to forget with --target NAME."))?;
            if !config.remove(name) {
                return Err(eyre!("Unknown target '{name}'."));
            }
            config.save(&config_path)?;
            println!("Forgot target '{name}'.");
        }
        Command::Info => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            let info = service::fetch_info(&client, &target.api).await?;
            println!("{}  Concourse {}", target.api, info.version);
        }
        Command::Teams => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            for team in service::fetch_teams(&client, &target.api).await? {
                println!("{team}");
            }
        }
        Command::AuthMethods => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            for method in service::fetch_auth_methods(&client, &target.api, &target.team).await? {
                println!("{:<12} {}", method.display_name, method.auth_url);
            }
        }
        Command::Pipelines { public } => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            if *public {
                let pipelines = service::fetch_public_pipelines(&client, &target.api).await?;
                for group in grouping::group_public_pipelines(pipelines) {
                    println!("{}", group.team_name);
                    for pipeline in group.pipelines {
                        println!("  {}", pipeline.name);
                    }
                }
            } else {
                let pipelines = service::fetch_pipelines(&client, &target)
                    .await
                    .map_err(|e| explain(e, &target))?;
                for pipeline in pipelines {
                    let marker = if pipeline.public { "  (public)" } else { "" };
                    println!("{}{marker}", pipeline.name);
                }
            }
        }
        Command::Jobs { pipeline } => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            let jobs = service::fetch_visible_jobs(&client, &target, pipeline)
                .await
                .map_err(|e| explain(e, &target))?;
            for group in grouping::group_jobs(jobs) {
                println!("{}", group.name);
                for job in group.jobs {
                    match job.latest_build() {
                        Some(build) => println!(
                            "  {:<30} #{:<6} {:<10} {}",
                            job.name,
                            build.name,
                            build.status,
                            format_elapsed_now(build.end_time.or(build.start_time)),
                        ),
                        None => println!("  {:<30} no builds", job.name),
                    }
                }
            }
        }
        Command::Builds {
            pipeline,
            job,
            limit,
        } => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            let builds = match (pipeline, job) {
                (Some(pipeline), Some(job)) => {
                    service::fetch_job_builds(&client, &target, pipeline, job).await
                }
                _ => service::fetch_builds(&client, &target).await,
            }
            .map_err(|e| explain(e, &target))?;
            for build in builds.iter().take(*limit) {
                println!("{}", build_line(build));
            }
        }
        Command::Trigger {
            pipeline,
            job,
            follow,
        } => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            let build = service::trigger_build(&client, &target, pipeline, job)
                .await
                .map_err(|e| explain(e, &target))?;
            println!("Started {pipeline}/{job} #{} (build {})", build.name, build.id);
            if *follow {
                stream_logs(&client, &target, build.id).await?;
            }
        }
        Command::Logs { build_id } => {
            let target = resolve_target(&args, &config)?;
            let client = HttpClient::for_target(&target)?;
            stream_logs(&client, &target, *build_id).await?;
        }
        Command::Watch {
            pipeline,
            no_notify,
        } => {
            let target = resolve_target(&args, &config)?;
            watch_pipeline(target, pipeline.clone(), *no_notify).await?;
        }
    }

    Ok(())
}
