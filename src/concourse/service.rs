//! Typed operations on top of [`ConcourseApi`].

use super::api::ConcourseApi;
use super::parser;
use crate::error::ApiError;
use crate::model::{AuthMethod, Build, Info, Job, Pipeline, Target, Token};

pub async fn fetch_info(api: &dyn ConcourseApi, url: &str) -> Result<Info, ApiError> {
    let body = api.info(url).await?;
    Ok(parser::parse_info(&body)?)
}

pub async fn fetch_teams(api: &dyn ConcourseApi, url: &str) -> Result<Vec<String>, ApiError> {
    let body = api.teams(url).await?;
    Ok(parser::parse_teams(&body)?)
}

pub async fn fetch_auth_methods(
    api: &dyn ConcourseApi,
    url: &str,
    team: &str,
) -> Result<Vec<AuthMethod>, ApiError> {
    let body = api.auth_methods(url, team).await?;
    Ok(parser::parse_auth_methods(&body)?)
}

pub async fn login_basic(
    api: &dyn ConcourseApi,
    url: &str,
    team: &str,
    username: &str,
    password: &str,
) -> Result<Token, ApiError> {
    let body = api.basic_token(url, team, username, password).await?;
    Ok(parser::parse_token(&body)?)
}

pub async fn login_unauthenticated(
    api: &dyn ConcourseApi,
    url: &str,
    team: &str,
) -> Result<Token, ApiError> {
    let body = api.unauthenticated_token(url, team).await?;
    Ok(parser::parse_token(&body)?)
}

/// Accept a token obtained out of band (e.g. pasted after an OAuth login)
/// once the server confirms it is not rejected.
pub async fn login_token(
    api: &dyn ConcourseApi,
    url: &str,
    raw: &str,
) -> Result<Token, ApiError> {
    let token = Token::new(raw.trim());
    api.validate_token(url, &token).await?;
    Ok(token)
}

pub async fn fetch_pipelines(
    api: &dyn ConcourseApi,
    target: &Target,
) -> Result<Vec<Pipeline>, ApiError> {
    let body = api.team_pipelines(target).await?;
    Ok(parser::parse_pipelines(&body)?)
}

pub async fn fetch_public_pipelines(
    api: &dyn ConcourseApi,
    url: &str,
) -> Result<Vec<Pipeline>, ApiError> {
    let body = api.public_pipelines(url).await?;
    Ok(parser::parse_pipelines(&body)?)
}

pub async fn fetch_jobs(
    api: &dyn ConcourseApi,
    target: &Target,
    pipeline: &str,
) -> Result<Vec<Job>, ApiError> {
    let body = api.jobs(target, pipeline).await?;
    Ok(parser::parse_jobs(&body)?)
}

pub async fn fetch_public_jobs(
    api: &dyn ConcourseApi,
    url: &str,
    pipeline: &Pipeline,
) -> Result<Vec<Job>, ApiError> {
    let body = api
        .public_jobs(url, &pipeline.team_name, &pipeline.name)
        .await?;
    Ok(parser::parse_jobs(&body)?)
}

/// Jobs of `pipeline` on `target`'s team. An anonymous target (empty token)
/// reads the public endpoint instead.
pub async fn fetch_visible_jobs(
    api: &dyn ConcourseApi,
    target: &Target,
    pipeline: &str,
) -> Result<Vec<Job>, ApiError> {
    if target.token.value.is_empty() {
        let pipeline = Pipeline {
            name: pipeline.to_string(),
            public: true,
            team_name: target.team.clone(),
        };
        fetch_public_jobs(api, &target.api, &pipeline).await
    } else {
        fetch_jobs(api, target, pipeline).await
    }
}

pub async fn fetch_builds(api: &dyn ConcourseApi, target: &Target) -> Result<Vec<Build>, ApiError> {
    let body = api.builds(target).await?;
    Ok(parser::parse_builds(&body)?)
}

pub async fn fetch_job_builds(
    api: &dyn ConcourseApi,
    target: &Target,
    pipeline: &str,
    job: &str,
) -> Result<Vec<Build>, ApiError> {
    let body = api.job_builds(target, pipeline, job).await?;
    Ok(parser::parse_builds(&body)?)
}

pub async fn trigger_build(
    api: &dyn ConcourseApi,
    target: &Target,
    pipeline: &str,
    job: &str,
) -> Result<Build, ApiError> {
    let body = api.trigger_build(target, pipeline, job).await?;
    let build = parser::parse_build(&body)?;
    tracing::info!(id = build.id, name = %build.name, "triggered build");
    Ok(build)
}
