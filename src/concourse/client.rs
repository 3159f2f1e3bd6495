use super::api::ConcourseApi;
use crate::error::ApiError;
use crate::model::{Target, Token};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds `<api>/<segments...>`, percent-encoding each segment. A trailing
/// slash on the base URL is tolerated.
pub fn endpoint(api: &str, segments: &[&str]) -> Result<Url, ApiError> {
    let invalid = |reason: &str| ApiError::InvalidUrl {
        url: api.to_string(),
        reason: reason.to_string(),
    };
    let mut url = Url::parse(api.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub fn basic_auth_value(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

/// 2xx passes through. 401 becomes [`ApiError::Unauthorized`]; any other
/// status carries the response body as its details.
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(insecure: bool) -> Result<Self, ApiError> {
        if insecure {
            tracing::warn!("TLS certificate verification disabled");
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .user_agent(concat!("ffly/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn for_target(target: &Target) -> Result<Self, ApiError> {
        Self::new(target.insecure)
    }

    pub(crate) fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// An empty token means anonymous access to public resources, so no
    /// `Authorization` header is sent.
    fn authorized(&self, method: Method, url: Url, token: &Token) -> RequestBuilder {
        let builder = self.request(method, url);
        if token.value.is_empty() {
            builder
        } else {
            builder.header(AUTHORIZATION, token.auth_value())
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        tracing::debug!(status = %response.status(), url = %response.url(), "response");
        let response = check_status(response).await?;
        Ok(response.text().await?)
    }

    async fn get(&self, api: &str, segments: &[&str]) -> Result<String, ApiError> {
        let url = endpoint(api, segments)?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn get_authorized(&self, target: &Target, segments: &[&str]) -> Result<String, ApiError> {
        let url = endpoint(&target.api, segments)?;
        self.send(self.authorized(Method::GET, url, &target.token))
            .await
    }
}

#[async_trait]
impl ConcourseApi for HttpClient {
    async fn info(&self, api: &str) -> Result<String, ApiError> {
        self.get(api, &["api", "v1", "info"]).await
    }

    async fn teams(&self, api: &str) -> Result<String, ApiError> {
        self.get(api, &["api", "v1", "teams"]).await
    }

    async fn auth_methods(&self, api: &str, team: &str) -> Result<String, ApiError> {
        self.get(api, &["api", "v1", "teams", team, "auth", "methods"])
            .await
    }

    async fn basic_token(
        &self,
        api: &str,
        team: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let url = endpoint(api, &["api", "v1", "teams", team, "auth", "token"])?;
        let request = self
            .request(Method::GET, url)
            .header(AUTHORIZATION, basic_auth_value(username, password));
        self.send(request).await
    }

    async fn unauthenticated_token(&self, api: &str, team: &str) -> Result<String, ApiError> {
        self.get(api, &["api", "v1", "teams", team, "auth", "token"])
            .await
    }

    async fn validate_token(&self, api: &str, token: &Token) -> Result<(), ApiError> {
        let url = endpoint(api, &["api", "v1", "containers"])?;
        let response = self
            .authorized(Method::GET, url, token)
            .send()
            .await?;
        // Only an explicit rejection invalidates the token; other failures
        // say nothing about it.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }

    async fn team_pipelines(&self, target: &Target) -> Result<String, ApiError> {
        self.get_authorized(target, &["api", "v1", "teams", target.team.as_str(), "pipelines"])
            .await
    }

    async fn public_pipelines(&self, api: &str) -> Result<String, ApiError> {
        self.get(api, &["api", "v1", "pipelines"]).await
    }

    async fn jobs(&self, target: &Target, pipeline: &str) -> Result<String, ApiError> {
        self.get_authorized(
            target,
            &["api", "v1", "teams", target.team.as_str(), "pipelines", pipeline, "jobs"],
        )
        .await
    }

    async fn public_jobs(
        &self,
        api: &str,
        team: &str,
        pipeline: &str,
    ) -> Result<String, ApiError> {
        self.get(api, &["api", "v1", "teams", team, "pipelines", pipeline, "jobs"])
            .await
    }

    async fn builds(&self, target: &Target) -> Result<String, ApiError> {
        self.get_authorized(target, &["api", "v1", "builds"]).await
    }

    async fn job_builds(
        &self,
        target: &Target,
        pipeline: &str,
        job: &str,
    ) -> Result<String, ApiError> {
        self.get_authorized(target, &job_builds_path(&target.team, pipeline, job))
            .await
    }

    async fn trigger_build(
        &self,
        target: &Target,
        pipeline: &str,
        job: &str,
    ) -> Result<String, ApiError> {
        let url = endpoint(&target.api, &job_builds_path(&target.team, pipeline, job))?;
        self.send(self.authorized(Method::POST, url, &target.token))
            .await
    }
}

fn job_builds_path<'a>(team: &'a str, pipeline: &'a str, job: &'a str) -> [&'a str; 9] {
    [
        "api", "v1", "teams", team, "pipelines", pipeline, "jobs", job, "builds",
    ]
}
