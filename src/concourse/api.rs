use crate::error::ApiError;
use crate::model::{Target, Token};
use async_trait::async_trait;

/// Raw access to the Concourse REST API. Implementations return response
/// bodies untouched; turning them into records is the parser's job.
#[async_trait]
pub trait ConcourseApi: Send + Sync {
    async fn info(&self, api: &str) -> Result<String, ApiError>;
    async fn teams(&self, api: &str) -> Result<String, ApiError>;
    async fn auth_methods(&self, api: &str, team: &str) -> Result<String, ApiError>;
    async fn basic_token(
        &self,
        api: &str,
        team: &str,
        username: &str,
        password: &str,
    ) -> Result<String, ApiError>;
    async fn unauthenticated_token(&self, api: &str, team: &str) -> Result<String, ApiError>;
    /// Succeeds unless the server rejects the token with a 401.
    async fn validate_token(&self, api: &str, token: &Token) -> Result<(), ApiError>;
    async fn team_pipelines(&self, target: &Target) -> Result<String, ApiError>;
    async fn public_pipelines(&self, api: &str) -> Result<String, ApiError>;
    async fn jobs(&self, target: &Target, pipeline: &str) -> Result<String, ApiError>;
    async fn public_jobs(&self, api: &str, team: &str, pipeline: &str)
        -> Result<String, ApiError>;
    async fn builds(&self, target: &Target) -> Result<String, ApiError>;
    async fn job_builds(
        &self,
        target: &Target,
        pipeline: &str,
        job: &str,
    ) -> Result<String, ApiError>;
    async fn trigger_build(
        &self,
        target: &Target,
        pipeline: &str,
        job: &str,
    ) -> Result<String, ApiError>;
}
