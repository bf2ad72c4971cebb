//! Supabase Management API client for Edge Functions.
//!
//! Covers the four calls the provider needs: deploy, get, delete, and get
//! body. Every request is authenticated with a bearer token. A 404 on get or
//! delete is reported as "not found" rather than as an error; every other
//! unexpected status becomes [`ProviderError::Api`] carrying the raw body.

use std::fmt;

use reqwest::multipart::Form;
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ProviderError;

/// Default Management API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.supabase.com";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Deployment status reported by the API.
///
/// Statuses this provider does not know about are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FunctionStatus {
    /// The function is deployed and serving.
    Active,
    /// The function has been removed.
    Removed,
    /// The function is being rate limited.
    Throttled,
    /// Any other status string.
    Other(String),
}

impl From<String> for FunctionStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "ACTIVE" => Self::Active,
            "REMOVED" => Self::Removed,
            "THROTTLED" => Self::Throttled,
            _ => Self::Other(status),
        }
    }
}

impl From<FunctionStatus> for String {
    fn from(status: FunctionStatus) -> Self {
        match status {
            FunctionStatus::Other(raw) => raw,
            known => known.to_string(),
        }
    }
}

impl fmt::Display for FunctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Removed => "REMOVED",
            Self::Throttled => "THROTTLED",
            Self::Other(raw) => raw,
        };
        f.write_str(s)
    }
}

/// Body of a successful deploy (`201 Created`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployFunctionResponse {
    /// Function UUID.
    pub id: String,
    /// Function slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Deployment status.
    pub status: FunctionStatus,
    /// Deployment version, incremented by every deploy.
    pub version: i64,
    /// Creation time (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Last update time (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Whether invocations require a valid JWT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_jwt: Option<bool>,
}

/// Body of a successful get (`200 OK`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSlugResponse {
    /// Function UUID.
    pub id: String,
    /// Function slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Deployment status.
    pub status: FunctionStatus,
    /// Deployment version.
    pub version: i64,
    /// Creation time (unix seconds).
    pub created_at: i64,
    /// Last update time (unix seconds).
    pub updated_at: i64,
    /// Whether invocations require a valid JWT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_jwt: Option<bool>,
}

/// Client for the Edge Functions part of the Management API.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: String,
}

impl ManagementClient {
    /// Create a client for `endpoint` authenticating with `access_token`.
    ///
    /// Fails with [`ProviderError::Configuration`] when the endpoint is not an
    /// absolute http(s) URL.
    pub fn new(endpoint: &str, access_token: impl Into<String>) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ProviderError::Configuration(format!("invalid endpoint {:?}: {}", endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "invalid endpoint {:?}: expected an http(s) URL",
                endpoint.as_str()
            )));
        }

        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            endpoint,
            access_token: access_token.into(),
        })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Deploy (create or replace) a function from a multipart body.
    #[instrument(skip(self, form), fields(endpoint = %self.endpoint))]
    pub async fn deploy_function(
        &self,
        project_ref: &str,
        slug: &str,
        form: Form,
    ) -> Result<DeployFunctionResponse, ProviderError> {
        const OPERATION: &str = "deploy function";

        let url = self.function_url(project_ref, &["deploy"])?;
        let response = self
            .http
            .post(url)
            .query(&[("slug", slug)])
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::request(OPERATION, e))?;

        debug!(status = %response.status(), "deploy response received");
        if response.status() != StatusCode::CREATED {
            return Err(unexpected(OPERATION, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::request(OPERATION, e))
    }

    /// Fetch a function's metadata. Returns `None` when it does not exist.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn get_function(
        &self,
        project_ref: &str,
        slug: &str,
    ) -> Result<Option<FunctionSlugResponse>, ProviderError> {
        const OPERATION: &str = "read function";

        let url = self.function_url(project_ref, &[slug])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::request(OPERATION, e))?;

        debug!(status = %response.status(), "get response received");
        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map(Some)
                .map_err(|e| ProviderError::request(OPERATION, e)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(OPERATION, response).await),
        }
    }

    /// Delete a function. Returns `false` when it was already gone.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn delete_function(&self, project_ref: &str, slug: &str) -> Result<bool, ProviderError> {
        const OPERATION: &str = "delete function";

        let url = self.function_url(project_ref, &[slug])?;
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::request(OPERATION, e))?;

        debug!(status = %response.status(), "delete response received");
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(OPERATION, response).await),
        }
    }

    /// Fetch the raw source body of a deployed function.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn get_function_body(
        &self,
        project_ref: &str,
        slug: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        const OPERATION: &str = "read function body";

        let url = self.function_url(project_ref, &[slug, "body"])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::request(OPERATION, e))?;

        debug!(status = %response.status(), "body response received");
        if response.status() != StatusCode::OK {
            return Err(unexpected(OPERATION, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::request(OPERATION, e))?;
        Ok(bytes.to_vec())
    }

    /// `{endpoint}/v1/projects/{project_ref}/functions/{rest..}` with every
    /// segment percent-encoded.
    fn function_url(&self, project_ref: &str, rest: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::Configuration(format!(
                    "endpoint {:?} cannot be used as a base URL",
                    self.endpoint.as_str()
                ))
            })?;
            segments
                .pop_if_empty()
                .extend(["v1", "projects", project_ref, "functions"])
                .extend(rest);
        }
        Ok(url)
    }
}

async fn unexpected(operation: &str, response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::api(operation, status, body)
}
