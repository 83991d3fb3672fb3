//! Client for the upstream Git host.
//!
//! Fetches ref advertisements and relays `git-upload-pack` negotiations.

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE,
    USER_AGENT,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Appended to a repository root to fetch its advertisement.
pub const REFS_SUFFIX: &str = ".git/info/refs?service=git-upload-pack";

/// Appended to a repository root to reach its upload-pack endpoint.
pub const UPLOAD_PACK_SUFFIX: &str = ".git/git-upload-pack";

/// Response header controlling proxy buffering.
pub const ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Request headers relayed to the upstream upload-pack endpoint.
const FORWARDED_HEADERS: [HeaderName; 4] = [USER_AGENT, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE];

/// Upstream client errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The host answered 401 or 404 for the repository.
    #[error("repository not found at {0}")]
    RepositoryNotFound(String),

    /// Transport failure or unexpected status.
    #[error("{0}")]
    Unavailable(String),
}

/// Basic credentials for the upstream host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// HTTP client for the upstream host.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    credentials: Option<Credentials>,
}

impl UpstreamClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration, credentials: Option<Credentials>) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        Ok(Self { http, credentials })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => request.basic_auth(&credentials.user, Some(&credentials.pass)),
            None => request,
        }
    }

    /// Fetches the upload-pack ref advertisement of the repository at
    /// `repo_root`.
    pub async fn fetch_advertisement(&self, repo_root: &str) -> Result<Bytes, UpstreamError> {
        let url = format!("{repo_root}{REFS_SUFFIX}");
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("cannot talk to upstream: {e}")))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                return Err(UpstreamError::RepositoryNotFound(repo_root.to_string()))
            }
            status => {
                return Err(UpstreamError::Unavailable(format!(
                    "error from upstream: {status}"
                )))
            }
        }

        response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("error reading from upstream: {e}")))
    }

    /// Posts an upload-pack negotiation to the repository at `repo_root`,
    /// relaying the client's protocol headers.
    pub async fn proxy_upload_pack(
        &self,
        repo_root: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UploadPackResponse, UpstreamError> {
        let url = format!("{repo_root}{UPLOAD_PACK_SUFFIX}");
        let mut request = self.authorize(self.http.post(&url)).body(body);
        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(&name) {
                request = request.header(name, value.clone());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("upload-pack request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpstreamError::Unavailable(format!(
                "upload-pack answered {status}"
            )));
        }

        Ok(UploadPackResponse { response })
    }
}

/// A successful upstream upload-pack response, body not yet read.
#[derive(Debug)]
pub struct UploadPackResponse {
    response: reqwest::Response,
}

impl UploadPackResponse {
    fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<HeaderValue> {
        self.response.headers().get(name).cloned()
    }

    pub fn content_type(&self) -> Option<HeaderValue> {
        self.header(CONTENT_TYPE)
    }

    pub fn content_encoding(&self) -> Option<HeaderValue> {
        self.header(CONTENT_ENCODING)
    }

    pub fn accel_buffering(&self) -> Option<HeaderValue> {
        self.header(ACCEL_BUFFERING)
    }

    /// The response body as it arrives. Dropping the stream closes the
    /// upstream connection.
    pub fn into_stream(self) -> impl Stream<Item = reqwest::Result<Bytes>> {
        self.response.bytes_stream()
    }
}
