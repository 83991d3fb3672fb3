//! HTTP front of the gateway.
//!
//! Every path that is not a fixed route is treated as a versioned import
//! path: it is routed, the upstream advertisement is fetched and rewritten
//! for the requested version, then one of the following is served:
//! - the rewritten advertisement for `/info/refs`
//! - the proxied upstream response for `/git-upload-pack`
//! - the `go get` page when `go-get=1` is in the query
//! - the package page otherwise

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::any,
    Router,
};
use gopkg_git::{rewrite_refs, GitError, Rewritten};
use gopkg_types::{Hosts, Repo, Version, UNSTABLE_SUFFIX};
use gopkg_web::{go_get_page, package_page, WebError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::observability::request_id_layer;
use crate::router::{ImportRouter, RouteError};
use crate::upstream::{UpstreamClient, UpstreamError, ACCEL_BUFFERING};

/// Sub-path serving the ref advertisement.
pub const INFO_REFS_PATH: &str = "/info/refs";

/// Sub-path of the upload-pack negotiation.
pub const UPLOAD_PACK_PATH: &str = "/git-upload-pack";

/// Content type of a rewritten advertisement.
pub const ADVERTISEMENT_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";

/// Largest upload-pack request body relayed upstream.
const MAX_UPLOAD_PACK_REQUEST: usize = 64 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Import path router.
    pub router: ImportRouter,
    /// Upstream host client.
    pub upstream: UpstreamClient,
    /// Gateway and upstream addresses.
    pub hosts: Arc<Hosts>,
}

impl AppState {
    pub fn new(hosts: Arc<Hosts>, upstream: UpstreamClient) -> Self {
        Self {
            router: ImportRouter::new(Arc::clone(&hosts)),
            upstream,
            hosts,
        }
    }
}

/// API error type. The display text is the response body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unsupported URL pattern; see the documentation at gopkg.in for details.")]
    UnsupportedPath,

    #[error("Import paths take the major version only (.{suggested} instead of .{given}); see docs at gopkg.in for the reasoning.")]
    VersionTooPrecise { given: String, suggested: String },

    #[error("Version {0:?} improperly considered invalid; please warn the service maintainers.")]
    InvalidVersion(String),

    #[error("Repository not found at {0}")]
    RepositoryNotFound(String),

    #[error("{}", no_matching_version(.root, .version))]
    NoMatchingVersion { root: String, version: Version },

    #[error("Cannot obtain refs from upstream: {0}")]
    RefsUnavailable(String),

    #[error("Cannot proxy git-upload-pack to upstream: {0}")]
    UploadPackUnavailable(String),
}

fn no_matching_version(root: &str, version: &Version) -> String {
    let suffix = if version.is_unstable() {
        UNSTABLE_SUFFIX
    } else {
        ""
    };
    let v = version.with_unstable(false);
    format!(
        r#"Repository at {root} has no branch or tag "{v}{suffix}", "{v}.N{suffix}" or "{v}.N.M{suffix}""#
    )
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::VersionTooPrecise { .. } => StatusCode::OK,
            ApiError::UnsupportedPath
            | ApiError::InvalidVersion(_)
            | ApiError::RepositoryNotFound(_)
            | ApiError::NoMatchingVersion { .. } => StatusCode::NOT_FOUND,
            ApiError::RefsUnavailable(_) | ApiError::UploadPackUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn refs(err: UpstreamError) -> Self {
        match err {
            UpstreamError::RepositoryNotFound(root) => ApiError::RepositoryNotFound(root),
            UpstreamError::Unavailable(cause) => ApiError::RefsUnavailable(cause),
        }
    }

    fn rewrite(root: String, err: GitError) -> Self {
        match err {
            GitError::NoMatchingVersion(version) => ApiError::NoMatchingVersion { root, version },
            malformed @ GitError::MalformedAdvertisement(_) => {
                ApiError::RefsUnavailable(malformed.to_string())
            }
        }
    }

    fn upload_pack(err: UpstreamError) -> Self {
        ApiError::UploadPackUnavailable(err.to_string())
    }
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::UnsupportedPath => ApiError::UnsupportedPath,
            RouteError::VersionTooPrecise { given, suggested } => {
                ApiError::VersionTooPrecise { given, suggested }
            }
            RouteError::InvalidVersion(version) => ApiError::InvalidVersion(version),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Upstream failure");
        }
        (status, self.to_string()).into_response()
    }
}

/// Creates the gateway router.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health-check", any(health_check))
        .route("/", any(root_redirect))
        .fallback(gateway)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(request_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}

/// Sends visitors of the bare gateway to the upstream host.
async fn root_redirect(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.hosts.upstream_url)
}

/// Serves a versioned import path.
async fn gateway(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    info!(remote = %remote, uri = %request.uri(), "Gateway request");

    let repo = state.router.route(request.uri().path())?;
    let root = repo.upstream_root();

    let advertisement = state
        .upstream
        .fetch_advertisement(&root)
        .await
        .map_err(ApiError::refs)?;
    let Rewritten {
        advertisement,
        versions,
    } = rewrite_refs(&advertisement, repo.major_version)
        .map_err(|e| ApiError::rewrite(root.clone(), e))?;
    let repo = repo.with_versions(versions);

    match repo.sub_path.as_str() {
        UPLOAD_PACK_PATH => proxy_upload_pack(&state, &root, request).await,
        INFO_REFS_PATH => Ok((
            [(header::CONTENT_TYPE, ADVERTISEMENT_CONTENT_TYPE)],
            advertisement,
        )
            .into_response()),
        _ if wants_go_get(request.uri()) => Ok(html_page(&repo, go_get_page)),
        _ => Ok(html_page(&repo, package_page)),
    }
}

async fn proxy_upload_pack(
    state: &AppState,
    root: &str,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let body: Bytes = axum::body::to_bytes(body, MAX_UPLOAD_PACK_REQUEST)
        .await
        .map_err(|e| ApiError::UploadPackUnavailable(format!("reading request: {e}")))?;

    let upstream = state
        .upstream
        .proxy_upload_pack(root, &parts.headers, body)
        .await
        .map_err(ApiError::upload_pack)?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CACHE_CONTROL, "no-cache");
    let relayed = [
        (header::CONTENT_TYPE, upstream.content_type()),
        (header::CONTENT_ENCODING, upstream.content_encoding()),
        (
            header::HeaderName::from_static(ACCEL_BUFFERING),
            upstream.accel_buffering(),
        ),
    ];
    for (name, value) in relayed {
        if let Some(value) = value {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from_stream(upstream.into_stream()))
        .map_err(|e| ApiError::UploadPackUnavailable(e.to_string()))
}

fn wants_go_get(uri: &Uri) -> bool {
    uri.query().is_some_and(|query| {
        url::form_urlencoded::parse(query.as_bytes()).any(|(key, value)| key == "go-get" && value == "1")
    })
}

/// Renders a page, degrading to an empty document when rendering fails.
fn html_page(repo: &Repo, render: fn(&Repo) -> Result<String, WebError>) -> Response {
    match render(repo) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, path = %repo.gateway_path(), "Failed to render page");
            (
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/html"))],
                Body::empty(),
            )
                .into_response()
        }
    }
}
