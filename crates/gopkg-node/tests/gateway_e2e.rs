//! End-to-end tests for the gateway against a mock upstream Git host.

use axum::{body::Body, http::Request};
use futures_util::StreamExt;
use gopkg_git::PktLine;
use gopkg_node::{create_router, AppState, Credentials, UpstreamClient};
use gopkg_types::Hosts;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tower::ServiceExt;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER: &str = "1111111111111111111111111111111111111111";
const V1: &str = "2222222222222222222222222222222222222222";
const V2: &str = "3333333333333333333333333333333333333333";

fn advertisement(lines: &[String]) -> Vec<u8> {
    let mut out = PktLine::from_string("# service=git-upload-pack\n").encode();
    PktLine::Flush.encode_into(&mut out);
    for line in lines {
        PktLine::from_string(line).encode_into(&mut out);
    }
    PktLine::Flush.encode_into(&mut out);
    out
}

fn upstream_refs() -> Vec<u8> {
    advertisement(&[
        format!("{MASTER} HEAD\0multi_ack symref=HEAD:refs/heads/master\n"),
        format!("{MASTER} refs/heads/master\n"),
        format!("{V1} refs/tags/v1.0.0\n"),
        format!("{V2} refs/heads/v2\n"),
    ])
}

fn create_test_app(server: &MockServer, scheme: &str, credentials: Option<Credentials>) -> axum::Router {
    create_app_with_timeout(&server.uri(), scheme, credentials, Duration::from_secs(10))
}

fn create_app_with_timeout(
    upstream_url: &str,
    scheme: &str,
    credentials: Option<Credentials>,
    request_timeout: Duration,
) -> axum::Router {
    let hosts = Arc::new(Hosts {
        gateway_scheme: scheme.to_string(),
        gateway_host: "gopkg.example.com".to_string(),
        upstream_url: upstream_url.to_string(),
    });
    let upstream = UpstreamClient::new(Duration::from_secs(5), credentials).unwrap();
    create_router(AppState::new(hosts, upstream), request_timeout)
}

async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Upstream that serves the advertisement, then answers upload-pack with one
/// chunk and keeps the response open. The receiver fires once the gateway
/// closes that connection.
async fn spawn_stalling_upstream() -> (String, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut closed_tx = Some(closed_tx);
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_request_head(&mut socket).await;
            if head.starts_with("GET") {
                let body = upstream_refs();
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.write_all(&body).await.unwrap();
                continue;
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      content-type: application/x-git-upload-pack-result\r\n\
                      transfer-encoding: chunked\r\n\r\n\
                      8\r\n0008NAK\n\r\n",
                )
                .await
                .unwrap();
            let mut buf = [0u8; 1024];
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
            if let Some(tx) = closed_tx.take() {
                let _ = tx.send(());
            }
        }
    });

    (format!("http://{addr}"), closed_rx)
}

async fn mount_refs(server: &MockServer, repo: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/owner/{repo}.git/info/refs")))
        .and(query_param("service", "git-upload-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn get(app: &axum::Router, uri: &str) -> (u16, Vec<(String, String)>, Vec<u8>) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    let app = create_test_app(&server, "https", None);

    let (status, headers, body) = get(&app, "/health-check").await;

    assert_eq!(status, 200);
    assert_eq!(body, b"ok");
    assert!(header_value(&headers, "x-request-id").is_some());
}

#[tokio::test]
async fn test_root_redirects_to_upstream() {
    let server = MockServer::start().await;
    let app = create_test_app(&server, "https", None);

    let (status, headers, _) = get(&app, "/").await;

    assert_eq!(status, 307);
    assert_eq!(header_value(&headers, "location"), Some(server.uri().as_str()));
}

#[tokio::test]
async fn test_fixed_routes_accept_any_method() {
    let server = MockServer::start().await;
    let app = create_test_app(&server, "https", None);

    for (uri, status) in [("/", 307), ("/health-check", 200)] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status().as_u16(), status, "{uri}");
    }
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(upstream_refs())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let app = create_app_with_timeout(&server.uri(), "https", None, Duration::from_millis(200));

    let (status, _, _) = get(&app, "/owner/repo.v1/info/refs").await;

    assert_eq!(status, 408);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = MockServer::start().await;
    let app = create_test_app(&server, "https", None);

    let request = Request::builder()
        .uri("/health-check")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_info_refs_is_rewritten() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    let app = create_test_app(&server, "https", None);

    let (status, headers, body) = get(&app, "/owner/repo.v2/info/refs?service=git-upload-pack").await;

    assert_eq!(status, 200);
    assert_eq!(
        header_value(&headers, "content-type"),
        Some("application/x-git-upload-pack-advertisement")
    );
    let expected = advertisement(&[
        format!("{V2} HEAD\0symref=HEAD:refs/heads/v2 multi_ack oldref=HEAD:refs/heads/master\n"),
        format!("{V2} refs/heads/master\n"),
        format!("{V1} refs/tags/v1.0.0\n"),
        format!("{V2} refs/heads/v2\n"),
    ]);
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_info_refs_with_git_suffix() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/owner/repo.v1.git/info/refs?service=git-upload-pack").await;

    assert_eq!(status, 200);
    let master = format!("{V1} refs/heads/master\n");
    assert!(body.windows(master.len()).any(|w| w == master.as_bytes()));
}

#[tokio::test]
async fn test_v0_without_versions_passes_through() {
    let server = MockServer::start().await;
    let refs = advertisement(&[
        format!("{MASTER} HEAD\0multi_ack\n"),
        format!("{MASTER} refs/heads/master\n"),
    ]);
    mount_refs(&server, "plain", refs.clone()).await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/owner/plain.v0/info/refs?service=git-upload-pack").await;

    assert_eq!(status, 200);
    assert_eq!(body, refs);
}

#[tokio::test]
async fn test_missing_version_is_not_found() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/owner/repo.v3").await;

    assert_eq!(status, 404);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        format!(
            r#"Repository at {}/owner/repo has no branch or tag "v3", "v3.N" or "v3.N.M""#,
            server.uri()
        )
    );
}

#[tokio::test]
async fn test_missing_repository_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/owner/missing.v1").await;

    assert_eq!(status, 404);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        format!("Repository not found at {}/owner/missing", server.uri())
    );
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/owner/repo.v1").await;

    assert_eq!(status, 502);
    assert!(String::from_utf8(body)
        .unwrap()
        .starts_with("Cannot obtain refs from upstream: "));
}

#[tokio::test]
async fn test_malformed_advertisement_is_bad_gateway() {
    let server = MockServer::start().await;
    mount_refs(&server, "broken", b"zzzz".to_vec()).await;
    let app = create_test_app(&server, "https", None);

    let (status, _, _) = get(&app, "/owner/broken.v1/info/refs").await;

    assert_eq!(status, 502);
}

#[tokio::test]
async fn test_unsupported_path() {
    let server = MockServer::start().await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/not-a-package").await;

    assert_eq!(status, 404);
    assert_eq!(
        body,
        b"Unsupported URL pattern; see the documentation at gopkg.in for details."
    );
}

#[tokio::test]
async fn test_version_too_precise() {
    let server = MockServer::start().await;
    let app = create_test_app(&server, "https", None);

    let (status, _, body) = get(&app, "/owner/repo.v1.2/sub").await;

    assert_eq!(status, 200);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Import paths take the major version only (.v1 instead of .v1.2); see docs at gopkg.in for the reasoning."
    );
}

#[tokio::test]
async fn test_go_get_page() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    let app = create_test_app(&server, "https", None);

    let (status, headers, body) = get(&app, "/owner/repo.v1/sub?go-get=1").await;

    assert_eq!(status, 200);
    assert!(header_value(&headers, "content-type").is_some_and(|v| v.starts_with("text/html")));
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains(
        r#"<meta name="go-import" content="gopkg.example.com/owner/repo.v1 git https://gopkg.example.com/owner/repo.v1">"#
    ));
    assert!(html.contains(&format!("{}/owner/repo/tree/v1.0.0{{/dir}}", server.uri())));
    assert!(html.contains("go get gopkg.example.com/owner/repo.v1/sub"));
}

#[tokio::test]
async fn test_package_page() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    let app = create_test_app(&server, "http", None);

    let (status, _, body) = get(&app, "/owner/repo.v2").await;

    assert_eq!(status, 200);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("go get -insecure gopkg.example.com/owner/repo.v2"));
    assert!(html.contains("//gopkg.example.com/owner/repo.v1"));
    assert!(html.contains(&format!("{}/owner/repo/tree/v2", server.uri())));
}

#[tokio::test]
async fn test_upload_pack_is_proxied() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    Mock::given(method("POST"))
        .and(path("/owner/repo.git/git-upload-pack"))
        .and(header("content-type", "application/x-git-upload-pack-request"))
        .and(body_bytes(b"0032want".to_vec()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-git-upload-pack-result")
                .insert_header("x-accel-buffering", "no")
                .set_body_bytes(b"0008NAK\n".to_vec()),
        )
        .mount(&server)
        .await;
    let app = create_test_app(&server, "https", None);

    let request = Request::builder()
        .method("POST")
        .uri("/owner/repo.v1.git/git-upload-pack")
        .header("content-type", "application/x-git-upload-pack-request")
        .body(Body::from("0032want"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert_eq!(
        response.headers()["content-type"],
        "application/x-git-upload-pack-result"
    );
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"0008NAK\n");
}

#[tokio::test]
async fn test_upload_pack_rejected_without_matching_version() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let app = create_test_app(&server, "https", None);

    let request = Request::builder()
        .method("POST")
        .uri("/owner/repo.v5/git-upload-pack")
        .body(Body::from("0000"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_upload_pack_upstream_error() {
    let server = MockServer::start().await;
    mount_refs(&server, "repo", upstream_refs()).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = create_test_app(&server, "https", None);

    let request = Request::builder()
        .method("POST")
        .uri("/owner/repo.v1/git-upload-pack")
        .body(Body::from("0000"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn test_credentials_are_sent_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owner/private.git/info/refs"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(upstream_refs()))
        .mount(&server)
        .await;
    let credentials = Credentials {
        user: "user".to_string(),
        pass: "pass".to_string(),
    };
    let app = create_test_app(&server, "https", Some(credentials));

    let (status, _, _) = get(&app, "/owner/private.v1/info/refs").await;

    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_upload_pack_client_disconnect_closes_upstream() {
    let (upstream_url, closed) = spawn_stalling_upstream().await;
    let app = create_app_with_timeout(&upstream_url, "https", None, Duration::from_secs(30));

    let request = Request::builder()
        .method("POST")
        .uri("/owner/repo.v1/git-upload-pack")
        .header("content-type", "application/x-git-upload-pack-request")
        .body(Body::from("0032want"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), 200);

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    drop(body);

    tokio::time::timeout(Duration::from_secs(2), closed)
        .await
        .expect("upstream connection left open after client disconnect")
        .unwrap();
}
