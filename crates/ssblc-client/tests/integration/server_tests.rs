use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use ssblc_client::StaticServer;
use ssblc_client::server::router;
use ssblc_core::error::AppError;

use crate::integration::common::sample_site;

async fn get(dir: &std::path::Path, uri: &str) -> (StatusCode, String) {
    let response = router(dir)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn serves_files_from_the_directory() {
    let site = sample_site();

    let (status, body) = get(site.path(), "/about.html").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>About</h1>");
}

#[tokio::test]
async fn root_serves_index_html() {
    let site = sample_site();

    let (status, body) = get(site.path(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/about.html"));
}

#[tokio::test]
async fn nested_directory_serves_its_index() {
    let site = sample_site();

    let (status, body) = get(site.path(), "/docs/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>Docs</h1>");
}

#[tokio::test]
async fn serves_markdown_fragments() {
    let site = sample_site();

    let (status, body) = get(site.path(), "/docs/intro.md").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "# Intro");
}

#[tokio::test]
async fn missing_file_returns_404() {
    let site = sample_site();

    let (status, _) = get(site.path(), "/nope.html").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_binds_localhost_and_shuts_down() {
    let site = sample_site();

    let server = StaticServer::start(site.path(), 0).await.unwrap();

    assert_ne!(server.port(), 0);
    assert_eq!(
        server.base_url(),
        format!("http://localhost:{}", server.port())
    );

    let stream = tokio::net::TcpStream::connect(("127.0.0.1", server.port())).await;
    assert!(stream.is_ok());
    drop(stream);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn occupied_port_is_reported() {
    let site = sample_site();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let err = StaticServer::start(site.path(), port).await.err().unwrap();

    assert!(matches!(err, AppError::PortInUse(p) if p == port));
    assert_eq!(err.to_string(), format!("Port {port} is already in use"));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn port_held_on_ipv6_loopback_is_reported() {
    let site = sample_site();
    let Ok(taken) = std::net::TcpListener::bind("[::1]:0") else {
        // No IPv6 loopback on this host.
        return;
    };
    let port = taken.local_addr().unwrap().port();

    let err = StaticServer::start(site.path(), port).await.err().unwrap();

    assert!(matches!(err, AppError::PortInUse(p) if p == port));
}

#[tokio::test]
async fn serves_both_loopback_families() {
    let site = sample_site();
    let server = StaticServer::start(site.path(), 0).await.unwrap();

    assert!(tokio::net::TcpStream::connect(("127.0.0.1", server.port())).await.is_ok());
    if std::net::TcpListener::bind("[::1]:0").is_ok() {
        assert!(tokio::net::TcpStream::connect(("::1", server.port())).await.is_ok());
    }

    server.shutdown().await.unwrap();
}
