/// Smoke-test for `BrowserPool`.
///
/// Serves a two-page site from a temporary directory, launches a headless
/// Chromium pool and checks that both pages load, that the index carries its
/// body and that a missing page is reported with 404.
///
/// Run with:
///   cargo run -p ssblc-client --example browser_smoke
use ssblc_client::{BrowserPool, PoolConfig, StaticServer};
use ssblc_core::config::CrawlConfig;
use ssblc_core::traits::PageFetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let site = tempfile::tempdir()?;
    std::fs::write(
        site.path().join("index.html"),
        r#"<html><body><a href="/about.html">About</a></body></html>"#,
    )?;
    std::fs::write(site.path().join("about.html"), "<h1>About</h1>")?;

    let server = StaticServer::start(site.path(), 0).await?;
    let seed = format!("{}/", server.base_url());

    println!("Launching headless browser…");
    let config = CrawlConfig {
        max_concurrent_checks: 2,
        ..CrawlConfig::default()
    };
    let pool = BrowserPool::launch(PoolConfig::from_crawl(&config, url::Url::parse(&seed)?)).await?;

    let index = pool.fetch_one(0, &seed).await;
    assert_eq!(index.status(), Some(200), "index failed: {index:?}");
    let body = index.body.as_deref().unwrap_or_default();
    assert!(body.contains("/about.html"), "link missing from rendered HTML");

    let about = pool.fetch_one(1, &format!("{}/about.html", server.base_url())).await;
    assert_eq!(about.status(), Some(200), "about failed: {about:?}");

    let missing = pool.fetch_one(0, &format!("{}/missing.html", server.base_url())).await;
    assert_eq!(missing.status(), Some(404));

    println!("OK, got {} bytes of rendered HTML for the index", body.len());

    pool.shutdown().await;
    server.shutdown().await?;
    Ok(())
}
