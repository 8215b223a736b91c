//! Sitemap source tests against local files and mock servers

use crate::{sitemap_index, urlset, write_target};
use sitemap_sweep::config::TargetType;
use sitemap_sweep::sitemap::{DiscoveredUrl, SitemapSource, SourceInput, UrlOrigin};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Runs a source over `location` and returns every emitted URL in order
async fn discover(location: &str) -> Vec<String> {
    let input = SourceInput::from_location(location).unwrap();
    let (source, mut rx) = SitemapSource::new(input, reqwest::Client::new(), TargetType::Xml);
    let handle = source.handle();

    let emitted = source.run().await;
    assert!(handle.is_initialized());
    assert_eq!(handle.emitted_count(), emitted);

    drain(&mut rx)
}

fn drain(rx: &mut UnboundedReceiver<DiscoveredUrl>) -> Vec<String> {
    let mut urls = Vec::new();
    while let Ok(discovered) = rx.try_recv() {
        assert_eq!(discovered.origin, UrlOrigin::Sitemap);
        urls.push(discovered.url.to_string());
    }
    urls
}

async fn mount_body(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_index_with_local_children() {
    let dir = TempDir::new().unwrap();
    write_target(
        dir.path(),
        "one.xml",
        &urlset(&["https://example.com/1".to_string(), "https://example.com/2".to_string()]),
    );
    write_target(
        dir.path(),
        "two.xml",
        &urlset(&["https://example.com/3".to_string()]),
    );
    let index = write_target(
        dir.path(),
        "index.xml",
        &sitemap_index(&["one.xml".to_string(), "two.xml".to_string()]),
    );

    let urls = discover(&index).await;
    assert_eq!(
        urls,
        vec![
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3"
        ]
    );
}

#[tokio::test]
async fn test_index_is_idempotent() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_body(
        &server,
        "/index.xml",
        200,
        sitemap_index(&[format!("{}/a.xml", base), format!("{}/b.xml", base)]),
    )
    .await;
    mount_body(
        &server,
        "/a.xml",
        200,
        urlset(&["https://example.com/a1".to_string(), "https://example.com/a2".to_string()]),
    )
    .await;
    mount_body(
        &server,
        "/b.xml",
        200,
        urlset(&["https://example.com/b1".to_string(), "https://example.com/b2".to_string()]),
    )
    .await;

    let location = format!("{}/index.xml", base);
    let first = discover(&location).await;
    let second = discover(&location).await;

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_broken_children_are_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_body(
        &server,
        "/index.xml",
        200,
        sitemap_index(&[
            format!("{}/missing.xml", base),
            format!("{}/malformed.xml", base),
            format!("{}/good.xml", base),
        ]),
    )
    .await;
    mount_body(&server, "/missing.xml", 404, String::new()).await;
    mount_body(
        &server,
        "/malformed.xml",
        200,
        "<urlset><url><loc>https://example.com/x</loc>".to_string(),
    )
    .await;
    mount_body(
        &server,
        "/good.xml",
        200,
        urlset(&["https://example.com/good".to_string()]),
    )
    .await;

    let urls = discover(&format!("{}/index.xml", base)).await;
    assert_eq!(urls, vec!["https://example.com/good"]);
}

#[tokio::test]
async fn test_nested_index() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_body(
        &server,
        "/root.xml",
        200,
        sitemap_index(&[format!("{}/nested.xml", base)]),
    )
    .await;
    mount_body(
        &server,
        "/nested.xml",
        200,
        sitemap_index(&[format!("{}/leaf.xml", base)]),
    )
    .await;
    mount_body(
        &server,
        "/leaf.xml",
        200,
        urlset(&["https://example.com/leaf".to_string()]),
    )
    .await;

    let urls = discover(&format!("{}/root.xml", base)).await;
    assert_eq!(urls, vec!["https://example.com/leaf"]);
}

#[tokio::test]
async fn test_self_referencing_index_stops() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_body(
        &server,
        "/self.xml",
        200,
        sitemap_index(&[format!("{}/self.xml", base)]),
    )
    .await;

    let urls = discover(&format!("{}/self.xml", base)).await;
    assert!(urls.is_empty());
}

#[tokio::test]
async fn test_remote_source_follows_redirect() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", format!("{}/real.xml", base).as_str()),
        )
        .mount(&server)
        .await;
    mount_body(
        &server,
        "/real.xml",
        200,
        urlset(&["https://example.com/moved".to_string()]),
    )
    .await;

    let urls = discover(&format!("{}/sitemap.xml", base)).await;
    assert_eq!(urls, vec!["https://example.com/moved"]);
}

#[tokio::test]
async fn test_text_target_type() {
    let dir = TempDir::new().unwrap();
    let target = write_target(
        dir.path(),
        "urls.txt",
        "https://example.com/a\n  https://example.com/b  \n\n",
    );

    let input = SourceInput::from_location(&target).unwrap();
    let (source, mut rx) = SitemapSource::new(input, reqwest::Client::new(), TargetType::Txt);

    assert_eq!(source.run().await, 2);
    assert_eq!(
        drain(&mut rx),
        vec!["https://example.com/a", "https://example.com/b"]
    );
}
