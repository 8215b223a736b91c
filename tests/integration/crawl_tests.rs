//! End-to-end crawl tests
//!
//! Each test serves its URLs from a wiremock server and checks the report
//! returned by `run_crawl`.

use crate::{sitemap_index, test_config, url_list, urlset, write_target};
use sitemap_sweep::config::{DispatchOrder, OutputMode};
use sitemap_sweep::crawler::run_crawl;
use sitemap_sweep::output::{write_broken_urls, BROKEN_FILE_NAME};
use sitemap_sweep::{BrokenReason, SweepError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory sink for log output
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn mount_ok(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_text_list_crawl() {
    let server = MockServer::start().await;
    for route in ["/a", "/b", "/c"] {
        mount_ok(&server, route).await;
    }

    let dir = TempDir::new().unwrap();
    let target = write_target(
        dir.path(),
        "urls.txt",
        &url_list(&server.uri(), &["/a", "/b", "/c"]),
    );

    let report = run_crawl(test_config(&target)).await.unwrap();
    let results = &report.results;

    assert_eq!(results.count_finished_urls(), 3);
    assert!(results.get_broken_urls().is_empty());
    assert_eq!(results.count_outcomes(), 3);
    assert_eq!(results.tally_for("200"), 3);
    assert_eq!(results.get_total_data(), 6);
}

#[tokio::test]
async fn test_sitemap_index_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    let children = vec![format!("{}/a.xml", base), format!("{}/b.xml", base)];
    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&children)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[
            format!("{}/page/1", base),
            format!("{}/page/2", base),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[
            format!("{}/page/3", base),
            format!("{}/page/4", base),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/page/[0-9]+$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/sitemap_index.xml", base));
    let report = run_crawl(config).await.unwrap();

    assert_eq!(report.results.count_finished_urls(), 4);
    assert_eq!(report.results.tally_for("200"), 4);
    assert!(report.results.get_broken_urls().is_empty());
}

#[tokio::test]
async fn test_redirect_followed() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", base).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/old"]));

    let report = run_crawl(test_config(&target)).await.unwrap();
    let results = &report.results;

    assert_eq!(
        results
            .get_redirected_urls()
            .get(&format!("{}/old", base))
            .map(String::as_str),
        Some(format!("{}/new", base).as_str())
    );
    assert_eq!(results.count_finished_urls(), 2);
    assert_eq!(results.tally_for("301"), 1);
    assert_eq!(results.tally_for("200"), 1);
    assert!(results.get_broken_urls().is_empty());
}

#[tokio::test]
async fn test_relative_redirect_resolved() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/dir/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "new"))
        .mount(&server)
        .await;
    mount_ok(&server, "/dir/new").await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/dir/old"]));

    let report = run_crawl(test_config(&target)).await.unwrap();
    assert_eq!(
        report
            .results
            .get_redirected_urls()
            .get(&format!("{}/dir/old", base))
            .map(String::as_str),
        Some(format!("{}/dir/new", base).as_str())
    );
    assert_eq!(report.results.count_finished_urls(), 2);
}

#[tokio::test]
async fn test_redirect_not_followed() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", base).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/old"]));
    let mut config = test_config(&target);
    config.request.follow_redirects = false;

    let report = run_crawl(config).await.unwrap();
    let results = &report.results;

    assert_eq!(results.count_finished_urls(), 1);
    assert!(results.get_redirected_urls().is_empty());
    assert_eq!(
        results.get_broken_urls().get(&format!("{}/old", base)),
        Some(&BrokenReason::Status(301))
    );
}

#[tokio::test]
async fn test_redirect_cycle_hop_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/loop", base).as_str()),
        )
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/loop"]));
    let mut config = test_config(&target);
    config.request.max_redirect_hops = Some(3);

    let report = run_crawl(config).await.unwrap();
    let results = &report.results;

    assert_eq!(results.count_finished_urls(), 4);
    assert_eq!(results.tally_for("302"), 4);
    assert_eq!(
        results.get_broken_urls().get(&format!("{}/loop", base)),
        Some(&BrokenReason::RedirectLimit)
    );
}

#[tokio::test]
async fn test_timeout_classified_as_broken() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    mount_ok(&server, "/fast").await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/slow", "/fast"]));
    let mut config = test_config(&target);
    config.request.timeout = 0.5;

    let started = Instant::now();
    let report = run_crawl(config).await.unwrap();
    let results = &report.results;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(results.count_finished_urls(), 2);
    assert_eq!(
        results.get_broken_urls().get(&format!("{}/slow", base)),
        Some(&BrokenReason::Timeout)
    );
    assert_eq!(results.tally_for("timeout"), 1);
    assert_eq!(results.tally_for("200"), 1);
}

#[tokio::test]
async fn test_invalid_lines_are_dropped() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_ok(&server, "/valid").await;

    let dir = TempDir::new().unwrap();
    let content = format!("not a url\n{}/valid\nftp://example.com/file\n\n", base);
    let target = write_target(dir.path(), "urls.txt", &content);

    let report = run_crawl(test_config(&target)).await.unwrap();

    assert_eq!(report.results.count_finished_urls(), 1);
    assert_eq!(report.results.count_outcomes(), 1);
    assert!(report.results.get_broken_urls().is_empty());
}

#[tokio::test]
async fn test_unavailable_source_finishes_cleanly() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.xml");

    let report = run_crawl(test_config(&missing.to_string_lossy()))
        .await
        .unwrap();

    assert_eq!(report.results.count_finished_urls(), 0);
    assert!(report.results.get_status_codes().is_empty());
}

#[tokio::test]
async fn test_unavailable_remote_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/sitemap.xml", server.uri()));
    let report = run_crawl(config).await.unwrap();

    assert_eq!(report.results.count_finished_urls(), 0);
}

#[tokio::test]
async fn test_error_statuses_are_broken() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_ok(&server, "/ok").await;

    let dir = TempDir::new().unwrap();
    let target = write_target(
        dir.path(),
        "urls.txt",
        &url_list(&base, &["/missing", "/error", "/ok"]),
    );

    let report = run_crawl(test_config(&target)).await.unwrap();
    let broken = report.results.get_broken_urls();

    assert_eq!(broken.len(), 2);
    assert_eq!(
        broken.get(&format!("{}/missing", base)),
        Some(&BrokenReason::Status(404))
    );
    assert_eq!(
        broken.get(&format!("{}/error", base)),
        Some(&BrokenReason::Status(503))
    );
    assert_eq!(report.results.count_outcomes(), 3);
}

#[tokio::test]
async fn test_connection_failure_is_broken() {
    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", "http://127.0.0.1:9/unreachable");

    let report = run_crawl(test_config(&target)).await.unwrap();

    assert_eq!(report.results.count_finished_urls(), 1);
    assert_eq!(
        report
            .results
            .get_broken_urls()
            .get("http://127.0.0.1:9/unreachable"),
        Some(&BrokenReason::Failure)
    );
    assert_eq!(report.results.tally_for("failure"), 1);
}

#[tokio::test]
async fn test_response_header_tally() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path_regex("^/hit/"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Cache", "HIT"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/miss"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Cache", "MISS"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = write_target(
        dir.path(),
        "urls.txt",
        &url_list(&base, &["/hit/1", "/hit/2", "/miss"]),
    );
    let mut config = test_config(&target);
    config.request.count_response_headers = vec!["X-Cache".to_string()];

    let report = run_crawl(config).await.unwrap();

    assert_eq!(report.results.tally_for("X-Cache (HIT)"), 2);
    assert_eq!(report.results.tally_for("X-Cache (MISS)"), 1);
    assert_eq!(report.results.count_outcomes(), 3);
}

#[tokio::test]
async fn test_head_requests_transfer_no_body() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/page"]));
    let mut config = test_config(&target);
    config.request.request_type = sitemap_sweep::config::RequestType::Head;

    let report = run_crawl(config).await.unwrap();

    assert_eq!(report.results.count_finished_urls(), 1);
    assert_eq!(report.results.get_total_data(), 0);
}

#[tokio::test]
async fn test_concurrency_one_serializes_requests() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path_regex("^/slow/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = write_target(
        dir.path(),
        "urls.txt",
        &url_list(&base, &["/slow/1", "/slow/2", "/slow/3", "/slow/4"]),
    );
    let mut config = test_config(&target);
    config.request.concurrency = 1;

    let started = Instant::now();
    let report = run_crawl(config).await.unwrap();

    assert_eq!(report.results.count_finished_urls(), 4);
    assert!(started.elapsed() >= Duration::from_millis(800));
}

#[tokio::test]
async fn test_random_dispatch_order() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path_regex("^/r/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(10)
        .mount(&server)
        .await;

    let paths: Vec<String> = (0..10).map(|i| format!("/r/{}", i)).collect();
    let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &paths));
    let mut config = test_config(&target);
    config.request.dispatch_order = DispatchOrder::Random;

    let report = run_crawl(config).await.unwrap();
    assert_eq!(report.results.count_finished_urls(), 10);
}

#[tokio::test]
async fn test_bonus_respawn_requeues_successes() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_ok(&server, "/again").await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/again"]));
    let mut config = test_config(&target);
    config.request.bonus_respawn = 50;

    let report = run_crawl(config).await.unwrap();
    let results = &report.results;
    let requests = server.received_requests().await.unwrap_or_default();

    assert!(results.count_finished_urls() >= 1);
    assert_eq!(results.count_finished_urls(), requests.len() as u64);
    assert_eq!(results.tally_for("200"), results.count_finished_urls());
}

#[tokio::test]
async fn test_save_mode_writes_bodies_and_broken_list() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/body"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/body", "/gone"]));
    let mut config = test_config(&target);
    config.output.mode = OutputMode::Save;
    config.output.broken = true;
    config.output.destination = out.path().to_string_lossy().into_owned();

    let report = run_crawl(config).await.unwrap();
    let output_dir = report.output_dir.clone().expect("output directory");
    assert!(output_dir.starts_with(out.path()));

    let saved: Vec<_> = std::fs::read_dir(&output_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|name| name.contains("_____")));

    let broken_file = write_broken_urls(&report.results, &output_dir)
        .unwrap()
        .expect("broken list");
    assert_eq!(broken_file, output_dir.join(BROKEN_FILE_NAME));
    assert_eq!(
        std::fs::read_to_string(broken_file).unwrap(),
        format!("410: {}/gone\n", base)
    );
}

#[tokio::test]
async fn test_out_of_range_timeout_is_rejected() {
    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", "https://example.com/a\n");

    let mut config = test_config(&target);
    config.request.timeout = 1e20;
    assert!(matches!(run_crawl(config).await, Err(SweepError::Config(_))));

    let mut config = test_config(&target);
    config.output.timer_ui = 1e20;
    assert!(matches!(run_crawl(config).await, Err(SweepError::Config(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crawl_runs_on_spawned_task() {
    let server = MockServer::start().await;
    for route in ["/a", "/b"] {
        mount_ok(&server, route).await;
    }

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&server.uri(), &["/a", "/b"]));

    let report = tokio::spawn(run_crawl(test_config(&target)))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.results.count_finished_urls(), 2);
    assert_eq!(report.results.tally_for("200"), 2);
}

#[tokio::test]
async fn test_spawn_delay_does_not_hold_completions() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;
    mount_ok(&server, "/a").await;
    mount_ok(&server, "/b").await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/slow", "/a", "/b"]));
    let mut config = test_config(&target);
    config.request.timeout = 0.5;
    config.request.spawn_delay_min = 1_500_000;
    config.request.spawn_delay_max = 1_500_000;

    let started = Instant::now();
    let report = run_crawl(config).await.unwrap();
    let elapsed = started.elapsed();

    // Three dispatches 1.5s apart; the timed-out request must not stretch that
    assert!(elapsed >= Duration::from_millis(2900), "finished after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(4200), "finished after {:?}", elapsed);
    assert_eq!(report.results.count_finished_urls(), 3);
    assert_eq!(report.results.tally_for("timeout"), 1);
    assert_eq!(report.results.tally_for("200"), 2);
}

#[tokio::test]
async fn test_broken_urls_are_logged_as_warnings() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    mount_ok(&server, "/ok").await;

    let dir = TempDir::new().unwrap();
    let target = write_target(dir.path(), "urls.txt", &url_list(&base, &["/gone", "/ok"]));

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let report = run_crawl(test_config(&target)).await.unwrap();
    assert_eq!(report.results.get_broken_urls().len(), 1);

    let output = logs.contents();
    let gone = format!("Broken URL {}/gone", base);
    assert!(output.contains(&gone), "missing warning in: {}", output);
    assert!(output.contains("WARN"));
    assert!(!output.contains(&format!("Broken URL {}/ok", base)));
}
