//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive whole
//! crawls through the engine and the controller.

use frontier_crawl::config::{Config, CrawlerConfig};
use frontier_crawl::frontier::{Frontier, MemoryFrontier};
use frontier_crawl::{ControlError, CrawlController, Engine, EngineStatus};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates an engine over a fresh in-memory frontier
fn create_engine(max_concurrency: u32) -> (Engine, Arc<MemoryFrontier>) {
    let config = Config {
        crawler: CrawlerConfig {
            max_concurrency,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..CrawlerConfig::default()
        },
        ..Config::default()
    };
    let frontier = Arc::new(MemoryFrontier::new());
    let engine = Engine::new(&config, frontier.clone()).expect("Failed to create engine");
    (engine, frontier)
}

/// Builds an HTML page linking to each of `links`
fn page_with_links(links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">link</a>"#, l))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

/// Polls until `condition` holds, failing the test after a few seconds
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

#[tokio::test]
async fn test_seed_without_links_terminates_after_one_batch() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html("<p>nothing here</p>".to_string()), 1).await;

    let (engine, _) = create_engine(10);
    let seed = format!("{}/", server.uri());

    tokio::time::timeout(Duration::from_secs(5), engine.start_crawling_from(&seed))
        .await
        .expect("Crawl did not terminate");

    assert_eq!(engine.status(), EngineStatus::Free);
    assert!(engine.is_available());

    let status = engine.get_status().unwrap();
    assert_eq!(status.known.len(), 1);
    assert!(status.known.contains(&seed));
    assert!(status.pending.is_empty());

    server.verify().await;
}

#[tokio::test]
async fn test_full_crawl_follows_relative_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<a href="/docs/intro">Intro</a> <A HREF='about'>About</A>"#.to_string()),
        1,
    )
    .await;
    mount_page(&server, "/docs/intro", html(r#"<a href="../about">Up</a>"#.to_string()), 1).await;
    mount_page(&server, "/about", html("<p>about</p>".to_string()), 1).await;

    let (engine, frontier) = create_engine(10);
    let seed = format!("{}/", base);
    engine.start_crawling_from(&seed).await;

    let status = engine.get_status().unwrap();
    let expected: Vec<String> = vec![
        format!("{}/", base),
        format!("{}/about", base),
        format!("{}/docs/intro", base),
    ];
    assert_eq!(status.known.into_iter().collect::<Vec<_>>(), expected);
    assert!(status.pending.is_empty());

    for address in &expected {
        assert!(frontier.entry(address).unwrap().unwrap().processed);
    }

    server.verify().await;
}

#[tokio::test]
async fn test_pdf_is_gated_and_contributes_no_links() {
    let server = MockServer::start().await;
    let base = server.uri();
    let pdf = format!("{}/paper.pdf", base);

    mount_page(&server, "/", html(page_with_links(&[pdf.clone()])), 1).await;
    mount_page(
        &server,
        "/paper.pdf",
        ResponseTemplate::new(200).set_body_raw(
            format!(r#"<a href="{}/hidden">not a link source</a>"#, base).into_bytes(),
            "application/pdf",
        ),
        1,
    )
    .await;
    mount_page(&server, "/hidden", html(String::new()), 0).await;

    let (engine, frontier) = create_engine(10);
    engine.start_crawling_from(&format!("{}/", base)).await;

    let status = engine.get_status().unwrap();
    assert_eq!(status.known.len(), 2);
    assert!(!status.known.contains(&format!("{}/hidden", base)));
    assert!(status.pending.is_empty());

    let entry = frontier.entry(&pdf).unwrap().unwrap();
    assert!(!entry.might_contain_links);
    assert!(!entry.processed);

    server.verify().await;
}

#[tokio::test]
async fn test_address_found_on_concurrent_pages_is_added_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let shared = format!("{}/shared", base);

    mount_page(
        &server,
        "/",
        html(page_with_links(&[
            format!("{}/left", base),
            format!("{}/right", base),
        ])),
        1,
    )
    .await;
    for route in ["/left", "/right"] {
        mount_page(
            &server,
            route,
            html(page_with_links(&[shared.clone(), shared.clone()]))
                .set_delay(Duration::from_millis(50)),
            1,
        )
        .await;
    }
    mount_page(&server, "/shared", html(String::new()), 1).await;

    let (engine, _) = create_engine(10);
    engine.start_crawling_from(&format!("{}/", base)).await;

    let status = engine.get_status().unwrap();
    assert_eq!(status.known.len(), 4);
    assert!(status.known.contains(&shared));
    assert!(status.pending.is_empty());

    // Fetched exactly once, so it was enqueued exactly once
    server.verify().await;
}

#[tokio::test]
async fn test_in_flight_operations_never_exceed_limit() {
    let server = MockServer::start().await;
    let base = server.uri();
    let max_concurrency = 3;

    let leaves: Vec<String> = (0..10).map(|i| format!("{}/leaf/{}", base, i)).collect();
    mount_page(&server, "/", html(page_with_links(&leaves)), 1).await;
    for i in 0..10 {
        mount_page(
            &server,
            &format!("/leaf/{}", i),
            html(String::new()).set_delay(Duration::from_millis(60)),
            1,
        )
        .await;
    }

    let (engine, _) = create_engine(max_concurrency);

    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let monitor = {
        let engine = engine.clone();
        let peak = Arc::clone(&peak);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                peak.fetch_max(engine.in_flight(), Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };

    tokio::time::timeout(
        Duration::from_secs(10),
        engine.start_crawling_from(&format!("{}/", base)),
    )
    .await
    .expect("Crawl did not terminate");
    done.store(true, Ordering::SeqCst);
    monitor.await.unwrap();

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1, "monitor never saw an operation in flight");
    assert!(
        peak <= max_concurrency as usize,
        "saw {} operations in flight, limit is {}",
        peak,
        max_concurrency
    );

    let status = engine.get_status().unwrap();
    assert_eq!(status.known.len(), 11);
    assert!(status.pending.is_empty());
    server.verify().await;
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_batch() {
    let server = MockServer::start().await;
    let base = server.uri();

    let slow: Vec<String> = (0..3).map(|i| format!("{}/slow/{}", base, i)).collect();
    mount_page(&server, "/", html(page_with_links(&slow)), 1).await;
    for i in 0..3 {
        mount_page(
            &server,
            &format!("/slow/{}", i),
            html(page_with_links(&[format!("{}/beyond/{}", base, i)]))
                .set_delay(Duration::from_millis(500)),
            1,
        )
        .await;
    }

    let (engine, _) = create_engine(10);
    let crawl = engine
        .spawn_crawl(&format!("{}/", base))
        .expect("seed should be recorded")
        .expect("engine should be free");

    wait_until(|| engine.in_flight() == 3).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.received_requests().await.map_or(0, |r| r.len()) < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("slow pages were never requested");

    let stopper = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.stop().await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.status(), EngineStatus::Closing);
    assert!(!engine.is_available());

    tokio::time::timeout(Duration::from_secs(5), stopper)
        .await
        .expect("stop did not return")
        .unwrap();
    assert_eq!(engine.status(), EngineStatus::Free);
    assert_eq!(engine.in_flight(), 0);

    crawl.await.unwrap();

    // The three pages were fetched but their results abandoned, so each goes
    // back to pending exactly once and nothing beyond them was discovered
    let status = engine.get_status().unwrap();
    assert_eq!(status.pending, slow.iter().cloned().collect::<BTreeSet<_>>());
    assert_eq!(status.known.len(), 4);

    server.verify().await;
}

#[tokio::test]
async fn test_start_while_active_is_ignored() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(String::new()).set_delay(Duration::from_millis(300)),
        1,
    )
    .await;
    mount_page(&server, "/other", html(String::new()), 0).await;

    let (engine, _) = create_engine(10);
    let crawl = engine
        .spawn_crawl(&format!("{}/", base))
        .expect("seed should be recorded")
        .expect("engine should be free");
    assert_eq!(engine.status(), EngineStatus::Active);

    tokio::time::timeout(
        Duration::from_millis(200),
        engine.start_crawling_from(&format!("{}/other", base)),
    )
    .await
    .expect("second start should return immediately");
    assert!(engine
        .spawn_crawl(&format!("{}/other", base))
        .unwrap()
        .is_none());

    assert_eq!(engine.status(), EngineStatus::Active);
    crawl.await.unwrap();

    let status = engine.get_status().unwrap();
    assert_eq!(status.known.len(), 1);
    assert!(!status.known.contains(&format!("{}/other", base)));

    server.verify().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_right_after_start_freezes_frontier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(String::new()))
        .mount(&server)
        .await;

    let (engine, frontier) = create_engine(10);
    let seed = format!("{}/", server.uri());
    let crawl = engine
        .spawn_crawl(&seed)
        .expect("seed should be recorded")
        .expect("engine should be free");

    // Seeded before the crawl task gets to run
    assert_eq!(engine.status(), EngineStatus::Active);
    let seeded = frontier.snapshot().unwrap();
    assert!(seeded.known.contains(&seed));

    engine.stop().await;
    assert_eq!(engine.status(), EngineStatus::Free);
    let stopped = frontier.snapshot().unwrap();
    assert!(stopped.known.contains(&seed));

    crawl.await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(frontier.snapshot().unwrap(), stopped);
    assert_eq!(engine.status(), EngineStatus::Free);
}

#[tokio::test]
async fn test_failing_address_is_retried_until_stopped() {
    let server = MockServer::start().await;
    let base = server.uri();
    // Nothing listens on the discard port
    let dead = "http://127.0.0.1:9/dead".to_string();

    mount_page(&server, "/", html(page_with_links(&[dead.clone()])), 1).await;

    let (engine, frontier) = create_engine(10);
    let crawl = engine
        .spawn_crawl(&format!("{}/", base))
        .expect("seed should be recorded")
        .expect("engine should be free");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.status(), EngineStatus::Active);

    engine.stop().await;
    crawl.await.unwrap();

    let status = engine.get_status().unwrap();
    assert!(status.known.contains(&dead));
    assert!(status.pending.contains(&dead));
    assert!(!frontier.entry(&dead).unwrap().unwrap().processed);

    server.verify().await;
}

#[tokio::test]
async fn test_controller_conditions() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(String::new()).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let (engine, _) = create_engine(10);
    let controller = CrawlController::new(engine);

    assert_eq!(controller.status().unwrap_err(), ControlError::NothingRunning);
    assert!(matches!(
        controller.start("not a url"),
        Err(ControlError::InvalidSeed { .. })
    ));

    let seed = format!("{}/", base);
    let crawl = controller.start(&seed).expect("first start should succeed");
    assert_eq!(
        controller.start(&seed).unwrap_err(),
        ControlError::AlreadyRunning
    );

    let status = controller.status().expect("crawl is running");
    assert_eq!(status.status, EngineStatus::Active);
    assert!(status.known.contains(&seed));

    controller.stop().await;
    controller.stop().await;
    crawl.await.unwrap();
    assert_eq!(controller.status().unwrap_err(), ControlError::NothingRunning);

    // The engine can be reused once free
    let again = controller.start(&seed).expect("engine should be free again");
    again.await.unwrap();
    assert!(controller.engine().is_available());
    assert!(controller.engine().frontier().snapshot().unwrap().pending.is_empty());
}
