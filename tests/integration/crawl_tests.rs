//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! download, analyze and process cycle end-to-end through the reqwest transport.

use ripple_engine::config::{CrawlerConfig, UserAgentConfig};
use ripple_engine::crawler::{
    build_http_client, html_link_parser, ItemProcessor, PageItem, Scheduler,
};
use ripple_engine::{CrawlError, ErrorKind, Request};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn create_crawler_config(max_depth: u32) -> CrawlerConfig {
    CrawlerConfig {
        queue_capacity: 16,
        pool_size: 3,
        max_depth,
        fail_fast: false,
    }
}

async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    "<html><head><title>{}</title></head><body>{}</body></html>",
                    title, anchors
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Records every page that reaches the end of the pipeline
fn collector(pages: Arc<Mutex<Vec<PageItem>>>) -> ItemProcessor<PageItem> {
    Arc::new(move |page: &PageItem| {
        pages.lock().unwrap().push(page.clone());
        Ok(Some(page.clone()))
    })
}

/// Runs a crawl to idle, draining the error stream while waiting
async fn crawl(
    config: CrawlerConfig,
    seed: &str,
    processors: Vec<ItemProcessor<PageItem>>,
) -> (Scheduler<reqwest::Client, PageItem>, Vec<CrawlError>) {
    let client = build_http_client(&create_user_agent()).expect("Failed to build client");
    let mut scheduler = Scheduler::new();

    scheduler
        .start(
            &config,
            move || client.clone(),
            vec![Some(html_link_parser())],
            processors,
            Request::parse(seed).expect("Failed to parse seed"),
        )
        .await
        .expect("Failed to start scheduler");

    let errors = scheduler.error_stream().expect("Failed to get error stream");
    let mut collected = Vec::new();

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            while let Some(error) = errors.try_next() {
                collected.push(error);
            }
            if scheduler.idle() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Crawl did not go idle");

    scheduler.shutdown().await;
    (scheduler, collected)
}

#[tokio::test]
async fn test_full_crawl_respects_depth_limit() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "Home", &["/a", "/b", "/missing"]).await;
    mount_page(&mock_server, "/a", "Page A", &["/c"]).await;
    mount_page(&mock_server, "/b", "Page B", &[]).await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Depth 2: must never be fetched
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let pages = Arc::new(Mutex::new(Vec::new()));
    let (scheduler, errors) = crawl(
        create_crawler_config(1),
        &format!("{}/", base_url),
        vec![collector(Arc::clone(&pages))],
    )
    .await;

    let mut crawled: Vec<(String, u32)> = pages
        .lock()
        .unwrap()
        .iter()
        .map(|page| (page.url.trim_start_matches(&base_url).to_string(), page.depth))
        .collect();
    crawled.sort();
    assert_eq!(
        crawled,
        vec![
            ("/".to_string(), 0),
            ("/a".to_string(), 1),
            ("/b".to_string(), 1)
        ]
    );

    // The 404 page surfaces as one analyzer error
    assert_eq!(errors.len(), 1, "unexpected errors: {:?}", errors);
    assert_eq!(errors[0].kind(), ErrorKind::Analyze);
    assert!(errors[0].to_string().contains("404"));

    let counts = scheduler.pipeline().unwrap().count();
    assert_eq!(counts.sent, 3);
    assert_eq!(counts.processed, 3);
}

#[tokio::test]
async fn test_crawl_with_depth_zero_fetches_seed_only() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", "Home", &["/next"]).await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let pages = Arc::new(Mutex::new(Vec::new()));
    let (_, errors) = crawl(
        create_crawler_config(0),
        &format!("{}/", base_url),
        vec![collector(Arc::clone(&pages))],
    )
    .await;

    assert!(errors.is_empty());
    let pages = pages.lock().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title.as_deref(), Some("Home"));
    assert_eq!(pages[0].links, vec![format!("{}/next", base_url)]);
}

#[tokio::test]
async fn test_processor_errors_with_fail_fast() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_page(&mock_server, "/", "Home", &[]).await;

    let pages = Arc::new(Mutex::new(Vec::new()));
    let reject: ItemProcessor<PageItem> = Arc::new(|_: &PageItem| anyhow::bail!("storage full"));
    let config = CrawlerConfig {
        fail_fast: true,
        ..create_crawler_config(0)
    };

    let (scheduler, errors) = crawl(
        config,
        &format!("{}/", base_url),
        vec![reject, collector(Arc::clone(&pages))],
    )
    .await;

    assert!(pages.lock().unwrap().is_empty(), "chain should halt");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::ItemProcess);

    let counts = scheduler.pipeline().unwrap().count();
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.processed, 0);
}

#[tokio::test]
async fn test_unreachable_seed_reports_download_error() {
    // Bind and immediately release a port so nothing is listening on it
    let address = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let (scheduler, errors) = crawl(
        create_crawler_config(1),
        &format!("http://{}/", address),
        Vec::new(),
    )
    .await;

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::Download);
    assert_eq!(scheduler.pipeline().unwrap().count().sent, 0);
}

#[tokio::test]
async fn test_page_with_more_links_than_queue_capacity() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let children: Vec<String> = (0..20).map(|n| format!("/page{}", n)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    mount_page(&mock_server, "/", "Hub", &child_refs).await;
    for child in &children {
        mount_page(&mock_server, child, "Leaf", &[]).await;
    }

    let pages = Arc::new(Mutex::new(Vec::new()));
    let config = CrawlerConfig {
        queue_capacity: 2,
        pool_size: 1,
        ..create_crawler_config(1)
    };
    let (_, errors) = crawl(
        config,
        &format!("{}/", base_url),
        vec![collector(Arc::clone(&pages))],
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(pages.lock().unwrap().len(), 21);
}
