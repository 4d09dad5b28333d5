//! Integration tests for the producer and consumer roles
//!
//! Pages are served by wiremock and the broker is replaced by an in-memory
//! queue, so publish and acknowledgment order can be checked exactly.

use linkrelay::config::{HttpConfig, StepConfig};
use linkrelay::crawler::{build_http_client, CrawlStep};
use linkrelay::queue::{MemoryQueue, Publisher, QueueEvent};
use linkrelay::roles::{Consumer, ConsumerExit, Producer, WorkerState};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IDLE: Duration = Duration::from_millis(100);

fn step(config: StepConfig) -> CrawlStep {
    let client = build_http_client(&HttpConfig::default()).expect("Failed to build client");
    CrawlStep::new(
        client,
        &StepConfig {
            timeout_secs: 5,
            ..config
        },
    )
    .expect("Failed to build crawl step")
}

async fn serve(server: &MockServer, route: &str, html: &str, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html"),
        )
        .expect(expected_hits)
        .mount(server)
        .await;
}

fn page_url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).expect("Failed to parse page URL")
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

#[tokio::test]
async fn test_producer_publishes_internal_links() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="http://other.test/">Out</a><a href="/b">B</a>"#,
        1,
    )
    .await;

    let queue = MemoryQueue::new();
    let producer = Producer::new(step(StepConfig::producer()), &queue);
    let summary = producer.run(&page_url(&server, "/")).await;

    let base = server.uri();
    assert_eq!(
        queue.messages(),
        vec![format!("{}/a", base), format!("{}/b", base)]
    );
    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.published, 2);
}

#[tokio::test]
async fn test_producer_with_404_seed_publishes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let queue = MemoryQueue::new();
    let producer = Producer::new(step(StepConfig::producer()), &queue);
    let summary = producer.run(&page_url(&server, "/seed")).await;

    assert!(queue.events().is_empty());
    assert_eq!(summary.published, 0);
}

#[tokio::test]
async fn test_producer_logs_and_continues_on_publish_failure() {
    let server = MockServer::start().await;
    serve(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#, 1).await;

    let queue = MemoryQueue::new();
    queue.set_publish_failure(true);
    let producer = Producer::new(step(StepConfig::producer()), &queue);
    let summary = producer.run(&page_url(&server, "/")).await;

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.publish_failures, 2);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_consumer_page_without_links_acks_once() {
    let server = MockServer::start().await;
    serve(&server, "/about", "<html><body>Nothing to see</body></html>", 1).await;

    let queue = MemoryQueue::new();
    let about = page_url(&server, "/about");
    queue.publish(&about).await.unwrap();

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(exit, ConsumerExit::Drained);
    assert_eq!(
        queue.events(),
        vec![
            QueueEvent::Published(about.to_string()),
            QueueEvent::Delivered(about.as_str().as_bytes().to_vec()),
            QueueEvent::Acked(about.as_str().as_bytes().to_vec()),
        ]
    );
    assert_eq!(
        consumer.history(),
        &[
            WorkerState::Idle,
            WorkerState::Processing,
            WorkerState::Publishing,
            WorkerState::Acknowledging,
            WorkerState::Idle,
            WorkerState::Drained,
        ]
    );
    assert_eq!(consumer.summary().deliveries, 1);
    assert_eq!(consumer.summary().published, 0);
}

#[tokio::test]
async fn test_consumer_acks_only_after_all_publishes() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/index",
        r#"<a href="/one">1</a><a href="/two">2</a><img href="/three.png">"#,
        1,
    )
    .await;
    serve(&server, "/one", "<p>leaf</p>", 1).await;
    serve(&server, "/two", "<p>leaf</p>", 1).await;
    serve(&server, "/three.png", "", 1).await;

    let queue = MemoryQueue::new();
    let index = page_url(&server, "/index");
    queue.push_raw(index.as_str().as_bytes().to_vec());

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer.run(&mut source, never()).await.unwrap();
    assert_eq!(exit, ConsumerExit::Drained);

    let events = queue.events();
    let index_body = index.as_str().as_bytes().to_vec();
    let ack = events
        .iter()
        .position(|e| *e == QueueEvent::Acked(index_body.clone()))
        .expect("index was never acknowledged");

    for child in ["/one", "/two", "/three.png"] {
        let published = QueueEvent::Published(page_url(&server, child).to_string());
        let position = events
            .iter()
            .position(|e| *e == published)
            .unwrap_or_else(|| panic!("{} was never published", child));
        assert!(position < ack, "{} published after the ack", child);
    }

    assert_eq!(consumer.summary().deliveries, 4);
    assert_eq!(consumer.summary().published, 3);
}

#[tokio::test]
async fn test_producer_then_consumer_drains_acyclic_site() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"<title>Home</title><a href="/docs">Docs</a><a href="https://elsewhere.test/">Out</a>"#,
        1,
    )
    .await;
    serve(
        &server,
        "/docs",
        r#"<a href="/docs/a">A</a><a href="/docs/b">B</a>"#,
        1,
    )
    .await;
    serve(&server, "/docs/a", "<p>a</p>", 1).await;
    serve(&server, "/docs/b", "<p>b</p>", 1).await;

    let queue = MemoryQueue::new();

    let producer = Producer::new(step(StepConfig::producer()), &queue);
    producer.run(&page_url(&server, "/")).await;
    assert_eq!(queue.len(), 1);

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(exit, ConsumerExit::Drained);
    assert!(queue.is_empty());
    assert_eq!(consumer.summary().deliveries, 3);
    assert_eq!(consumer.summary().published, 2);
}

#[tokio::test]
async fn test_rediscovered_links_are_republished() {
    let server = MockServer::start().await;
    serve(&server, "/a", r#"<a href="/b">B</a><a href="/b">B again</a>"#, 1).await;
    serve(&server, "/b", "<p>leaf</p>", 2).await;

    let queue = MemoryQueue::new();
    queue.push_raw(page_url(&server, "/a").as_str().as_bytes().to_vec());

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(consumer.summary().deliveries, 3);
}

#[tokio::test]
async fn test_consumer_rejects_malformed_messages_and_continues() {
    let server = MockServer::start().await;
    serve(&server, "/ok", "<p>fine</p>", 1).await;

    let queue = MemoryQueue::new();
    queue.push_raw(b"not a url".to_vec());
    queue.push_raw(vec![0xff, 0xfe]);
    queue.push_raw(page_url(&server, "/ok").as_str().as_bytes().to_vec());

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(exit, ConsumerExit::Drained);
    assert_eq!(consumer.summary().rejected, 2);
    assert_eq!(consumer.summary().deliveries, 3);

    let events = queue.events();
    assert!(events.contains(&QueueEvent::Rejected(b"not a url".to_vec())));
    assert!(events.contains(&QueueEvent::Rejected(vec![0xff, 0xfe])));
    assert!(events
        .iter()
        .any(|e| matches!(e, QueueEvent::Acked(body) if body.ends_with(b"/ok"))));
}

#[tokio::test]
async fn test_consumer_acks_even_when_publishing_fails() {
    let server = MockServer::start().await;
    serve(&server, "/index", r#"<a href="/lost">Lost</a>"#, 1).await;

    let queue = MemoryQueue::new();
    let index = page_url(&server, "/index");
    queue.push_raw(index.as_str().as_bytes().to_vec());
    queue.set_publish_failure(true);

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(exit, ConsumerExit::Drained);
    assert_eq!(consumer.summary().publish_failures, 1);
    assert_eq!(
        queue.events().last(),
        Some(&QueueEvent::Acked(index.as_str().as_bytes().to_vec()))
    );
}

#[tokio::test]
async fn test_consumer_fetch_failure_still_acks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let queue = MemoryQueue::new();
    let url = page_url(&server, "/down");
    queue.push_raw(url.as_str().as_bytes().to_vec());

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(
        queue.events().last(),
        Some(&QueueEvent::Acked(url.as_str().as_bytes().to_vec()))
    );
    assert_eq!(consumer.summary().published, 0);
}

#[tokio::test]
async fn test_consumer_stops_on_shutdown_without_consuming() {
    let queue = MemoryQueue::new();
    queue.push_raw(b"http://a.test/".to_vec());

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer
        .run(&mut source, std::future::ready(()))
        .await
        .unwrap();

    assert_eq!(exit, ConsumerExit::Interrupted);
    assert_eq!(queue.len(), 1);
    assert_eq!(consumer.state(), WorkerState::Idle);
}

#[tokio::test]
async fn test_consumer_receives_message_published_while_idle() {
    let server = MockServer::start().await;
    serve(&server, "/late", "<p>late</p>", 1).await;

    let queue = MemoryQueue::new();
    let late = page_url(&server, "/late");
    let publisher = queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        publisher.publish(&late).await.unwrap();
    });

    let mut source = queue.subscribe();
    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, IDLE);
    let exit = consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(exit, ConsumerExit::Drained);
    assert_eq!(consumer.summary().deliveries, 1);
}

#[tokio::test]
async fn test_consumer_reports_closed_source() {
    let queue = MemoryQueue::new();
    let mut source = queue.subscribe();
    queue.close();

    let mut consumer = Consumer::new(step(StepConfig::consumer()), &queue, Duration::from_secs(5));
    let exit = consumer.run(&mut source, never()).await.unwrap();

    assert_eq!(exit, ConsumerExit::SourceClosed);
}
