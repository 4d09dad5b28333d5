//! Integration tests for the crawl step
//!
//! These tests use wiremock to serve pages and check which links one crawl
//! step yields.

use linkrelay::config::{HttpConfig, StepConfig};
use linkrelay::crawler::{build_http_client, CrawlStep};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn step(config: StepConfig) -> CrawlStep {
    let client = build_http_client(&HttpConfig::default()).expect("Failed to build client");
    CrawlStep::new(client, &config).expect("Failed to build crawl step")
}

fn producer_step() -> CrawlStep {
    step(StepConfig {
        timeout_secs: 5,
        ..StepConfig::producer()
    })
}

fn consumer_step() -> CrawlStep {
    step(StepConfig {
        timeout_secs: 5,
        ..StepConfig::consumer()
    })
}

async fn serve(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn page_url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).expect("Failed to parse page URL")
}

async fn crawl(step: &CrawlStep, url: &Url) -> Vec<String> {
    step.crawl(url).await.map(|u| u.to_string()).collect()
}

#[tokio::test]
async fn test_internal_relative_link_kept_external_dropped() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/index",
        r#"<html><head><title>Index</title></head><body>
            <a href="/about">About</a>
            <a href="http://other.test/x">Elsewhere</a>
        </body></html>"#,
    )
    .await;

    let index = page_url(&server, "/index");
    let links = crawl(&producer_step(), &index).await;

    assert_eq!(links, vec![format!("{}/about", server.uri())]);
}

#[tokio::test]
async fn test_page_without_matching_tags_yields_nothing() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/plain",
        r#"<html><body><p>No links here</p><img src="/pic.png"></body></html>"#,
    )
    .await;

    let links = crawl(&producer_step(), &page_url(&server, "/plain")).await;
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_relative_forms_resolve_against_page_url() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/docs/guide/intro",
        r##"<html><body>
            <a href="next">Next</a>
            <a href="../reference">Reference</a>
            <a href="?page=2">Page 2</a>
            <a href="#install">Install</a>
            <a href="/root">Root</a>
        </body></html>"##,
    )
    .await;

    let base = server.uri();
    let links = crawl(&producer_step(), &page_url(&server, "/docs/guide/intro")).await;

    assert_eq!(
        links,
        vec![
            format!("{}/docs/guide/next", base),
            format!("{}/docs/reference", base),
            format!("{}/docs/guide/intro?page=2", base),
            format!("{}/docs/guide/intro#install", base),
            format!("{}/root", base),
        ]
    );
}

#[tokio::test]
async fn test_repeated_links_yield_once_per_occurrence() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"<a href="/same">One</a><a href="/same">Two</a><a href="/same">Three</a>"#,
    )
    .await;

    let links = crawl(&producer_step(), &page_url(&server, "/")).await;
    assert_eq!(links.len(), 3);
}

#[tokio::test]
async fn test_non_link_schemes_are_out_of_scope() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"<a href="mailto:me@example.com">Mail</a>
           <a href="javascript:void(0)">JS</a>
           <a href="tel:+123">Call</a>
           <a href="/ok">Ok</a>"#,
    )
    .await;

    let links = crawl(&producer_step(), &page_url(&server, "/")).await;
    assert_eq!(links, vec![format!("{}/ok", server.uri())]);
}

#[tokio::test]
async fn test_404_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"<a href="/x">x</a>"#))
        .mount(&server)
        .await;

    let links = crawl(&producer_step(), &page_url(&server, "/missing")).await;
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_server_error_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let links = crawl(&consumer_step(), &page_url(&server, "/")).await;
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_transport_error_yields_nothing() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        listener.local_addr().expect("No local addr").port()
    };
    let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();

    let links = crawl(&producer_step(), &url).await;
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_timeout_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/x">x</a>"#)
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let quick = step(StepConfig {
        timeout_secs: 1,
        ..StepConfig::producer()
    });
    let links = crawl(&quick, &page_url(&server, "/")).await;
    assert!(links.is_empty());
}

#[tokio::test]
async fn test_allowlists_differ_between_roles() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/media",
        r#"<html><body>
            <a href="/page">Page</a>
            <img href="/pic.png">
            <video href="/clip.mp4"></video>
        </body></html>"#,
    )
    .await;

    let url = page_url(&server, "/media");
    let base = server.uri();

    let seeded = crawl(&producer_step(), &url).await;
    assert_eq!(seeded, vec![format!("{}/page", base)]);

    let propagated = crawl(&consumer_step(), &url).await;
    assert_eq!(
        propagated,
        vec![
            format!("{}/page", base),
            format!("{}/pic.png", base),
            format!("{}/clip.mp4", base),
        ]
    );
}

#[tokio::test]
async fn test_absolute_link_to_same_host_is_internal() {
    let server = MockServer::start().await;
    let base = server.uri();
    serve(
        &server,
        "/",
        &format!(r#"<a href="{}/absolute">Absolute</a>"#, base),
    )
    .await;

    let links = crawl(&producer_step(), &page_url(&server, "/")).await;
    assert_eq!(links, vec![format!("{}/absolute", base)]);
}
