use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use partdec_core::source::probe;

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn probe_reports_resumable_server_with_filename() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .insert_header("Content-Length", "5242880")
                .insert_header("Content-Disposition", "attachment; filename=\"testfile.bin\""),
        )
        .mount(&server)
        .await;

    let client = Client::new();
    let result = probe(&client, &server.uri(), &HeaderMap::new(), timeout()).await.unwrap();

    assert!(result.resumable);
    assert_eq!(result.size, 5242880);
    assert_eq!(result.filename.as_deref(), Some("testfile.bin"));
}

#[tokio::test]
async fn probe_reports_non_resumable_server_without_accept_ranges() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "2048"))
        .mount(&server)
        .await;

    let client = Client::new();
    let result = probe(&client, &server.uri(), &HeaderMap::new(), timeout()).await.unwrap();

    assert!(!result.resumable);
    assert_eq!(result.size, 2048);
}

#[tokio::test]
async fn probe_falls_back_to_get_when_head_has_no_length() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .insert_header("Content-Length", "10"),
        )
        .mount(&server)
        .await;

    let client = Client::new();
    let url = format!("{}/archive.tar.gz", server.uri());
    let result = probe(&client, &url, &HeaderMap::new(), timeout()).await.unwrap();

    assert!(result.resumable);
    assert_eq!(result.size, 10);
    assert_eq!(result.filename.as_deref(), Some("archive.tar.gz"));
}

#[tokio::test]
async fn probe_network_error_surfaces_as_err() {
    let client = Client::new();
    let result = probe(&client, "http://127.0.0.1:1", &HeaderMap::new(), timeout()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn probe_reports_unknown_size_when_no_length_anywhere() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let client = Client::new();
    let result = probe(&client, &server.uri(), &HeaderMap::new(), timeout()).await.unwrap();

    assert_eq!(result.size, partdec_core::range::UNKNOWN_SIZE);
    assert!(!result.resumable);
}
