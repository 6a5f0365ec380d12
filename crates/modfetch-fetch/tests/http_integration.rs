//! Exercises [`modfetch_fetch::http::ReqwestClient`] against a real HTTP
//! server (via `wiremock`) rather than the hand-rolled `HttpClient` stubs
//! the unit tests use — the one seam in this crate that talks to an actual
//! socket and is worth covering end-to-end.

use futures_util::StreamExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use modfetch_fetch::http::{HttpClient, ReqwestClient};

fn client() -> ReqwestClient {
    ReqwestClient::new(std::time::Duration::from_secs(5), "modfetch-test/0.0").unwrap()
}

#[tokio::test]
async fn head_reports_content_length_and_accept_ranges() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/model.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .insert_header("content-length", "1024")
                .insert_header("etag", "\"abc123\""),
        )
        .mount(&server)
        .await;

    let url = format!("{}/model.bin", server.uri());
    let info = client().head(&url, &[]).await.unwrap();

    assert_eq!(info.status, 200);
    assert_eq!(info.content_length, Some(1024));
    assert!(info.accept_ranges);
    assert_eq!(info.etag.as_deref(), Some("\"abc123\""));
}

#[tokio::test]
async fn ranged_get_returns_206_with_requested_slice() {
    let server = MockServer::start().await;
    let body = b"0123456789".to_vec();
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .and(header("range", "bytes=2-5"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 2-5/10")
                .set_body_bytes(body[2..=5].to_vec()),
        )
        .mount(&server)
        .await;

    let url = format!("{}/model.bin", server.uri());
    let mut response = client().get(&url, &[], Some((2, Some(5)))).await.unwrap();

    assert_eq!(response.status, 206);
    assert_eq!(response.content_range_total, Some(10));

    let mut received = Vec::new();
    while let Some(chunk) = response.body.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, b"2345");
}

#[tokio::test]
async fn get_surfaces_retry_after_on_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .mount(&server)
        .await;

    let url = format!("{}/model.bin", server.uri());
    let response = client().get(&url, &[], None).await.unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(response.retry_after, Some(std::time::Duration::from_secs(3)));
}

#[tokio::test]
async fn head_passes_through_custom_headers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/gated.bin"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "5"))
        .mount(&server)
        .await;

    let url = format!("{}/gated.bin", server.uri());
    let headers = vec![("Authorization".to_string(), "Bearer test-token".to_string())];
    let info = client().head(&url, &headers).await.unwrap();

    assert_eq!(info.status, 200);
}
