//! The reqwest primitive against a mock HTTP service.
//!
//! Mocks with `.expect(n)` are verified when the server drops, so a status
//! that got retried fails the test even if the client result looks right.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{id_response, make_hash, test_config};
use tagstorm::{
    ClientError, MutationOutcome, Request, ReqwestPrimitive, ResilientTransport, ResultVariant,
    RetryPolicy, SearchOperator, SearchQuery, SearchSelect, TagStormClient, TransportError,
    TransportFailure,
};

fn client_for(url: &str) -> TagStormClient<ReqwestPrimitive> {
    let mut config = test_config(url);
    config.token = Some("secret".to_string());
    TagStormClient::connect(config).unwrap()
}

#[tokio::test]
async fn test_search_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search_images"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({"select": ["id"], "operator": {"tag": 4}})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(id_response(&[10, 20])))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server.uri())
        .search(&SearchQuery::new([SearchSelect::Id]).operator(SearchOperator::tag(4)))
        .await
        .unwrap();

    assert_eq!(result, ResultVariant::IdList(vec![10, 20]));
}

#[tokio::test]
async fn test_conflict_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/add_tag"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client_for(&server.uri()).add_tag("cat").await.unwrap();
    assert_eq!(outcome, MutationOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_server_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server.uri()).list_tags().await.unwrap_err();
    assert!(matches!(err, ClientError::Remote { status: 500, ref body } if body == "boom"));
}

#[tokio::test]
async fn test_image_bytes_with_size_param() {
    let server = MockServer::start().await;
    let hash = make_hash(0x3c);
    Mock::given(method("GET"))
        .and(path(format!("/images/{}", hash)))
        .and(query_param("size", "64"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16]))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = client_for(&server.uri())
        .fetch_image_bytes(&hash, Some(64))
        .await
        .unwrap();
    assert_eq!(bytes, Some(vec![7u8; 16]));
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries() {
    // Grab a free port, then close it so nothing is listening
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = client_for(&format!("http://{}", addr));

    let err = client.list_tags().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(TransportError::RetriesExhausted {
            attempts: 4,
            last: TransportFailure::Connect(_),
        })
    ));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.request_timeout_ms = 50;
    let client = TagStormClient::connect(config).unwrap();

    let err = client.list_tags().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::RetriesExhausted {
            attempts: 4,
            last: TransportFailure::Timeout(_),
        })
    ));
}

#[tokio::test]
async fn test_bad_header_value_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let primitive =
        ReqwestPrimitive::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
    let transport = ResilientTransport::new(primitive, RetryPolicy::new(4, Duration::from_millis(1)));
    // A newline is not a legal header byte, so the request never leaves the builder
    let request =
        Request::get(format!("{}/api/tags", server.uri())).bearer(Some("tok\nen".to_string()));

    let err = transport.send(&request).await.unwrap_err();

    assert!(matches!(
        err,
        TransportError::NotRetryable {
            attempts: 1,
            failure: TransportFailure::InvalidRequest(_),
        }
    ));
}
