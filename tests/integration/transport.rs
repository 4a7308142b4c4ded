//! Retry behavior of [`ResilientTransport`] under tokio's paused clock.
//!
//! With the clock paused, sleeps auto-advance the moment every task is idle,
//! so a full 1s/2s/4s schedule runs instantly and `Instant::elapsed` reports
//! the virtual time spent backing off.

use std::time::Duration;

use crate::common::{ok, status, ScriptedPrimitive};
use tagstorm::{
    CancelToken, Method, Request, ResilientTransport, RetryPolicy, TransportError,
    TransportFailure,
};
use tokio::time::Instant;

fn transport(primitive: &ScriptedPrimitive) -> ResilientTransport<ScriptedPrimitive> {
    ResilientTransport::new(primitive.clone(), RetryPolicy::default())
}

fn request() -> Request {
    Request::get("http://tagstorm.test/api/tags")
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_final_attempt() {
    let primitive = ScriptedPrimitive::new().fail_times(3).respond(ok(b"[]".to_vec()));
    let start = Instant::now();

    let response = transport(&primitive).send(&request()).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(primitive.calls(), 4);
    // 1s + 2s + 4s between the four attempts
    assert!(start.elapsed() >= Duration::from_secs(7));
    assert!(start.elapsed() < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_sent_once() {
    let primitive = ScriptedPrimitive::new()
        .fail(TransportFailure::Connect("refused".into()))
        .fail(TransportFailure::InvalidRequest("builder error".into()))
        .respond(ok(b"never reached".to_vec()));
    let start = Instant::now();

    let err = transport(&primitive).send(&request()).await.unwrap_err();

    assert_eq!(
        err,
        TransportError::NotRetryable {
            attempts: 2,
            failure: TransportFailure::InvalidRequest("builder error".into()),
        }
    );
    assert_eq!(primitive.calls(), 2);
    // Only the backoff after the connect failure
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_reraises_last_failure() {
    let primitive = ScriptedPrimitive::new()
        .fail_times(3)
        .fail(TransportFailure::Timeout("read timed out".into()))
        .respond(ok(b"never reached".to_vec()));
    let start = Instant::now();

    let err = transport(&primitive).send(&request()).await.unwrap_err();

    assert_eq!(
        err,
        TransportError::RetriesExhausted {
            attempts: 4,
            last: TransportFailure::Timeout("read timed out".into()),
        }
    );
    assert_eq!(primitive.calls(), 4);
    // No sleep after the last attempt
    assert!(start.elapsed() < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_error_statuses_are_not_retried() {
    for code in [404u16, 409, 500, 503] {
        let primitive = ScriptedPrimitive::new().respond(status(code));
        let start = Instant::now();
        let response = transport(&primitive).send(&request()).await.unwrap();
        assert_eq!(response.status, code);
        assert_eq!(primitive.calls(), 1, "status {code} must not be retried");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn test_same_request_is_resent() {
    let primitive = ScriptedPrimitive::new().fail_times(1).respond(ok(Vec::new()));
    let request = Request::post("http://tagstorm.test/api/search_images")
        .json(serde_json::json!({"select": ["id"]}));

    transport(&primitive).send(&request).await.unwrap();

    let sent = primitive.requests();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[1].method, Method::Post);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let primitive = ScriptedPrimitive::new().fail_times(4);
    let transport = transport(&primitive);
    let cancel = CancelToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            // Lands inside the 2s sleep after the second attempt
            tokio::time::sleep(Duration::from_millis(1500)).await;
            cancel.cancel();
        })
    };

    let start = Instant::now();
    let err = transport
        .send_with_cancel(&request(), &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err, TransportError::Cancelled { attempts: 2 });
    assert_eq!(primitive.calls(), 2);
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_attempt() {
    let primitive = ScriptedPrimitive::new().respond(ok(Vec::new()));
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = transport(&primitive)
        .send_with_cancel(&request(), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Cancelled { attempts: 0 });
    assert_eq!(err.attempts(), 0);
    assert_eq!(primitive.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy_single_attempt() {
    let primitive = ScriptedPrimitive::new().fail_times(1);
    let transport = ResilientTransport::new(
        primitive.clone(),
        RetryPolicy::new(1, Duration::from_millis(10)),
    );
    let err = transport.send(&request()).await.unwrap_err();
    assert_eq!(err.attempts(), 1);
    assert_eq!(primitive.calls(), 1);
}
