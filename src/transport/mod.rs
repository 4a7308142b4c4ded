// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Request transport with bounded retry.
//!
//! The split is deliberate about what counts as failure. A [`RequestPrimitive`]
//! either produces an HTTP response (any status at all) or a
//! [`TransportFailure`]. Only the latter is retried. A 409, a 404, a 500: those
//! are answers, and the service gave them on purpose. Retrying a 500 would
//! just ask the same question again and maybe apply a mutation twice.
//!
//! Backoff is `base * 2^i` with no jitter and no sleep after the last attempt.
//! With the defaults that's 1s, 2s, 4s: four attempts, seven seconds.

mod cancel;
#[cfg(feature = "http")]
mod http;

pub use cancel::CancelToken;
#[cfg(feature = "http")]
pub use http::ReqwestPrimitive;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TransportError, TransportFailure};

// ============================================================================
// REQUESTS AND RESPONSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

/// A request, independent of the HTTP stack that will carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Payload>,
    pub bearer: Option<String>,
    /// Overrides the primitive's default timeout for this request
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(Payload::Json(body));
        self
    }

    pub fn binary(mut self, body: Vec<u8>) -> Self {
        self.body = Some(Payload::Binary(body));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A response as received: status and body bytes, nothing interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 409: the service already has what a mutation asked for.
    pub fn is_already_exists(&self) -> bool {
        self.status == 409
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Body as text, lossy. For error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ============================================================================
// REQUEST PRIMITIVE
// ============================================================================

/// One HTTP exchange, no retries.
///
/// Implementations must return `Ok` for every response they receive,
/// whatever the status, and `Err` only when no response arrived.
#[async_trait]
pub trait RequestPrimitive: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<RawResponse, TransportFailure>;
}

#[async_trait]
impl<P: RequestPrimitive + ?Sized> RequestPrimitive for Arc<P> {
    async fn execute(&self, request: &Request) -> Result<RawResponse, TransportFailure> {
        (**self).execute(request).await
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy always allows at least one attempt.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Sleep after the failure of zero-based attempt `i`.
    pub fn delay_for(&self, i: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(i))
    }

    /// Sum of all sleeps when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts - 1)
            .map(|i| self.delay_for(i))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Retries transport failures of a [`RequestPrimitive`] under a [`RetryPolicy`].
///
/// Only [`TransportFailure::is_retryable`] failures are retried.
#[derive(Debug, Clone)]
pub struct ResilientTransport<P> {
    primitive: P,
    policy: RetryPolicy,
}

impl<P: RequestPrimitive> ResilientTransport<P> {
    pub fn new(primitive: P, policy: RetryPolicy) -> Self {
        Self { primitive, policy }
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send with retry. Any received response is returned as-is.
    pub async fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.run(request, None).await
    }

    /// Like [`send`](Self::send), but gives up early once `cancel` fires.
    ///
    /// The token is checked before every attempt and raced against every
    /// backoff sleep. An attempt already in flight is not interrupted.
    pub async fn send_with_cancel(
        &self,
        request: &Request,
        cancel: &CancelToken,
    ) -> Result<RawResponse, TransportError> {
        self.run(request, Some(cancel)).await
    }

    async fn run(
        &self,
        request: &Request,
        cancel: Option<&CancelToken>,
    ) -> Result<RawResponse, TransportError> {
        let max = self.policy.max_attempts;
        let mut attempts = 0u32;

        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(TransportError::Cancelled { attempts });
            }

            attempts += 1;
            let failure = match self.primitive.execute(request).await {
                Ok(response) => {
                    if attempts > 1 {
                        tracing::debug!(
                            method = %request.method,
                            url = %request.url,
                            attempts,
                            status = response.status,
                            "request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            if !failure.is_retryable() {
                tracing::error!(
                    method = %request.method,
                    url = %request.url,
                    attempts,
                    error = %failure,
                    "request failed, not retryable"
                );
                return Err(TransportError::NotRetryable { attempts, failure });
            }

            if attempts >= max {
                tracing::error!(
                    method = %request.method,
                    url = %request.url,
                    attempts,
                    error = %failure,
                    "request failed, retries exhausted"
                );
                return Err(TransportError::RetriesExhausted {
                    attempts,
                    last: failure,
                });
            }

            let delay = self.policy.delay_for(attempts - 1);
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %failure,
                "request failed, will retry"
            );

            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => {
                            return Err(TransportError::Cancelled { attempts });
                        }
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}
