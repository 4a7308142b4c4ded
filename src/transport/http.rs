// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! reqwest-backed [`RequestPrimitive`].

use std::time::Duration;

use async_trait::async_trait;

use super::{Method, Payload, RawResponse, Request, RequestPrimitive};
use crate::error::TransportFailure;

/// Production request primitive over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestPrimitive {
    client: reqwest::Client,
}

impl ReqwestPrimitive {
    pub fn new(
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportFailure> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                TransportFailure::InvalidRequest(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client, keeping its settings.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_error(e: reqwest::Error) -> TransportFailure {
    if e.is_builder() || e.is_redirect() || e.is_decode() {
        TransportFailure::InvalidRequest(e.to_string())
    } else if e.is_timeout() {
        TransportFailure::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportFailure::Connect(e.to_string())
    } else {
        TransportFailure::Io(e.to_string())
    }
}

#[async_trait]
impl RequestPrimitive for ReqwestPrimitive {
    async fn execute(&self, request: &Request) -> Result<RawResponse, TransportFailure> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match &request.body {
            Some(Payload::Json(value)) => builder.json(value),
            Some(Payload::Binary(bytes)) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        // A body that dies halfway is a transport failure, not a short answer
        let body = response.bytes().await.map_err(map_error)?;

        tracing::trace!(
            method = %request.method,
            url = %request.url,
            status,
            bytes = body.len(),
            "response received"
        );
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
