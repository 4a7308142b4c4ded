// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the client runtime.
//!
//! Three layers, three enums. `ProtocolError` is what the codec says about
//! bytes: they will never get better, so nobody retries them.
//! `TransportFailure` is one failed attempt at getting bytes at all, and is
//! the only thing the retry loop looks at. `TransportError` is what the retry
//! loop hands back once it gives up. `ClientError` wraps all of it for the
//! facade, plus the one thing only the facade can judge: a status code the
//! caller didn't want.
//!
//! Note what is missing: "already exists" (409) is not an error anywhere.
//! Mutations report it as [`crate::client::MutationOutcome::AlreadyExists`].

use thiserror::Error;

/// Decode failures. Pure functions of the input bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Bad magic, reserved flag bits, or an unknown union tag.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The buffer ends before the structure it declares.
    #[error("truncated payload at byte {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// Bytes are present but don't mean anything valid (bad UTF-8, unknown tag name, ...).
    #[error("malformed payload at byte {offset}: {reason}")]
    MalformedPayload { offset: usize, reason: String },
}

impl ProtocolError {
    pub(crate) fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::TruncatedPayload {
            offset,
            needed,
            remaining,
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            offset,
            reason: reason.into(),
        }
    }
}

/// A single attempt that never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Anything else below HTTP: reset mid-body, TLS, DNS.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The request itself is unusable (bad header value, bad URL, redirect
    /// policy). Sending it again fails the same way.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportFailure {
    /// Connection errors, timeouts and I/O are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

/// What the resilient transport returns when it could not get a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: TransportFailure,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// A failure that retrying can't fix, returned on the attempt it happened.
    #[error("request failed on attempt {attempts}: {failure}")]
    NotRetryable {
        attempts: u32,
        failure: TransportFailure,
    },
}

impl TransportError {
    /// Number of attempts that were actually sent.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. }
            | Self::Cancelled { attempts }
            | Self::NotRetryable { attempts, .. } => *attempts,
        }
    }
}

/// Errors surfaced by [`crate::client::TagStormClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A received response the operation can't treat as success.
    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("invalid JSON from service: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ClientError {
    /// Status code for `Remote` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration loading/validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
