// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Client runtime for the tagstorm image-tagging service.
//!
//! Three independent pieces and one facade that composes them:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    client (TagStormClient)                   │
//! │   search / search_all / tags / images / attributes / logs    │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │ Request                      │ bytes
//!                 ▼                              ▼
//! ┌──────────────────────────────┐ ┌─────────────────────────────┐
//! │ transport                    │ │ wire                        │
//! │  ResilientTransport          │ │  decode / decode_as         │
//! │  4 attempts, 1s * 2^i        │ │  flat (TMS + flags)         │
//! │  RequestPrimitive (reqwest)  │ │  table (legacy)             │
//! └──────────────────────────────┘ └─────────────────────────────┘
//!
//! ┌──────────────────────────────┐ ┌─────────────────────────────┐
//! │ cache                        │ │ worker                      │
//! │  MemoCache (&mut, LRU)       │◀│  WorkerContext: client +    │
//! │  CoalescingMemoCache (Sync)  │ │  embedding cache            │
//! └──────────────────────────────┘ └─────────────────────────────┘
//! ```
//!
//! The codec is pure. The transport only retries failures that never produced
//! a response. The caches never store errors. The client turns statuses into
//! types: 404 is `None`, 409 is [`MutationOutcome::AlreadyExists`].
//!
//! # Usage
//!
//! ```ignore
//! use tagstorm::{ClientConfig, SearchOperator, SearchQuery, SearchSelect, TagStormClient};
//!
//! let client = TagStormClient::connect(ClientConfig::default())?;
//! client.login("alice", &key).await?;
//!
//! let query = SearchQuery::new([SearchSelect::Id, SearchSelect::Tags])
//!     .operator(SearchOperator::tag(12).and(SearchOperator::tag(40).not()))
//!     .limit(100);
//! let result = client.search(&query).await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod testing;
pub mod transport;
pub mod types;
pub mod wire;
pub mod worker;

pub use cache::{CacheStats, CoalescingMemoCache, MemoCache};
pub use client::{
    ApiImage, ApiTag, LogEntry, LogFilter, MutationOutcome, OrderBy, SearchOperator, SearchQuery,
    SearchSelect, TagStormClient,
};
pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, ConfigError, ProtocolError, TransportError, TransportFailure};
pub use transport::{
    CancelToken, Method, Payload, RawResponse, Request, RequestPrimitive, ResilientTransport,
    RetryPolicy,
};
#[cfg(feature = "http")]
pub use transport::ReqwestPrimitive;
pub use types::{
    AttributeMap, ImageHash, ImageRecord, ResultVariant, TagDictionary, TagId, TagMap, UserId,
};
pub use wire::{decode, decode_as, encode_response, WireFormat};
pub use worker::{WorkerContext, WorkerError};
