// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Typed client for the tagging service.
//!
//! [`TagStormClient`] is the only place where the three lower layers meet:
//! it builds [`Request`]s, sends them through a [`ResilientTransport`], and
//! decodes search bodies with the [`crate::wire`] codec. Every other endpoint
//! speaks JSON.
//!
//! Status handling is uniform:
//!
//! | Status | Lookups           | Mutations                        |
//! |--------|-------------------|----------------------------------|
//! | 2xx    | `Some(value)`     | [`MutationOutcome::Applied`]       |
//! | 404    | `None`            | `ClientError::Remote`            |
//! | 409    | `ClientError::Remote` | [`MutationOutcome::AlreadyExists`] |
//! | other  | `ClientError::Remote` | `ClientError::Remote`        |

pub mod models;
pub mod query;

pub use models::{ApiImage, ApiTag, LogEntry, LogFilter};
pub use query::{OrderBy, SearchOperator, SearchQuery, SearchSelect, MAX_QUERY_DEPTH};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{CancelToken, RawResponse, Request, RequestPrimitive, ResilientTransport};
use crate::types::{ImageHash, ImageRecord, ResultVariant, TagDictionary};
use crate::wire::{self, WireFormat};

/// Result of a mutation the service accepted or already had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// 409: the tag, image, or attribute was already there
    AlreadyExists,
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

pub struct TagStormClient<P> {
    transport: ResilientTransport<P>,
    config: ClientConfig,
    token: RwLock<Option<String>>,
    /// Last fetched tag list; needed to decode the table generation
    tags: RwLock<TagDictionary>,
}

impl<P> std::fmt::Debug for TagStormClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStormClient")
            .field("api_url", &self.config.api_url)
            .field("wire_format", &self.config.wire_format)
            .field("authenticated", &self.token.read().is_some())
            .field("known_tags", &self.tags.read().len())
            .finish()
    }
}

#[cfg(feature = "http")]
impl TagStormClient<crate::transport::ReqwestPrimitive> {
    /// Client over reqwest, with timeouts and retry policy from `config`.
    pub fn connect(config: ClientConfig) -> Result<Self, crate::error::TransportFailure> {
        let primitive = crate::transport::ReqwestPrimitive::new(
            config.request_timeout(),
            config.connect_timeout(),
        )?;
        Ok(Self::with_primitive(config, primitive))
    }
}

impl<P: RequestPrimitive> TagStormClient<P> {
    pub fn with_primitive(config: ClientConfig, primitive: P) -> Self {
        let transport = ResilientTransport::new(primitive, config.retry.policy());
        Self {
            token: RwLock::new(config.token.clone()),
            transport,
            config,
            tags: RwLock::new(TagDictionary::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &ResilientTransport<P> {
        &self.transport
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    // ========================================================================
    // PLUMBING
    // ========================================================================

    fn get(&self, path: &str) -> Request {
        Request::get(self.config.endpoint(path)).bearer(self.token())
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Request {
        Request::post(self.config.endpoint(path))
            .json(body)
            .bearer(self.token())
    }

    async fn send(&self, request: &Request) -> Result<RawResponse, ClientError> {
        Ok(self.transport.send(request).await?)
    }

    fn success(response: RawResponse) -> Result<RawResponse, ClientError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Remote {
                status: response.status,
                body: response.text(),
            })
        }
    }

    fn parse<T: DeserializeOwned>(response: &RawResponse) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// GET returning JSON, with 404 as `None`.
    async fn lookup<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ClientError> {
        let response = self.send(&self.get(path)).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        Self::parse(&Self::success(response)?).map(Some)
    }

    async fn mutate(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<MutationOutcome, ClientError> {
        let response = self.send(&self.post(path, body)).await?;
        if response.is_already_exists() {
            tracing::debug!(path, "mutation already applied");
            return Ok(MutationOutcome::AlreadyExists);
        }
        Self::success(response)?;
        Ok(MutationOutcome::Applied)
    }

    // ========================================================================
    // SESSION AND TAGS
    // ========================================================================

    /// Exchange credentials for a bearer token and keep it for later calls.
    pub async fn login(&self, username: &str, login_key: &[u8]) -> Result<(), ClientError> {
        let request = Request::post(self.config.endpoint("/api/login")).json(json!({
            "username": username,
            "login_key": hex::encode(login_key),
        }));
        let response = Self::success(self.send(&request).await?)?;
        let token: String = Self::parse(&response)?;
        self.set_token(Some(token));
        tracing::info!(username, "logged in");
        Ok(())
    }

    /// All tags. Also refreshes the cached [`TagDictionary`].
    pub async fn list_tags(&self) -> Result<Vec<ApiTag>, ClientError> {
        let response = Self::success(self.send(&self.get("/api/tags")).await?)?;
        let tags: Vec<ApiTag> = Self::parse(&response)?;
        *self.tags.write() = tags.iter().map(|t| (t.id, t.name.clone())).collect();
        Ok(tags)
    }

    pub async fn tag_by_name(&self, name: &str) -> Result<Option<ApiTag>, ClientError> {
        self.lookup(&format!("/api/tag_by_name/{}", urlencoding::encode(name)))
            .await
    }

    /// Tag id/name map, fetched on first use and cached after.
    pub async fn tag_dictionary(&self) -> Result<TagDictionary, ClientError> {
        {
            let tags = self.tags.read();
            if !tags.is_empty() {
                return Ok(tags.clone());
            }
        }
        self.list_tags().await?;
        Ok(self.tags.read().clone())
    }

    pub async fn add_tag(&self, name: &str) -> Result<MutationOutcome, ClientError> {
        let outcome = self
            .mutate("/api/add_tag", json!({"name": name, "user": self.config.user_id}))
            .await?;
        // Ids are assigned server-side; refetch on next use
        self.tags.write().clear();
        Ok(outcome)
    }

    pub async fn remove_tag(&self, name: &str) -> Result<MutationOutcome, ClientError> {
        let outcome = self
            .mutate("/api/remove_tag", json!({"name": name, "user": self.config.user_id}))
            .await?;
        self.tags.write().clear();
        Ok(outcome)
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    fn search_request(&self, query: &SearchQuery) -> Result<Request, ClientError> {
        query.validate()?;
        Ok(self.post("/api/search_images", serde_json::to_value(query)?))
    }

    async fn decode_search(&self, response: RawResponse) -> Result<ResultVariant, ClientError> {
        let response = Self::success(response)?;
        let result = match self.config.wire_format {
            WireFormat::Flat => wire::decode(&response.body)?,
            WireFormat::Table => {
                let dict = self.tag_dictionary().await?;
                wire::decode_as(WireFormat::Table, &response.body, &dict)?
            }
        };
        Ok(result)
    }

    /// Run one search and decode the binary response.
    pub async fn search(&self, query: &SearchQuery) -> Result<ResultVariant, ClientError> {
        let request = self.search_request(query)?;
        let response = self.send(&request).await?;
        self.decode_search(response).await
    }

    /// [`search`](Self::search) that stops retrying once `cancel` fires.
    pub async fn search_with_cancel(
        &self,
        query: &SearchQuery,
        cancel: &CancelToken,
    ) -> Result<ResultVariant, ClientError> {
        let request = self.search_request(query)?;
        let response = self.transport.send_with_cancel(&request, cancel).await?;
        self.decode_search(response).await
    }

    /// Every image matching `operator`, fetched in id order one page at a time.
    ///
    /// Pages are cut with a `minid` cursor, so `id` is always selected. Stops
    /// at the first empty page. `batch_size` defaults to the configured one.
    pub async fn search_all(
        &self,
        operator: Option<SearchOperator>,
        select: &[SearchSelect],
        batch_size: Option<u64>,
    ) -> Result<Vec<ImageRecord>, ClientError> {
        let mut select = select.to_vec();
        if !select.contains(&SearchSelect::Id) {
            select.insert(0, SearchSelect::Id);
        }
        let batch_size = batch_size.unwrap_or(self.config.batch_size);

        let mut min_id = 0u64;
        let mut all = Vec::new();
        loop {
            let cursor = SearchOperator::min_id(min_id);
            let op = match &operator {
                Some(op) => op.clone().and(cursor),
                None => cursor,
            };
            let query = SearchQuery::new(select.iter().copied())
                .operator(op)
                .order_by(OrderBy::Id)
                .limit(batch_size);

            let page = self.search(&query).await?.into_records();
            if page.is_empty() {
                break;
            }
            let last = page.iter().filter_map(|r| r.id).max().ok_or_else(|| {
                ClientError::InvalidQuery("page without ids, cannot advance cursor".to_string())
            })?;
            tracing::debug!(min_id, count = page.len(), "fetched search page");
            min_id = u64::from(last) + 1;
            all.extend(page);
        }
        Ok(all)
    }

    // ========================================================================
    // IMAGES
    // ========================================================================

    pub async fn image_by_hash(&self, hash: &ImageHash) -> Result<Option<ApiImage>, ClientError> {
        self.lookup(&format!("/api/image_by_hash/{}", hash)).await
    }

    pub async fn image_by_id(&self, id: u64) -> Result<Option<ApiImage>, ClientError> {
        self.lookup(&format!("/api/image_by_id/{}", id)).await
    }

    pub async fn add_image(&self, hash: &ImageHash) -> Result<MutationOutcome, ClientError> {
        self.mutate("/api/add_image", json!({"hash": hash, "user": self.config.user_id}))
            .await
    }

    pub async fn remove_image(&self, hash: &ImageHash) -> Result<MutationOutcome, ClientError> {
        self.mutate("/api/remove_image", json!({"hash": hash, "user": self.config.user_id}))
            .await
    }

    pub async fn tag_image(
        &self,
        hash: &ImageHash,
        tag: &str,
    ) -> Result<MutationOutcome, ClientError> {
        self.mutate(
            "/api/tag_image",
            json!({"hash": hash, "tag": tag, "user": self.config.user_id}),
        )
        .await
    }

    pub async fn untag_image(
        &self,
        hash: &ImageHash,
        tag: &str,
    ) -> Result<MutationOutcome, ClientError> {
        self.mutate(
            "/api/untag_image",
            json!({"hash": hash, "tag": tag, "user": self.config.user_id}),
        )
        .await
    }

    /// Add `key=value`. With `singular`, the value replaces any existing
    /// values for `key` instead of joining them.
    pub async fn add_image_attribute(
        &self,
        hash: &ImageHash,
        key: &str,
        value: &str,
        singular: bool,
    ) -> Result<MutationOutcome, ClientError> {
        self.mutate(
            "/api/add_image_attribute",
            json!({
                "hash": hash,
                "key": key,
                "value": value,
                "user": self.config.user_id,
                "singular": singular,
            }),
        )
        .await
    }

    pub async fn remove_image_attribute(
        &self,
        hash: &ImageHash,
        key: &str,
        value: &str,
    ) -> Result<MutationOutcome, ClientError> {
        self.mutate(
            "/api/remove_image_attribute",
            json!({"hash": hash, "key": key, "value": value, "user": self.config.user_id}),
        )
        .await
    }

    pub async fn caption_image(
        &self,
        hash: &ImageHash,
        caption: &str,
    ) -> Result<MutationOutcome, ClientError> {
        self.mutate(
            "/api/caption_image",
            json!({"hash": hash, "caption": caption, "user": self.config.user_id}),
        )
        .await
    }

    /// Raw image file, optionally resized server-side. 404 is `None`.
    pub async fn fetch_image_bytes(
        &self,
        hash: &ImageHash,
        size: Option<u32>,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        let mut request = self.get(&format!("/images/{}", hash));
        if let Some(size) = size {
            request = request.query("size", size);
        }
        let response = self.send(&request).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        Ok(Some(Self::success(response)?.body))
    }

    // ========================================================================
    // LOGS
    // ========================================================================

    /// Audit log rows matching `filter`, oldest first, across all pages.
    pub async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ClientError> {
        let page_size = filter.page_size.unwrap_or(self.config.batch_size);
        let mut min_id = 0u64;
        let mut logs = Vec::new();
        loop {
            let mut request = self
                .get("/api/logs")
                .query("min_id", min_id)
                .query("limit", page_size);
            if let Some(hash) = &filter.image_hash {
                request = request.query("image_hash", hash);
            }
            if let Some(action) = &filter.action {
                request = request.query("action", action);
            }

            let response = Self::success(self.send(&request).await?)?;
            let page: Vec<LogEntry> = Self::parse(&response)?;
            let Some(last) = page.last() else {
                break;
            };
            min_id = last.id + 1;
            logs.extend(page);
        }
        Ok(logs)
    }
}
