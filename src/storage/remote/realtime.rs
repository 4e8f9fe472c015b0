//! Realtime database backend
//!
//! Talks to a Firebase-Realtime-Database-compatible REST endpoint:
//!
//! - `PUT    {base}/{path}/{id}.json` upserts one entry
//! - `DELETE {base}/{path}/{id}.json` deletes one entry
//! - `DELETE {base}/{path}.json`      clears the collection
//! - `GET    {base}/{path}.json`      reads the collection as an `id -> record` object
//!
//! Subscriptions hold a server-sent-events connection on the collection
//! path. Any `put` or `patch` event triggers a full re-read, so subscribers
//! always receive complete snapshots.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, header};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{RemoteError, RemoteStore, SnapshotStream, validate_key};
use crate::model::MediaItem;

const TIMEOUT: u64 = 30;

/// Remote store backed by a realtime database REST API
#[derive(Clone)]
pub struct RealtimeDbRemote {
    client: Client,
    /// Client without a request timeout, for the long-lived event stream
    stream_client: Client,
    base_url: String,
    path: String,
    auth: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for RealtimeDbRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeDbRemote")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("auth", &"<redacted>")
            .finish()
    }
}

impl RealtimeDbRemote {
    /// Create a backend for `{base_url}/{path}`
    pub fn new(
        base_url: &str,
        path: &str,
        auth: Option<String>,
        proxy_url: Option<String>,
    ) -> Result<Self, RemoteError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(TIMEOUT));
        let mut stream_builder = Client::builder().connect_timeout(Duration::from_secs(TIMEOUT));
        if let Some(url) = proxy_url {
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| RemoteError::Unavailable(format!("bad proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy.clone());
            stream_builder = stream_builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            stream_client: stream_builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.trim_matches('/').to_string(),
            auth: Arc::new(RwLock::new(auth)),
        })
    }

    /// Replace the auth token used for subsequent requests
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth.write() = token;
    }

    fn url(&self, key: Option<&str>) -> String {
        match key {
            Some(key) => format!(
                "{}/{}/{}.json",
                self.base_url,
                self.path,
                urlencoding::encode(key)
            ),
            None => format!("{}/{}.json", self.base_url, self.path),
        }
    }

    /// Start a request on `client`, with the auth token read once
    fn request(&self, client: &Client, method: Method, key: Option<&str>) -> RequestBuilder {
        let token = self.auth.read().clone();
        let builder = client.request(method, self.url(key));
        match token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    /// Read the whole collection
    pub async fn fetch_all(&self) -> Result<Vec<MediaItem>, RemoteError> {
        let response = self
            .request(&self.client, Method::GET, None)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(collection_from_value(body))
    }

    async fn open_event_stream(&self) -> Result<reqwest::Response, RemoteError> {
        let response = self
            .request(&self.stream_client, Method::GET, None)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }
}

#[async_trait]
impl RemoteStore for RealtimeDbRemote {
    async fn initialize(&self) -> Result<(), RemoteError> {
        self.request(&self.client, Method::GET, None)
            .query(&[("shallow", "true")])
            .send()
            .await?
            .error_for_status()?;
        info!("Connected to realtime database at {}", self.base_url);
        Ok(())
    }

    fn subscribe(&self) -> SnapshotStream {
        let remote = self.clone();
        Box::pin(async_stream::stream! {
            match remote.fetch_all().await {
                Ok(items) => yield items,
                Err(e) => warn!("Initial remote snapshot failed: {}", e),
            }

            let response = match remote.open_event_stream().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Failed to open remote event stream: {}", e);
                    return;
                }
            };

            let mut parser = EventStreamParser::default();
            let mut body = response.bytes_stream();
            'outer: while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Remote event stream interrupted: {}", e);
                        break;
                    }
                };

                for event in parser.feed(&chunk) {
                    match event.kind() {
                        EventKind::Changed => match remote.fetch_all().await {
                            Ok(items) => yield items,
                            Err(e) => warn!("Failed to re-read remote collection: {}", e),
                        },
                        EventKind::KeepAlive => debug!("remote keep-alive"),
                        EventKind::Closed => {
                            warn!("Remote subscription closed by server: {}", event.name);
                            break 'outer;
                        }
                        EventKind::Unknown => debug!("Ignoring remote event {:?}", event.name),
                    }
                }
            }
        })
    }

    async fn put(&self, item: &MediaItem) -> Result<(), RemoteError> {
        validate_key(&item.id)?;
        self.request(&self.client, Method::PUT, Some(&item.id))
            .json(item)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RemoteError> {
        validate_key(id)?;
        self.request(&self.client, Method::DELETE, Some(id))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), RemoteError> {
        self.request(&self.client, Method::DELETE, None)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Turn an `id -> record` object into a list, skipping records that don't decode
fn collection_from_value(value: Value) -> Vec<MediaItem> {
    match value {
        Value::Null => Vec::new(),
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(key, record)| match serde_json::from_value::<MediaItem>(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping malformed remote record {}: {}", key, e);
                    None
                }
            })
            .collect(),
        other => {
            warn!("Unexpected remote collection shape: {}", other);
            Vec::new()
        }
    }
}

// ============ Server-sent events ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Changed,
    KeepAlive,
    Closed,
    Unknown,
}

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerEvent {
    name: String,
    data: String,
}

impl ServerEvent {
    fn kind(&self) -> EventKind {
        match self.name.as_str() {
            "put" | "patch" => EventKind::Changed,
            "keep-alive" => EventKind::KeepAlive,
            "cancel" | "auth_revoked" => EventKind::Closed,
            _ => EventKind::Unknown,
        }
    }
}

/// Incremental `text/event-stream` framer
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; bytes are held
/// until a full line is available.
#[derive(Debug, Default)]
struct EventStreamParser {
    pending: Vec<u8>,
    name: String,
    data: Vec<String>,
}

impl EventStreamParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.name = value.to_string(),
                "data" => self.data.push(value.to_string()),
                _ => (),
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        if self.name.is_empty() && self.data.is_empty() {
            return None;
        }
        let name = std::mem::take(&mut self.name);
        let data = std::mem::take(&mut self.data).join("\n");
        Some(ServerEvent {
            name: if name.is_empty() {
                "message".to_string()
            } else {
                name
            },
            data,
        })
    }
}
