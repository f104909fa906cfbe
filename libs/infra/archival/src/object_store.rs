// [libs/infra/archival/src/object_store.rs]
use async_trait::async_trait;
use gateway_error::{ErrorKind, GatewayError};
use std::collections::HashMap;
use std::sync::Mutex;

/// Write-once-read-many blob storage the archival worker ships segments
/// and checkpoints to. `gateway-state-store` is the wrong abstraction
/// here — it models a small keyspace accessed through a handful of
/// atomic scripts, not bulk byte upload/download of files that can run
/// into the hundreds of megabytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GatewayError>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>, GatewayError>;
}

/// In-process double used in tests and by single-node deployments that
/// have no object store configured.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GatewayError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, GatewayError> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Object store fronted by a bucket-style HTTP API (S3-compatible PUT/GET
/// semantics keyed by path). The bucket's base URL is expected to already
/// carry whatever auth the deployment needs (a pre-signed-URL scheme or a
/// reverse proxy doing request signing) — this client only does the
/// transport, matching how the facilitator client in `gateway-settlement`
/// treats its endpoint as opaque.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
        let resp = self
        .client
        .put(self.url_for(key))
        .body(bytes)
        .send()
        .await
        .map_err(|e| GatewayError::new(ErrorKind::Io, format!("archival upload failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(GatewayError::new(ErrorKind::Io, format!("archival upload to {key} returned {}", resp.status())));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GatewayError> {
        let resp = self
        .client
        .get(self.url_for(key))
        .send()
        .await
        .map_err(|e| GatewayError::new(ErrorKind::Io, format!("archival download failed: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(GatewayError::new(ErrorKind::Io, format!("archival download of {key} returned {}", resp.status())));
        }
        let bytes = resp.bytes().await.map_err(|e| GatewayError::new(ErrorKind::Io, format!("archival download body read failed: {e}")))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<String>, GatewayError> {
        // Bucket listing needs provider-specific query params this crate
        // doesn't standardize on; restore() only ever needs get() on keys
        // named by a checkpoint it already holds, so list() is unused on
        // this path in production and left unimplemented rather than
        // guessed at.
        Err(GatewayError::new(ErrorKind::Io, "HttpObjectStore does not support listing; restore from a known checkpoint key instead"))
    }
}
