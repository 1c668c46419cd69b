// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

use crate::api::{ByteStream, StorageApi};
use crate::catalog::{ContentTypeLookup, MetadataCatalog, ResourceDescriptor};
use crate::config::{DavConfig, LockConfig};
use crate::error::{ConfigError, DavError, DavResult};
use crate::lock::LockManager;
use crate::mutation::{MutationEngine, Outcome};
use crate::resolver::{PathKind, PathResolver};

/// Verbs answered by the service, for the `Allow` header.
pub const ALLOWED_METHODS: &[&str] = &[
    "OPTIONS", "GET", "HEAD", "PROPFIND", "MKCOL", "PUT", "DELETE", "COPY", "MOVE", "LOCK",
    "UNLOCK",
];

/// WebDAV compliance classes, for the `DAV` header.
pub const DAV_COMPLIANCE: &str = "1,2";

/// Value of the `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    /// Parses a `Depth` header. A missing or unrecognized value means infinity.
    pub fn from_header(value: Option<&str>) -> Depth {
        match value.map(str::trim) {
            Some("0") => Depth::Zero,
            Some("1") => Depth::One,
            Some(v) if v.eq_ignore_ascii_case("infinity") => Depth::Infinity,
            None => Depth::Infinity,
            Some(v) => {
                debug!("unrecognized depth {:?}, using infinity", v);
                Depth::Infinity
            }
        }
    }

    // Listings never go deeper than the immediate children.
    fn includes_children(self) -> bool {
        self != Depth::Zero
    }
}

/// File content ready to be streamed to the client.
pub struct GetResponse {
    pub len: u64,
    pub content_type: String,
    pub modified: SystemTime,
    pub body: ByteStream,
}

impl Debug for GetResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResponse")
            .field("len", &self.len)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Answer to a successful LOCK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGrant {
    pub token: String,
    pub owner_xml: String,
    pub timeout: Duration,
}

/// Entry point for the transport layer: one method per WebDAV verb.
///
/// Lock tokens the client submitted (`If` / `Lock-Token` headers) are passed
/// as `tokens`.
pub struct DavService {
    api: Arc<Box<dyn StorageApi>>,
    resolver: Arc<PathResolver>,
    locks: Arc<LockManager>,
    catalog: MetadataCatalog,
    engine: MutationEngine,
    lock_config: LockConfig,
    sweeper: Option<JoinHandle<()>>,
}

impl DavService {
    /// Builds the service, failing on any configuration problem. Must run
    /// inside a tokio runtime when a lock sweep interval is configured.
    pub async fn new(config: &DavConfig, api: Box<dyn StorageApi>) -> Result<Self, ConfigError> {
        let api = Arc::new(api);
        let catalog = MetadataCatalog::new(api.clone());
        Self::build(config, api, catalog).await
    }

    /// Same as [`DavService::new`] with a custom media type lookup.
    pub async fn with_content_types(
        config: &DavConfig, api: Box<dyn StorageApi>, lookup: ContentTypeLookup,
    ) -> Result<Self, ConfigError> {
        let api = Arc::new(api);
        let catalog = MetadataCatalog::with_content_types(api.clone(), lookup);
        Self::build(config, api, catalog).await
    }

    async fn build(
        config: &DavConfig, api: Arc<Box<dyn StorageApi>>, catalog: MetadataCatalog,
    ) -> Result<Self, ConfigError> {
        let resolver = Arc::new(PathResolver::new(config, api.clone()).await?);
        let locks = Arc::new(LockManager::new());
        let engine = MutationEngine::new(api.clone(), resolver.clone(), locks.clone());
        let sweeper = config
            .locks
            .sweep_interval_secs
            .map(|secs| locks.spawn_sweeper(Duration::from_secs(secs)));
        info!("serving {} drives", config.drives.len());
        Ok(Self {
            api,
            resolver,
            locks,
            catalog,
            engine,
            lock_config: config.locks.clone(),
            sweeper,
        })
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// `Allow` and `DAV` header values.
    pub fn options(&self) -> (&'static [&'static str], &'static str) {
        (ALLOWED_METHODS, DAV_COMPLIANCE)
    }

    pub async fn get(&self, drive: &str, path: &str) -> DavResult<GetResponse> {
        trace!("DS: get {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        match target.kind() {
            PathKind::NotFound => Err(DavError::NotFound),
            PathKind::Directory => Err(DavError::conflict("a collection has no content")),
            PathKind::File => {
                let meta = self.catalog.describe_one(target.path()).await?;
                let body = self.api.read(target.path()).await?;
                Ok(GetResponse {
                    len: meta.size().unwrap_or(0),
                    content_type: meta.content_type().unwrap_or_default().to_string(),
                    modified: meta.modified_at,
                    body,
                })
            }
        }
    }

    pub async fn head(&self, drive: &str, path: &str) -> DavResult<ResourceDescriptor> {
        trace!("DS: head {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        if !target.exists() {
            return Err(DavError::NotFound);
        }
        self.catalog.describe_one(target.path()).await
    }

    pub async fn propfind(
        &self, drive: &str, path: &str, depth: Depth,
    ) -> DavResult<Vec<ResourceDescriptor>> {
        trace!("DS: propfind {} {} {:?}", drive, path, depth);
        let target = self.resolver.resolve(drive, path).await?;
        if !target.exists() {
            return Err(DavError::NotFound);
        }
        self.catalog
            .describe(target.path(), depth.includes_children())
            .await
    }

    pub async fn mkcol(&self, drive: &str, path: &str, tokens: &[String]) -> DavResult<Outcome> {
        trace!("DS: mkcol {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        if target.exists() {
            return Err(DavError::conflict("resource already exists"));
        }
        self.engine.create_directory(&target, tokens).await?;
        Ok(Outcome::Created)
    }

    pub async fn put(
        &self, drive: &str, path: &str, body: ByteStream, tokens: &[String],
    ) -> DavResult<Outcome> {
        trace!("DS: put {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        self.engine.write_file(&target, body, tokens).await
    }

    pub async fn delete(&self, drive: &str, path: &str, tokens: &[String]) -> DavResult<Outcome> {
        trace!("DS: delete {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        self.engine.delete(&target, tokens).await?;
        Ok(Outcome::NoContent)
    }

    /// `destination` is the `Destination` header stripped of scheme and
    /// host: `/<drive>/<path>`.
    pub async fn move_resource(
        &self, drive: &str, path: &str, destination: &str, overwrite: bool, tokens: &[String],
    ) -> DavResult<Outcome> {
        trace!("DS: move {} {} -> {}", drive, path, destination);
        let src = self.resolver.resolve(drive, path).await?;
        let dst = self.resolver.resolve_destination(destination).await?;
        self.engine.move_to(&src, &dst, overwrite, tokens).await
    }

    pub async fn copy(
        &self, drive: &str, path: &str, destination: &str, overwrite: bool, tokens: &[String],
    ) -> DavResult<Outcome> {
        trace!("DS: copy {} {} -> {}", drive, path, destination);
        let src = self.resolver.resolve(drive, path).await?;
        let dst = self.resolver.resolve_destination(destination).await?;
        self.engine.copy_to(&src, &dst, overwrite, tokens).await
    }

    /// Takes a new lock, or refreshes the one identified by `token`.
    pub async fn lock(
        &self, drive: &str, path: &str, timeout_secs: Option<u64>, owner_xml: &str,
        token: Option<&str>,
    ) -> DavResult<LockGrant> {
        trace!("DS: lock {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        let timeout = self.lock_config.effective_timeout(timeout_secs);
        let entry = self.locks.acquire(target.path(), timeout, owner_xml, token)?;
        Ok(LockGrant {
            token: entry.token,
            owner_xml: entry.owner_xml,
            timeout: entry.timeout,
        })
    }

    pub async fn unlock(&self, drive: &str, path: &str, token: &str) -> DavResult<Outcome> {
        trace!("DS: unlock {} {}", drive, path);
        let target = self.resolver.resolve(drive, path).await?;
        self.locks.release(target.path(), token)?;
        Ok(Outcome::NoContent)
    }
}

impl Debug for DavService {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DavService")
    }
}

impl Drop for DavService {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
