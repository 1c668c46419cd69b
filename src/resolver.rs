// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{ResourceKind, StorageApi};
use crate::config::DavConfig;
use crate::error::{ConfigError, DavError, DavResult};

/// What a resolved path currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    NotFound,
}

impl From<ResourceKind> for PathKind {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::File => PathKind::File,
            ResourceKind::Directory => PathKind::Directory,
        }
    }
}

/// A logical path mapped into its drive, with the kind observed at
/// resolution time.
#[derive(Debug, Clone)]
pub struct PhysicalPath {
    drive: String,
    segments: Vec<String>,
    path: PathBuf,
    kind: PathKind,
}

impl PhysicalPath {
    pub fn drive(&self) -> &str {
        &self.drive
    }

    /// Normalized path components below the drive root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Physical location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn exists(&self) -> bool {
        self.kind != PathKind::NotFound
    }

    /// Whether this is the drive root itself.
    pub fn is_drive_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Normalized logical form, always starting with `/`.
    pub fn logical(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Whether `other` lies strictly below this path on the same drive.
    pub fn is_ancestor_of(&self, other: &PhysicalPath) -> bool {
        self.drive == other.drive
            && other.segments.len() > self.segments.len()
            && other.segments.starts_with(&self.segments)
    }
}

#[derive(Debug)]
struct Drive {
    root: PathBuf,
    recycler_root: PathBuf,
}

/// Maps `(drive, logical path)` pairs onto physical locations and keeps them
/// inside their drive roots.
#[derive(Debug)]
pub struct PathResolver {
    api: Arc<Box<dyn StorageApi>>,
    drives: HashMap<String, Drive>,
    recycler_name: String,
    external_recycler: bool,
}

impl PathResolver {
    /// Validates the configuration and canonicalizes every drive root.
    pub async fn new(
        config: &DavConfig, api: Arc<Box<dyn StorageApi>>,
    ) -> Result<PathResolver, ConfigError> {
        config.validate()?;
        let mut drives = HashMap::new();
        for (name, root) in &config.drives {
            let drive_root_err = |reason: String| ConfigError::DriveRoot {
                drive: name.clone(),
                reason,
            };
            let root = api
                .canonicalize(root)
                .await
                .map_err(|e| drive_root_err(e.to_string()))?;
            let entry = api.stat(&root).await.map_err(|e| drive_root_err(e.to_string()))?;
            if !entry.is_dir() {
                return Err(drive_root_err("not a directory".to_string()));
            }
            let recycler_root = match &config.recycler.path {
                Some(path) => path.join(name),
                None => root.join(&config.recycler.name),
            };
            debug!("drive {} mounted", name);
            drives.insert(name.clone(), Drive { root, recycler_root });
        }
        Ok(PathResolver {
            api,
            drives,
            recycler_name: config.recycler.name.clone(),
            external_recycler: config.recycler.path.is_some(),
        })
    }

    /// Resolves a logical path, rejecting unknown drives and anything that
    /// would leave the drive root, and probes what it points at.
    pub async fn resolve(&self, drive: &str, logical: &str) -> DavResult<PhysicalPath> {
        let root = &self.drive(drive)?.root;
        let segments = normalize(logical)?;
        let mut path = root.clone();
        path.extend(&segments);

        self.check_containment(root, &path).await?;

        let kind = match self.api.stat(&path).await {
            Ok(entry) => entry.kind.into(),
            Err(e) if is_missing(&e) => PathKind::NotFound,
            Err(e) => return Err(e.into()),
        };
        Ok(PhysicalPath {
            drive: drive.to_string(),
            segments,
            path,
            kind,
        })
    }

    /// Resolves a `Destination` value already stripped of scheme and host:
    /// the first segment names the drive.
    pub async fn resolve_destination(&self, destination: &str) -> DavResult<PhysicalPath> {
        let (drive, rest) = split_destination(destination)?;
        self.resolve(drive, rest).await
    }

    /// Repeats the containment check right before a mutation, since links may
    /// have changed since resolution.
    pub async fn revalidate(&self, target: &PhysicalPath) -> DavResult<()> {
        let root = &self.drive(&target.drive)?.root;
        self.check_containment(root, &target.path).await
    }

    /// Directory receiving the deleted resources of `drive`.
    pub fn recycler_root(&self, drive: &str) -> DavResult<&Path> {
        Ok(&self.drive(drive)?.recycler_root)
    }

    /// Whether the path is the in-drive recycler root or lies below it.
    pub fn is_in_recycler(&self, target: &PhysicalPath) -> bool {
        !self.external_recycler
            && target.segments.first().map(String::as_str) == Some(self.recycler_name.as_str())
    }

    /// Whether the path is the in-drive recycler directory itself.
    pub fn is_recycler_root(&self, target: &PhysicalPath) -> bool {
        self.is_in_recycler(target) && target.segments.len() == 1
    }

    fn drive(&self, drive: &str) -> DavResult<&Drive> {
        self.drives
            .get(drive)
            .ok_or_else(|| DavError::UnknownDrive(drive.to_string()))
    }

    async fn check_containment(&self, root: &Path, path: &Path) -> DavResult<()> {
        // The deepest existing ancestor decides where the path really lands.
        for candidate in path.ancestors() {
            match self.api.canonicalize(candidate).await {
                Ok(real) if real.starts_with(root) => return Ok(()),
                Ok(_) => {
                    warn!("rejected a path resolving outside of its drive");
                    return Err(DavError::PathTraversal);
                }
                Err(e) if candidate == root => return Err(e.into()),
                // A dangling link would be followed on write, wherever it points.
                Err(_) => {
                    if self.api.read_link(candidate).await.is_ok() {
                        warn!("rejected a path through a dangling link");
                        return Err(DavError::PathTraversal);
                    }
                }
            }
        }
        Err(DavError::PathTraversal)
    }
}

/// Lexically normalizes a logical path. `..` may never climb above the
/// drive root.
pub fn normalize(logical: &str) -> DavResult<Vec<String>> {
    if logical.contains('\0') {
        return Err(DavError::PathTraversal);
    }
    let mut segments: Vec<String> = Vec::new();
    for part in logical.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(DavError::PathTraversal);
                }
            }
            part if is_prefixed(part) => return Err(DavError::PathTraversal),
            part => segments.push(part.to_string()),
        }
    }
    Ok(segments)
}

/// Splits `/drive/some/path` into the drive and the rest.
pub fn split_destination(destination: &str) -> DavResult<(&str, &str)> {
    let trimmed = destination.trim_start_matches('/');
    let (drive, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    if drive.is_empty() {
        return Err(DavError::UnknownDrive(String::new()));
    }
    Ok((drive, rest))
}

// Windows drive letters and the like must never reach `PathBuf::push`.
fn is_prefixed(part: &str) -> bool {
    cfg!(windows) && part.contains(':')
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
