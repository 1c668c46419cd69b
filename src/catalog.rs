// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::api::{ResourceKind, StorageApi, StorageEntry};
use crate::error::DavResult;

/// Maps a file name onto its media type.
pub type ContentTypeLookup = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Media type used for unrecognized extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Extension based lookup backed by `mime_guess`.
pub fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Kind specific part of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDetails {
    Directory,
    File { size: u64, content_type: String },
}

/// One entry of a multi-status listing, built from live filesystem state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub name: String,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,

    /// Set only on the descriptor of the requested resource itself.
    pub is_root: bool,

    pub details: ResourceDetails,
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        match self.details {
            ResourceDetails::Directory => ResourceKind::Directory,
            ResourceDetails::File { .. } => ResourceKind::File,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self.details {
            ResourceDetails::Directory => None,
            ResourceDetails::File { size, .. } => Some(size),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match &self.details {
            ResourceDetails::Directory => None,
            ResourceDetails::File { content_type, .. } => Some(content_type),
        }
    }
}

/// Produces resource descriptors and directory listings.
pub struct MetadataCatalog {
    api: Arc<Box<dyn StorageApi>>,
    content_type: ContentTypeLookup,
}

impl MetadataCatalog {
    pub fn new(api: Arc<Box<dyn StorageApi>>) -> Self {
        Self::with_content_types(api, Arc::new(guess_content_type))
    }

    pub fn with_content_types(api: Arc<Box<dyn StorageApi>>, lookup: ContentTypeLookup) -> Self {
        Self {
            api,
            content_type: lookup,
        }
    }

    /// Describes `path` and, for a directory with `include_children`, its
    /// immediate children: directories first, then files, each group by name.
    pub async fn describe(
        &self, path: &Path, include_children: bool,
    ) -> DavResult<Vec<ResourceDescriptor>> {
        let entry = self.api.stat(path).await?;
        let mut result = vec![self.descriptor(&entry, true)];
        match entry.kind {
            ResourceKind::File => {}
            ResourceKind::Directory if !include_children => {}
            ResourceKind::Directory => {
                let mut children = self.api.read_dir(path).await?;
                children.sort_by_cached_key(|c| (c.kind, c.name()));
                result.extend(children.iter().map(|c| self.descriptor(c, false)));
            }
        }
        Ok(result)
    }

    /// Descriptor of `path` alone.
    pub async fn describe_one(&self, path: &Path) -> DavResult<ResourceDescriptor> {
        let entry = self.api.stat(path).await?;
        Ok(self.descriptor(&entry, true))
    }

    fn descriptor(&self, entry: &StorageEntry, is_root: bool) -> ResourceDescriptor {
        let name = entry.name();
        let details = match entry.kind {
            ResourceKind::Directory => ResourceDetails::Directory,
            ResourceKind::File => ResourceDetails::File {
                size: entry.size,
                content_type: (self.content_type)(&name),
            },
        };
        ResourceDescriptor {
            name,
            created_at: entry.crtime,
            modified_at: entry.mtime,
            is_root,
            details,
        }
    }
}

impl Debug for MetadataCatalog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MetadataCatalog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LocalApi;
    use crate::error::DavError;
    use tempfile::TempDir;

    fn catalog() -> MetadataCatalog {
        MetadataCatalog::new(Arc::new(LocalApi::new() as Box<dyn StorageApi>))
    }

    #[tokio::test]
    async fn lists_directories_before_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("c.txt"), b"c").unwrap();

        let listing = catalog().describe(dir.path(), true).await.unwrap();
        let shape: Vec<_> = listing
            .iter()
            .map(|d| (d.name.as_str(), d.kind(), d.is_root))
            .collect();
        let root_name = dir.path().file_name().unwrap().to_str().unwrap();
        assert_eq!(
            shape,
            vec![
                (root_name, ResourceKind::Directory, true),
                ("a", ResourceKind::Directory, false),
                ("b.txt", ResourceKind::File, false),
                ("c.txt", ResourceKind::File, false),
            ]
        );
        assert_eq!(listing[2].size(), Some(2));
        assert_eq!(listing[2].content_type(), Some("text/plain"));
        assert_eq!(listing[1].size(), None);
    }

    #[tokio::test]
    async fn depth_zero_and_files_return_one_descriptor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.pdf"), b"%PDF").unwrap();

        let listing = catalog().describe(dir.path(), false).await.unwrap();
        assert_eq!(listing.len(), 1);

        let listing = catalog().describe(&dir.path().join("x.pdf"), true).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].is_root);
        assert_eq!(listing[0].content_type(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn injected_lookup_is_used() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("weird.zzz"), b"").unwrap();
        let catalog = MetadataCatalog::with_content_types(
            Arc::new(LocalApi::new() as Box<dyn StorageApi>),
            Arc::new(|name: &str| format!("test/{}", name)),
        );
        let d = catalog.describe_one(&dir.path().join("weird.zzz")).await.unwrap();
        assert_eq!(d.content_type(), Some("test/weird.zzz"));
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let res = catalog().describe(&dir.path().join("gone"), true).await;
        assert!(matches!(res, Err(DavError::NotFound)));
    }

    #[test]
    fn unknown_extension_defaults() {
        assert_eq!(guess_content_type("README.unknownext"), DEFAULT_CONTENT_TYPE);
        assert_eq!(guess_content_type("index.html"), "text/html");
    }
}
