// Copyright 2022 Debox Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use http::StatusCode;

use crate::api::{ByteStream, ResourceKind, StorageApi};
use crate::error::{DavError, DavResult};
use crate::lock::LockManager;
use crate::resolver::{PathKind, PathResolver, PhysicalPath};

/// Successful result of a mutating verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new resource was created.
    Created,
    /// An existing resource was replaced or removed.
    NoContent,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Created => StatusCode::CREATED,
            Outcome::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

// An overwritten MOVE/COPY destination, parked in the recycler until the
// replacement is in place.
struct Displaced {
    slot: PathBuf,
    kind: ResourceKind,
}

/// Performs every change to the drives. Each entry point revalidates its
/// targets and consults the lock table before touching anything.
///
/// Inside the recycler only deletion is allowed, which purges.
#[derive(Debug)]
pub struct MutationEngine {
    api: Arc<Box<dyn StorageApi>>,
    resolver: Arc<PathResolver>,
    locks: Arc<LockManager>,
}

impl MutationEngine {
    pub fn new(
        api: Arc<Box<dyn StorageApi>>, resolver: Arc<PathResolver>, locks: Arc<LockManager>,
    ) -> Self {
        Self { api, resolver, locks }
    }

    /// Creates a directory. Succeeds without change when it already exists.
    pub async fn create_directory(&self, target: &PhysicalPath, tokens: &[String]) -> DavResult<()> {
        trace!("ME: create_directory {}", target.logical());
        match target.kind() {
            PathKind::Directory => return Ok(()),
            PathKind::File => return Err(DavError::conflict("a file exists at this path")),
            PathKind::NotFound => {}
        }
        self.ensure_outside_recycler(target)?;
        self.resolver.revalidate(target).await?;
        self.locks.check(target.path(), tokens)?;

        match self.api.create_dir(target.path()).await {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                Err(DavError::conflict("parent collection does not exist"))
            }
            // created concurrently
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match self.api.stat(target.path()).await?.kind {
                    ResourceKind::Directory => Ok(()),
                    ResourceKind::File => Err(DavError::conflict("a file exists at this path")),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates or fully replaces a file. The parent directory must exist.
    pub async fn write_file(
        &self, target: &PhysicalPath, body: ByteStream, tokens: &[String],
    ) -> DavResult<Outcome> {
        trace!("ME: write_file {}", target.logical());
        let outcome = match target.kind() {
            PathKind::Directory => return Err(DavError::conflict("a collection exists at this path")),
            PathKind::File => Outcome::NoContent,
            PathKind::NotFound => Outcome::Created,
        };
        self.ensure_outside_recycler(target)?;
        self.resolver.revalidate(target).await?;
        self.locks.check(target.path(), tokens)?;
        self.ensure_parent_dir(target.path(), DavError::NotFound).await?;

        let written = self.api.write(target.path(), body).await?;
        debug!("wrote {} bytes to {}", written, target.logical());
        Ok(outcome)
    }

    /// Deletes a resource by moving it into the recycler. Anything already
    /// inside the recycler is erased for good.
    pub async fn delete(&self, target: &PhysicalPath, tokens: &[String]) -> DavResult<()> {
        trace!("ME: delete {}", target.logical());
        if !target.exists() {
            return Err(DavError::NotFound);
        }
        if target.is_drive_root() {
            return Err(DavError::conflict("a drive root cannot be deleted"));
        }
        if self.resolver.is_recycler_root(target) {
            return Err(DavError::conflict("the recycler cannot be deleted"));
        }
        self.resolver.revalidate(target).await?;
        self.locks.check(target.path(), tokens)?;

        let kind = resource_kind(target)?;
        if self.resolver.is_in_recycler(target) {
            info!("purging {} on drive {}", target.logical(), target.drive());
            self.remove(target.path(), kind).await?;
        } else {
            self.recycle(target, kind).await?;
        }
        self.locks.forget(target.path());
        Ok(())
    }

    /// Moves a resource. Within a drive this is a single rename; across
    /// drives the whole subtree is copied before the source is removed.
    ///
    /// An overwritten destination goes to the recycler, and is put back
    /// when the move fails.
    pub async fn move_to(
        &self, src: &PhysicalPath, dst: &PhysicalPath, overwrite: bool, tokens: &[String],
    ) -> DavResult<Outcome> {
        trace!("ME: move {}:{} {}:{}", src.drive(), src.logical(), dst.drive(), dst.logical());
        let kind = resource_kind(src)?;
        if src.is_drive_root() || self.resolver.is_recycler_root(src) {
            return Err(DavError::conflict("a drive root or recycler cannot be moved"));
        }
        self.locks.check(src.path(), tokens)?;
        let (outcome, displaced) = self.prepare_destination(src, dst, overwrite, tokens).await?;

        let moved = if src.drive() == dst.drive() {
            self.relocate(src.path(), dst.path(), kind).await
        } else {
            info!("moving {} from drive {} to drive {}", src.logical(), src.drive(), dst.drive());
            self.transfer(src.path(), dst.path(), kind).await
        };
        if let Err(e) = moved {
            self.restore(displaced, dst).await;
            return Err(e);
        }
        self.locks.forget(src.path());
        if displaced.is_some() {
            self.locks.forget(dst.path());
        }
        Ok(outcome)
    }

    /// Copies a file byte for byte, or a directory with its whole subtree.
    pub async fn copy_to(
        &self, src: &PhysicalPath, dst: &PhysicalPath, overwrite: bool, tokens: &[String],
    ) -> DavResult<Outcome> {
        trace!("ME: copy {}:{} {}:{}", src.drive(), src.logical(), dst.drive(), dst.logical());
        let kind = resource_kind(src)?;
        let (outcome, displaced) = self.prepare_destination(src, dst, overwrite, tokens).await?;
        if let Err(e) = self.copy_or_rollback(src.path(), dst.path(), kind).await {
            self.restore(displaced, dst).await;
            return Err(e);
        }
        if displaced.is_some() {
            self.locks.forget(dst.path());
        }
        Ok(outcome)
    }

    // Shared MOVE/COPY preconditions. Parks an existing destination in the
    // recycler when overwriting is allowed.
    async fn prepare_destination(
        &self, src: &PhysicalPath, dst: &PhysicalPath, overwrite: bool, tokens: &[String],
    ) -> DavResult<(Outcome, Option<Displaced>)> {
        if src.drive() == dst.drive() && src.segments() == dst.segments() {
            return Err(DavError::conflict("source and destination are the same"));
        }
        if src.is_ancestor_of(dst) || dst.is_ancestor_of(src) {
            return Err(DavError::conflict("source and destination overlap"));
        }
        if dst.is_drive_root() {
            return Err(DavError::conflict("a drive root cannot be replaced"));
        }
        self.ensure_outside_recycler(dst)?;
        self.resolver.revalidate(src).await?;
        self.resolver.revalidate(dst).await?;
        self.locks.check(dst.path(), tokens)?;
        self.ensure_parent_dir(dst.path(), DavError::conflict("destination parent does not exist"))
            .await?;

        if !dst.exists() {
            return Ok((Outcome::Created, None));
        }
        if !overwrite {
            return Err(DavError::conflict("destination exists"));
        }
        let kind = resource_kind(dst)?;
        let slot = self.recycle(dst, kind).await?;
        Ok((Outcome::NoContent, Some(Displaced { slot, kind })))
    }

    // Puts a displaced destination back after a failed MOVE/COPY.
    async fn restore(&self, displaced: Option<Displaced>, dst: &PhysicalPath) {
        let Some(Displaced { slot, kind }) = displaced else { return };
        if self.api.stat(dst.path()).await.is_ok() {
            warn!("{} was partly replaced, previous content stays in the recycler", dst.logical());
            return;
        }
        match self.relocate(&slot, dst.path(), kind).await {
            Ok(()) => debug!("restored {} from the recycler", dst.logical()),
            Err(e) => warn!("previous content of {} stays in the recycler: {}", dst.logical(), e),
        }
    }

    fn ensure_outside_recycler(&self, target: &PhysicalPath) -> DavResult<()> {
        if self.resolver.is_in_recycler(target) {
            return Err(DavError::conflict("the recycler only accepts deletions"));
        }
        Ok(())
    }

    async fn ensure_parent_dir(&self, path: &Path, missing: DavError) -> DavResult<()> {
        let parent = path.parent().ok_or(DavError::PathTraversal)?;
        match self.api.stat(parent).await {
            Ok(entry) if entry.is_dir() => Ok(()),
            Ok(_) => Err(DavError::conflict("parent is not a collection")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(missing),
            Err(e) => Err(e.into()),
        }
    }

    // Moves the resource under the recycler root and returns where it landed.
    async fn recycle(&self, target: &PhysicalPath, kind: ResourceKind) -> DavResult<PathBuf> {
        let slot = self.free_slot(target).await?;
        if let Some(parent) = slot.parent() {
            self.api.create_dir_all(parent).await?;
        }
        self.relocate(target.path(), &slot, kind).await?;
        info!("recycled {} on drive {}", target.logical(), target.drive());
        Ok(slot)
    }

    // Recycler location mirroring the logical path. A level that is already
    // taken gets the first free `.1`, `.2`, ... suffix: a file standing where
    // a parent directory is needed, or anything standing at the last level.
    async fn free_slot(&self, target: &PhysicalPath) -> DavResult<PathBuf> {
        let (name, parents) = target
            .segments()
            .split_last()
            .ok_or(DavError::PathTraversal)?;
        let mut slot = self.resolver.recycler_root(target.drive())?.to_path_buf();
        for parent in parents {
            slot = self.pick_slot(&slot, parent, true).await?;
        }
        self.pick_slot(&slot, name, false).await
    }

    async fn pick_slot(&self, dir: &Path, name: &str, reuse_dir: bool) -> DavResult<PathBuf> {
        let mut candidate = dir.join(name);
        let mut n = 0u32;
        loop {
            match self.api.stat(&candidate).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(candidate),
                Err(e) => return Err(DavError::IoFailure(e)),
                Ok(entry) if reuse_dir && entry.is_dir() => return Ok(candidate),
                Ok(_) => {
                    n += 1;
                    candidate = dir.join(format!("{}.{}", name, n));
                }
            }
        }
    }

    // Rename, or copy then remove when the rename would cross devices.
    async fn relocate(&self, from: &Path, to: &Path, kind: ResourceKind) -> DavResult<()> {
        match self.api.rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                debug!("rename crosses devices, copying");
                self.transfer(from, to, kind).await
            }
            Err(e) => Err(e.into()),
        }
    }

    // Copy then remove. The source is only touched once the copy is complete.
    async fn transfer(&self, from: &Path, to: &Path, kind: ResourceKind) -> DavResult<()> {
        self.copy_or_rollback(from, to, kind).await?;
        self.remove(from, kind).await
    }

    async fn copy_or_rollback(&self, from: &Path, to: &Path, kind: ResourceKind) -> DavResult<()> {
        if let Err(e) = self.copy_tree(from, to, kind).await {
            warn!("copy failed, removing partial destination: {}", e);
            let cleanup = match self.api.stat(to).await {
                Ok(entry) => self.remove(to, entry.kind).await,
                Err(_) => Ok(()),
            };
            if let Err(ce) = cleanup {
                warn!("partial destination left behind: {}", ce);
            }
            return Err(e);
        }
        Ok(())
    }

    fn copy_tree<'a>(
        &'a self, from: &'a Path, to: &'a Path, kind: ResourceKind,
    ) -> BoxFuture<'a, DavResult<()>> {
        async move {
            match kind {
                ResourceKind::File => {
                    self.api.copy_file(from, to).await?;
                }
                ResourceKind::Directory => {
                    self.api.create_dir(to).await?;
                    let mut children = self.api.read_dir(from).await?;
                    children.sort_by(|a, b| a.path.cmp(&b.path));
                    for child in children {
                        let Some(name) = child.path.file_name() else { continue };
                        self.copy_tree(&child.path, &to.join(name), child.kind).await?;
                    }
                }
            }
            Ok(())
        }
            .boxed()
    }

    async fn remove(&self, path: &Path, kind: ResourceKind) -> DavResult<()> {
        match kind {
            ResourceKind::File => self.api.remove_file(path).await?,
            ResourceKind::Directory => self.api.remove_dir_all(path).await?,
        }
        Ok(())
    }
}

fn resource_kind(target: &PhysicalPath) -> DavResult<ResourceKind> {
    match target.kind() {
        PathKind::File => Ok(ResourceKind::File),
        PathKind::Directory => Ok(ResourceKind::Directory),
        PathKind::NotFound => Err(DavError::NotFound),
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{body_from_bytes, LocalApi};
    use crate::config::DavConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dirs: Vec<TempDir>,
        roots: Vec<PathBuf>,
        resolver: Arc<PathResolver>,
        locks: Arc<LockManager>,
        engine: MutationEngine,
    }

    async fn fixture(drives: usize) -> Fixture {
        let dirs: Vec<TempDir> = (0..drives).map(|_| TempDir::new().unwrap()).collect();
        let mut config = DavConfig::new("_recycler");
        for (i, dir) in dirs.iter().enumerate() {
            config = config.drive(&format!("d{}", i), dir.path());
        }
        let api: Arc<Box<dyn StorageApi>> = Arc::new(LocalApi::new() as Box<dyn StorageApi>);
        let resolver = Arc::new(PathResolver::new(&config, api.clone()).await.unwrap());
        let locks = Arc::new(LockManager::new());
        let engine = MutationEngine::new(api, resolver.clone(), locks.clone());
        let roots = dirs.iter().map(|d| d.path().canonicalize().unwrap()).collect();
        Fixture { _dirs: dirs, roots, resolver, locks, engine }
    }

    impl Fixture {
        async fn at(&self, drive: &str, p: &str) -> PhysicalPath {
            self.resolver.resolve(drive, p).await.unwrap()
        }
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let f = fixture(1).await;
        f.engine.create_directory(&f.at("d0", "/new").await, &[]).await.unwrap();
        f.engine.create_directory(&f.at("d0", "/new").await, &[]).await.unwrap();
        assert!(f.roots[0].join("new").is_dir());
    }

    #[tokio::test]
    async fn create_directory_over_file_conflicts() {
        let f = fixture(1).await;
        std::fs::write(f.roots[0].join("x"), b"").unwrap();
        let res = f.engine.create_directory(&f.at("d0", "/x").await, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
        let res = f.engine.create_directory(&f.at("d0", "/no/parent").await, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
    }

    #[tokio::test]
    async fn write_reports_created_then_replaced() {
        let f = fixture(1).await;
        let t = f.at("d0", "/a.txt").await;
        let first = f.engine.write_file(&t, body_from_bytes("one"), &[]).await.unwrap();
        assert_eq!(first, Outcome::Created);
        let t = f.at("d0", "/a.txt").await;
        let second = f.engine.write_file(&t, body_from_bytes("two"), &[]).await.unwrap();
        assert_eq!(second, Outcome::NoContent);
        assert_eq!(std::fs::read(f.roots[0].join("a.txt")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn write_without_parent_is_not_found() {
        let f = fixture(1).await;
        let t = f.at("d0", "/missing/a.txt").await;
        let res = f.engine.write_file(&t, body_from_bytes("x"), &[]).await;
        assert!(matches!(res, Err(DavError::NotFound)));
    }

    #[tokio::test]
    async fn locked_target_needs_token() {
        let f = fixture(1).await;
        let t = f.at("d0", "/a.txt").await;
        let held = f
            .locks
            .acquire(t.path(), Duration::from_secs(60), "", None)
            .unwrap();
        let res = f.engine.write_file(&t, body_from_bytes("x"), &[]).await;
        assert!(matches!(res, Err(DavError::Locked)));
        f.engine
            .write_file(&t, body_from_bytes("x"), &[held.token])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_moves_into_recycler() {
        let f = fixture(1).await;
        std::fs::create_dir(f.roots[0].join("docs")).unwrap();
        std::fs::write(f.roots[0].join("docs/report.pdf"), b"pdf").unwrap();

        f.engine.delete(&f.at("d0", "/docs/report.pdf").await, &[]).await.unwrap();
        assert!(!f.roots[0].join("docs/report.pdf").exists());
        assert_eq!(
            std::fs::read(f.roots[0].join("_recycler/docs/report.pdf")).unwrap(),
            b"pdf"
        );

        std::fs::write(f.roots[0].join("docs/report.pdf"), b"pdf2").unwrap();
        f.engine.delete(&f.at("d0", "/docs/report.pdf").await, &[]).await.unwrap();
        assert_eq!(
            std::fs::read(f.roots[0].join("_recycler/docs/report.pdf.1")).unwrap(),
            b"pdf2"
        );
    }

    #[tokio::test]
    async fn delete_inside_recycler_purges() {
        let f = fixture(1).await;
        std::fs::create_dir_all(f.roots[0].join("_recycler/old")).unwrap();
        f.engine.delete(&f.at("d0", "/_recycler/old").await, &[]).await.unwrap();
        assert!(!f.roots[0].join("_recycler/old").exists());

        let res = f.engine.delete(&f.at("d0", "/_recycler").await, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
        let res = f.engine.delete(&f.at("d0", "/").await, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
    }

    #[tokio::test]
    async fn copy_directory_recursively() {
        let f = fixture(2).await;
        std::fs::create_dir_all(f.roots[0].join("src/nested")).unwrap();
        std::fs::write(f.roots[0].join("src/a.txt"), b"a").unwrap();
        std::fs::write(f.roots[0].join("src/nested/b.txt"), b"b").unwrap();

        let src = f.at("d0", "/src").await;
        let out = f.engine.copy_to(&src, &f.at("d1", "/dst").await, true, &[]).await.unwrap();
        assert_eq!(out, Outcome::Created);
        assert_eq!(std::fs::read(f.roots[1].join("dst/a.txt")).unwrap(), b"a");
        assert_eq!(std::fs::read(f.roots[1].join("dst/nested/b.txt")).unwrap(), b"b");
        assert!(f.roots[0].join("src/nested/b.txt").exists());
    }

    #[tokio::test]
    async fn copy_respects_overwrite_flag() {
        let f = fixture(1).await;
        std::fs::write(f.roots[0].join("a"), b"new").unwrap();
        std::fs::write(f.roots[0].join("b"), b"old").unwrap();

        let res = f.engine.copy_to(&f.at("d0", "a").await, &f.at("d0", "b").await, false, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));

        let out = f
            .engine
            .copy_to(&f.at("d0", "a").await, &f.at("d0", "b").await, true, &[])
            .await
            .unwrap();
        assert_eq!(out, Outcome::NoContent);
        assert_eq!(std::fs::read(f.roots[0].join("b")).unwrap(), b"new");
        assert_eq!(std::fs::read(f.roots[0].join("_recycler/b")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn copy_into_own_subtree_conflicts() {
        let f = fixture(1).await;
        std::fs::create_dir(f.roots[0].join("dir")).unwrap();
        let res = f
            .engine
            .copy_to(&f.at("d0", "dir").await, &f.at("d0", "dir/inner").await, true, &[])
            .await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
    }

    #[tokio::test]
    async fn move_within_drive_renames() {
        let f = fixture(1).await;
        std::fs::create_dir(f.roots[0].join("dir")).unwrap();
        std::fs::write(f.roots[0].join("dir/x"), b"x").unwrap();
        let src = f.at("d0", "dir").await;
        let held = f.locks.acquire(&src.path().join("x"), Duration::from_secs(60), "", None).unwrap();

        let res = f.engine.move_to(&src, &f.at("d0", "moved").await, true, &[]).await;
        assert!(matches!(res, Err(DavError::Locked)));

        f.engine
            .move_to(&src, &f.at("d0", "moved").await, true, &[held.token])
            .await
            .unwrap();
        assert!(!f.roots[0].join("dir").exists());
        assert_eq!(std::fs::read(f.roots[0].join("moved/x")).unwrap(), b"x");
        assert!(!f.locks.is_locked(&src.path().join("x")));
    }

    #[tokio::test]
    async fn move_missing_source_is_not_found() {
        let f = fixture(2).await;
        let res = f
            .engine
            .move_to(&f.at("d0", "nope").await, &f.at("d1", "x").await, true, &[])
            .await;
        assert!(matches!(res, Err(DavError::NotFound)));
    }

    #[tokio::test]
    async fn recycler_level_taken_by_file_gets_suffix() {
        let f = fixture(1).await;
        let t = f.at("d0", "/a").await;
        f.engine.write_file(&t, body_from_bytes("file"), &[]).await.unwrap();
        f.engine.delete(&f.at("d0", "/a").await, &[]).await.unwrap();

        f.engine.create_directory(&f.at("d0", "/a").await, &[]).await.unwrap();
        let t = f.at("d0", "/a/b").await;
        f.engine.write_file(&t, body_from_bytes("child"), &[]).await.unwrap();
        f.engine.delete(&f.at("d0", "/a/b").await, &[]).await.unwrap();

        assert!(!f.roots[0].join("a/b").exists());
        assert_eq!(std::fs::read(f.roots[0].join("_recycler/a")).unwrap(), b"file");
        assert_eq!(std::fs::read(f.roots[0].join("_recycler/a.1/b")).unwrap(), b"child");

        // an existing recycler directory is reused
        let t = f.at("d0", "/a/c").await;
        f.engine.write_file(&t, body_from_bytes("c"), &[]).await.unwrap();
        f.engine.delete(&f.at("d0", "/a/c").await, &[]).await.unwrap();
        assert_eq!(std::fs::read(f.roots[0].join("_recycler/a.1/c")).unwrap(), b"c");
    }

    #[tokio::test]
    async fn recycler_only_accepts_deletions() {
        let f = fixture(1).await;
        std::fs::create_dir_all(f.roots[0].join("_recycler/old")).unwrap();
        std::fs::write(f.roots[0].join("a.txt"), b"a").unwrap();

        let t = f.at("d0", "/_recycler/x.txt").await;
        let res = f.engine.write_file(&t, body_from_bytes("x"), &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
        let res = f.engine.create_directory(&f.at("d0", "/_recycler/new").await, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
        let src = f.at("d0", "/a.txt").await;
        let res = f.engine.copy_to(&src, &f.at("d0", "/_recycler/a.txt").await, true, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
        let res = f.engine.move_to(&src, &f.at("d0", "/_recycler/old").await, true, &[]).await;
        assert!(matches!(res, Err(DavError::Conflict(_))));
        assert!(f.roots[0].join("a.txt").is_file());
        assert!(f.roots[0].join("_recycler/old").is_dir());

        // moving out of the recycler restores
        f.engine
            .move_to(&f.at("d0", "/_recycler/old").await, &f.at("d0", "/old").await, false, &[])
            .await
            .unwrap();
        assert!(f.roots[0].join("old").is_dir());
    }
}
