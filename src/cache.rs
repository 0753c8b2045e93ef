//! Filesystem-backed derivative cache.
//!
//! There is no manifest: the directory tree under the cache root *is* the
//! index. A derivative of `products/shoe.jpg` at size token `200x300` lives at
//! `<cache_root>/200x300/products/shoe.jpg`, and its validity is derived from
//! two timestamp comparisons at request time.
//!
//! # Freshness
//!
//! [`DerivativeCache::check`] evaluates, in order:
//! 1. cache file missing → invalid
//! 2. source mtime strictly newer than cache mtime → invalid
//! 3. TTL non-zero and cache age strictly greater than TTL → invalid
//! 4. otherwise valid
//!
//! Metadata reads that fail count as invalid; checking never errors. A cache
//! file dated in the future (clock skew) is not considered expired.
//!
//! # Writes
//!
//! [`DerivativeCache::store`] writes to a temporary file in the destination
//! directory and renames it into place, so readers only ever see complete
//! derivatives. Two requests racing on the same key both write; the last
//! rename wins and both bytes are identical.
//!
//! # Invalidation
//!
//! Staleness is normally implicit: stale files are bypassed and overwritten.
//! [`DerivativeCache::invalidate`] and [`DerivativeCache::purge`] remove files
//! explicitly for operators who want the disk back.

use crate::source::SourceId;
use std::fmt;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to move derivative into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk cache tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Why a cached derivative cannot be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No cache file, or its metadata could not be read.
    Missing,
    /// The source's metadata could not be read (it vanished, or permissions).
    SourceUnreadable,
    /// The source was modified after the derivative was written.
    SourceNewer,
    /// The derivative is older than the configured TTL.
    Expired,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Missing => "missing",
            Self::SourceUnreadable => "source unreadable",
            Self::SourceNewer => "source newer",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Outcome of a freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The derivative can be served; carries its modification time.
    Valid(SystemTime),
    Invalid(StaleReason),
}

impl Freshness {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Which derivatives [`DerivativeCache::purge`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurgeMode {
    /// Only derivatives that would fail a freshness check.
    #[default]
    Stale,
    /// Everything under the cache root.
    All,
}

/// Summary of a purge run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub scanned: u32,
    pub removed: u32,
    pub bytes_freed: u64,
}

impl PurgeStats {
    pub fn kept(&self) -> u32 {
        self.scanned - self.removed
    }
}

impl fmt::Display for PurgeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scanned == 0 {
            return write!(f, "cache empty");
        }
        write!(
            f,
            "{} removed, {} kept ({} scanned, {} KiB freed)",
            self.removed,
            self.kept(),
            self.scanned,
            self.bytes_freed / 1024
        )
    }
}

/// Resolver, freshness checker and writer for cached derivatives.
#[derive(Debug, Clone)]
pub struct DerivativeCache {
    root: Option<PathBuf>,
    ttl: Option<Duration>,
}

impl DerivativeCache {
    /// `ttl_secs == 0` disables the age check.
    pub fn new(root: Option<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            root,
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }

    /// A cache that never resolves a path.
    pub fn disabled() -> Self {
        Self::new(None, 0)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cache-relative path for a derivative: `<token>/<source>`, or just
    /// `<source>` when the token is empty.
    ///
    /// Returns `None` when caching is disabled or the token is not a single
    /// plain path segment.
    pub fn relative_path(&self, source: &SourceId, token: &str) -> Option<PathBuf> {
        self.root.as_ref()?;
        let source_rel = source.under(Path::new(""));
        if token.is_empty() {
            return Some(source_rel);
        }
        let mut components = Path::new(token).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !token.contains(['/', '\\']) => {
                Some(Path::new(token).join(source_rel))
            }
            _ => None,
        }
    }

    /// Absolute cache path for a derivative; see [`relative_path`](Self::relative_path).
    pub fn resolve(&self, source: &SourceId, token: &str) -> Option<PathBuf> {
        let rel = self.relative_path(source, token)?;
        self.root.as_ref().map(|root| root.join(rel))
    }

    /// Decide whether `cache_file` may be served in place of rendering `source_file`.
    pub fn check(&self, cache_file: &Path, source_file: &Path) -> Freshness {
        self.check_at(cache_file, source_file, SystemTime::now())
    }

    /// [`check`](Self::check) against an explicit clock.
    pub fn check_at(&self, cache_file: &Path, source_file: &Path, now: SystemTime) -> Freshness {
        let Some(cached) = modified(cache_file) else {
            return Freshness::Invalid(StaleReason::Missing);
        };
        let Some(source) = modified(source_file) else {
            return Freshness::Invalid(StaleReason::SourceUnreadable);
        };
        if source > cached {
            return Freshness::Invalid(StaleReason::SourceNewer);
        }
        if let Some(ttl) = self.ttl
            && let Ok(age) = now.duration_since(cached)
            && age > ttl
        {
            return Freshness::Invalid(StaleReason::Expired);
        }
        Freshness::Valid(cached)
    }

    /// Atomically write `bytes` to `cache_file`, creating parent directories.
    pub fn store(&self, cache_file: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let parent = cache_file.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".derivative-")
            .tempfile_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(cache_file).map_err(|e| CacheError::Persist {
            path: cache_file.to_path_buf(),
            source: e.error,
        })?;
        debug!(path = %cache_file.display(), bytes = bytes.len(), "stored derivative");
        Ok(())
    }

    /// Remove every cached size of `source`. Returns the number of files removed.
    pub fn invalidate(&self, source: &SourceId) -> Result<u32, CacheError> {
        let Some(root) = &self.root else {
            return Ok(0);
        };
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let derivative = source.under(&entry.path());
            match std::fs::remove_file(&derivative) {
                Ok(()) => {
                    debug!(path = %derivative.display(), "invalidated derivative");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Walk the cache tree and delete derivatives per `mode`.
    ///
    /// A derivative at `<root>/<token>/<rel>` is checked against
    /// `<image_root>/<rel>`; orphans whose source is gone count as stale.
    /// Directories left empty are removed afterwards.
    pub fn purge(&self, image_root: &Path, mode: PurgeMode) -> Result<PurgeStats, CacheError> {
        let mut stats = PurgeStats::default();
        let Some(root) = &self.root else {
            return Ok(stats);
        };
        if !root.exists() {
            return Ok(stats);
        }

        let now = SystemTime::now();
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            stats.scanned += 1;
            let remove = match mode {
                PurgeMode::All => true,
                PurgeMode::Stale => {
                    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                    let mut parts = rel.components();
                    parts.next();
                    let source_rel = parts.as_path();
                    // Files directly under the root are not derivatives
                    !source_rel.as_os_str().is_empty()
                        && !self
                            .check_at(entry.path(), &image_root.join(source_rel), now)
                            .is_valid()
                }
            };
            if remove {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                std::fs::remove_file(entry.path())?;
                stats.removed += 1;
                stats.bytes_freed += size;
            }
        }

        for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                // Non-empty directories refuse removal
                let _ = std::fs::remove_dir(entry.path());
            }
        }
        Ok(stats)
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
