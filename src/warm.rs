//! Cache pre-warming.
//!
//! Walks the image directory and renders every decodable source at each of a
//! list of size tokens, so the first real request is a cache hit. Images are
//! processed in parallel with [rayon](https://docs.rs/rayon); derivatives
//! that are already fresh are left alone.
//!
//! Progress is reported per image over an optional channel, which the CLI
//! drains on a printer thread.

use crate::cache::Freshness;
use crate::controller::ImageController;
use crate::imaging::{ImageCodec, has_supported_extension};
use crate::size::{SizeSpec, is_size_token};
use crate::source::SourceId;
use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WarmError {
    #[error("cache_path is not configured; nothing to warm")]
    CacheDisabled,
    #[error("not a size token: {0}")]
    InvalidToken(String),
    #[error("failed to walk image directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Outcome for one (source, token) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmStatus {
    /// Already fresh on disk.
    Fresh,
    Rendered,
    Failed(String),
}

/// Per-image progress event.
#[derive(Debug, Clone)]
pub struct WarmEvent {
    pub source: String,
    pub results: Vec<(String, WarmStatus)>,
}

impl fmt::Display for WarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "    {}", self.source)?;
        for (token, status) in &self.results {
            match status {
                WarmStatus::Fresh => write!(f, "\n        {token}: fresh")?,
                WarmStatus::Rendered => write!(f, "\n        {token}: rendered")?,
                WarmStatus::Failed(msg) => write!(f, "\n        {token}: failed ({msg})")?,
            }
        }
        Ok(())
    }
}

/// Totals over a warm run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmStats {
    pub images: u32,
    pub fresh: u32,
    pub rendered: u32,
    pub failed: u32,
}

impl WarmStats {
    fn record(&mut self, status: &WarmStatus) {
        match status {
            WarmStatus::Fresh => self.fresh += 1,
            WarmStatus::Rendered => self.rendered += 1,
            WarmStatus::Failed(_) => self.failed += 1,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.images += other.images;
        self.fresh += other.fresh;
        self.rendered += other.rendered;
        self.failed += other.failed;
        self
    }

    pub fn total(&self) -> u32 {
        self.fresh + self.rendered + self.failed
    }
}

impl fmt::Display for WarmStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images: {} fresh, {} rendered",
            self.images, self.fresh, self.rendered
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

/// Relative `/`-joined identifiers of every supported image under `root`.
///
/// Hidden files and directories are skipped. Sorted for stable output.
pub fn discover_sources(root: &Path) -> Result<Vec<SourceId>, WarmError> {
    let mut sources = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_supported_extension(entry.path()) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let raw = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match SourceId::parse(&raw) {
            Ok(id) => sources.push(id),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping source"),
        }
    }
    sources.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(sources)
}

/// Render `tokens` for every source under the controller's image root.
pub fn warm<B: ImageCodec>(
    controller: &ImageController<B>,
    tokens: &[String],
    progress: Option<Sender<WarmEvent>>,
) -> Result<WarmStats, WarmError> {
    let cache = controller.cache();
    if !cache.is_enabled() {
        return Err(WarmError::CacheDisabled);
    }
    if let Some(bad) = tokens.iter().find(|t| !is_size_token(t)) {
        return Err(WarmError::InvalidToken(bad.clone()));
    }

    let sources = discover_sources(controller.image_root())?;
    debug!(count = sources.len(), tokens = ?tokens, "warming cache");

    let stats = sources
        .par_iter()
        .map(|id| {
            let results: Vec<(String, WarmStatus)> = tokens
                .iter()
                .map(|token| (token.clone(), warm_one(controller, id, token)))
                .collect();
            let mut stats = WarmStats {
                images: 1,
                ..WarmStats::default()
            };
            for (_, status) in &results {
                stats.record(status);
            }
            if let Some(tx) = &progress {
                // Receiver gone means nobody is printing; keep working
                let _ = tx.send(WarmEvent {
                    source: id.to_string(),
                    results,
                });
            }
            stats
        })
        .reduce(WarmStats::default, WarmStats::merge);
    Ok(stats)
}

fn warm_one<B: ImageCodec>(controller: &ImageController<B>, id: &SourceId, token: &str) -> WarmStatus {
    let cache = controller.cache();
    let source_file = id.under(controller.image_root());
    let Some(cache_file) = cache.resolve(id, token) else {
        return WarmStatus::Failed("no cache path".into());
    };
    if let Freshness::Valid(_) = cache.check(&cache_file, &source_file) {
        return WarmStatus::Fresh;
    }
    let size = SizeSpec::parse(token);
    let rendered = controller.pipeline().render(&source_file, &size);
    match rendered.map(|r| cache.store(&cache_file, &r.bytes)) {
        Ok(Ok(())) => WarmStatus::Rendered,
        Ok(Err(e)) => WarmStatus::Failed(e.to_string()),
        Err(e) => WarmStatus::Failed(e.to_string()),
    }
}
