//! The per-request state machine.
//!
//! ```text
//! resize(source, token)
//!   ├─ invalid source id ─────────────────────────► placeholder
//!   ├─ cache fresh ──► read cached file ─ ok ─────► hit
//!   │                                    └ error ─┐
//!   └─ cache missing/stale ◄──────────────────────┘
//!        └─ render ─ ok ──► store (best effort) ──► miss
//!                  └ err ─────────────────────────► placeholder
//!
//! flush(source)
//!   ├─ file readable ─────────────────────────────► passthrough
//!   └─ otherwise ─────────────────────────────────► placeholder (default size)
//! ```
//!
//! Every branch ends in an [`ImageResponse`]; none of them is an error.

use crate::cache::{DerivativeCache, Freshness};
use crate::config::{ConfigError, ServiceConfig};
use crate::fallback::{PLACEHOLDER_PNG, Placeholder};
use crate::imaging::{BackendError, ImageCodec, Quality, RustBackend};
use crate::pipeline::ResizePipeline;
use crate::response::{CacheStatus, ImageResponse};
use crate::size::{CropMode, SizeSpec, is_size_token};
use crate::source::{SourceError, SourceId};
use crate::transform::{Transform, TransformRegistry};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Message drawn on placeholders for rejected identifiers.
pub const INVALID_PATH_MESSAGE: &str = "invalid image path";

/// Serves resized derivatives, raw sources and placeholders.
pub struct ImageController<B: ImageCodec = RustBackend> {
    backend: B,
    image_root: PathBuf,
    cache: DerivativeCache,
    cache_url: Option<String>,
    route_prefix: String,
    transforms: TransformRegistry,
    placeholder: Placeholder,
    quality: Quality,
    max_edge: u32,
}

impl ImageController<RustBackend> {
    /// Build a controller over the pure-Rust codec.
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        Self::with_backend(config, RustBackend::new())
    }
}

impl<B: ImageCodec> ImageController<B> {
    /// Build a controller over any codec. Fails only on invalid config.
    pub fn with_backend(config: &ServiceConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let image_root = config.image_root()?.to_path_buf();
        if !image_root.is_dir() {
            warn!(
                path = %image_root.display(),
                "image_path is not a directory; every request will get a placeholder"
            );
        }
        let controller = Self {
            backend,
            image_root,
            cache: config.cache(),
            cache_url: config.normalized_cache_url(),
            route_prefix: config.normalized_route_prefix(),
            transforms: config.transform_registry(),
            placeholder: config.placeholder()?,
            quality: Quality::new(config.default_quality),
            max_edge: config.max_dimension,
        };
        info!(
            image_root = %controller.image_root.display(),
            cache_root = ?controller.cache.root(),
            ttl = ?controller.cache.ttl(),
            hooks = ?controller.transforms,
            "image controller ready"
        );
        Ok(controller)
    }

    /// Register (or replace) a post-process hook under `key`.
    pub fn register_transform(&mut self, key: impl Into<String>, hook: impl Transform + 'static) {
        self.transforms.register(key, hook);
    }

    pub fn image_root(&self) -> &Path {
        &self.image_root
    }

    pub fn cache(&self) -> &DerivativeCache {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The resize pipeline bound to this controller's codec and hooks.
    pub fn pipeline(&self) -> ResizePipeline<'_, B> {
        ResizePipeline::new(&self.backend, &self.transforms, self.quality, self.max_edge)
    }

    /// Route a request path (relative to the mount point).
    ///
    /// `<token>/<rest>` with a size token and non-empty rest is a resize;
    /// everything else is a flush of the whole path.
    pub fn dispatch(&self, path: &str) -> ImageResponse {
        match path.split_once('/') {
            Some((token, rest)) if is_size_token(token) && !rest.is_empty() => {
                self.resize(rest, token)
            }
            _ => self.flush(path),
        }
    }

    /// Serve `source` resized per `token`, from cache when fresh.
    pub fn resize(&self, source: &str, token: &str) -> ImageResponse {
        let size = SizeSpec::parse(token);
        let id = match SourceId::parse(source) {
            Ok(id) => id,
            Err(e) => return self.reject(source, e, size.width, size.height),
        };
        let source_file = id.under(&self.image_root);
        let cache_file = self.cache.resolve(&id, token);

        if let Some(cached) = &cache_file {
            match self.cache.check(cached, &source_file) {
                Freshness::Valid(_) => match std::fs::read(cached) {
                    Ok(bytes) => {
                        debug!(source = %id, token, "cache hit");
                        return ImageResponse::new(bytes, CacheStatus::Hit);
                    }
                    Err(e) => {
                        debug!(source = %id, token, error = %e, "cached file unreadable");
                    }
                },
                Freshness::Invalid(reason) => {
                    debug!(source = %id, token, %reason, "cache miss");
                }
            }
        }

        let rendered =
            self.pipeline()
                .render_to_cache(&source_file, &size, &self.cache, cache_file.as_deref());
        match rendered {
            Ok(rendered) => ImageResponse::new(rendered.bytes, CacheStatus::Miss),
            Err(e) => {
                let message = failure_message(&id, &e);
                warn!(source = %id, token, error = %e, "serving placeholder");
                self.placeholder(size.width, size.height, &message)
            }
        }
    }

    /// Serve `source` byte-for-byte, or a default-size placeholder.
    pub fn flush(&self, source: &str) -> ImageResponse {
        let id = match SourceId::parse(source) {
            Ok(id) => id,
            Err(e) => return self.reject(source, e, 0, 0),
        };
        let source_file = id.under(&self.image_root);
        match read_file(&source_file) {
            Ok(bytes) => {
                debug!(source = %id, bytes = bytes.len(), "passthrough");
                ImageResponse::new(bytes, CacheStatus::Passthrough)
            }
            Err(e) => {
                let message = failure_message(&id, &BackendError::Io(e));
                warn!(source = %id, %message, "serving placeholder");
                self.placeholder(0, 0, &message)
            }
        }
    }

    /// Public URL for a derivative.
    ///
    /// Points straight at the cached file when `cache_url` is configured and
    /// a fresh derivative exists; otherwise at the resize route (or the flush
    /// route when neither edge is given).
    pub fn image_url(
        &self,
        source: &str,
        width: u32,
        height: u32,
        crop: CropMode,
        callback: &str,
    ) -> Result<String, SourceError> {
        let id = SourceId::parse(source)?;
        let token = SizeSpec::new(width, height, crop, callback).to_string();

        if let Some(cache_url) = &self.cache_url
            && let Some(rel) = self.cache.relative_path(&id, &token)
            && let Some(cached) = self.cache.resolve(&id, &token)
            && self
                .cache
                .check(&cached, &id.under(&self.image_root))
                .is_valid()
        {
            return Ok(format!("{cache_url}{}", url_path(&rel)));
        }

        if width > 0 || height > 0 {
            Ok(format!("{}{token}/{id}", self.route_prefix))
        } else {
            Ok(format!("{}{id}", self.route_prefix))
        }
    }

    fn reject(&self, raw: &str, error: SourceError, width: u32, height: u32) -> ImageResponse {
        warn!(source = raw, error = %error, "rejected image path");
        self.placeholder(width, height, INVALID_PATH_MESSAGE)
    }

    fn placeholder(&self, width: u32, height: u32, message: &str) -> ImageResponse {
        let body = match self.placeholder.render(&self.backend, width, height, message) {
            Ok(rendered) => rendered.bytes,
            Err(e) => {
                warn!(error = %e, "placeholder rendering failed, serving bare graphic");
                PLACEHOLDER_PNG.to_vec()
            }
        };
        ImageResponse::new(body, CacheStatus::Placeholder)
    }
}

/// Read a regular file; directories count as not found.
fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    if path.is_dir() {
        return Err(io::Error::from(io::ErrorKind::NotFound));
    }
    std::fs::read(path)
}

/// Text drawn on the placeholder. Never contains the image root.
fn failure_message(id: &SourceId, error: &BackendError) -> String {
    if error.is_not_found() {
        format!("{id} not found")
    } else {
        error.to_string()
    }
}

fn url_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
