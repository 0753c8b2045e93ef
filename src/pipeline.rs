//! The resize pipeline: decode, fit or crop, post-process, encode, persist.
//!
//! ```text
//! source file ──decode──► DynamicImage
//!                           │ Geometry::plan(size)
//!                           ▼
//!                 Natural | Fit(w?, h?) | Crop(w, h)
//!                           │ TransformRegistry::apply (default, then callback)
//!                           ▼
//!                  encode in the source's format ──► Rendered
//!                           │
//!                           └──► DerivativeCache::store (best effort)
//! ```
//!
//! Upscaling is always allowed. Both output edges are capped at the
//! configured maximum, including an edge derived from the source aspect
//! ratio, before any pixels are allocated.

use crate::cache::DerivativeCache;
use crate::imaging::{
    BackendError, CropParams, Dimensions, ImageCodec, OutputFormat, Quality, ResizeParams,
};
use crate::size::{CropMode, SizeSpec};
use crate::transform::TransformRegistry;
use std::path::Path;
use tracing::{debug, warn};

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Geometric step chosen for a size token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// Neither width nor height requested: keep the source size.
    Natural,
    /// Aspect-preserving resize inside the given bounds.
    Fit {
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Fill and center-crop to exactly this box.
    Crop { width: u32, height: u32 },
}

impl Geometry {
    /// Decide the geometric step for `size`, clamping each edge to `max_edge`.
    ///
    /// A crop with only one edge given crops to a square of that edge.
    pub fn plan(size: &SizeSpec, max_edge: u32) -> Self {
        let clamp = |v: Option<u32>| v.map(|v| v.min(max_edge.max(1)));
        let (width, height) = (clamp(size.width()), clamp(size.height()));
        match (size.crop, width, height) {
            (_, None, None) => Self::Natural,
            (CropMode::Crop, Some(w), Some(h)) => Self::Crop {
                width: w,
                height: h,
            },
            (CropMode::Crop, Some(edge), None) | (CropMode::Crop, None, Some(edge)) => {
                Self::Crop {
                    width: edge,
                    height: edge,
                }
            }
            (CropMode::None, width, height) => Self::Fit { width, height },
        }
    }
}

/// An encoded derivative, ready to stream.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub dimensions: Dimensions,
}

/// Everything a render needs besides the request itself.
pub struct ResizePipeline<'a, B: ImageCodec + ?Sized> {
    backend: &'a B,
    transforms: &'a TransformRegistry,
    quality: Quality,
    max_edge: u32,
}

impl<'a, B: ImageCodec + ?Sized> ResizePipeline<'a, B> {
    pub fn new(
        backend: &'a B,
        transforms: &'a TransformRegistry,
        quality: Quality,
        max_edge: u32,
    ) -> Self {
        Self {
            backend,
            transforms,
            quality,
            max_edge,
        }
    }

    /// Decode `source`, apply the geometry and hooks for `size`, and encode.
    ///
    /// Fails only when the source cannot be read, decoded or re-encoded.
    pub fn render(&self, source: &Path, size: &SizeSpec) -> Result<Rendered> {
        let decoded = self.backend.decode(source)?;
        let format = decoded.format;
        let original = Dimensions::from(&decoded.image);

        let geometry = Geometry::plan(size, self.max_edge);
        let image = match geometry {
            Geometry::Natural => decoded.image,
            Geometry::Fit { width, height } => self.backend.resize(
                decoded.image,
                &ResizeParams {
                    width,
                    height,
                    preserve_aspect: true,
                    allow_upsize: true,
                    max_edge: self.max_edge,
                },
            ),
            Geometry::Crop { width, height } => self.backend.crop_fit(
                decoded.image,
                &CropParams {
                    width,
                    height,
                    allow_upsize: true,
                    max_edge: self.max_edge,
                },
            ),
        };

        if let Some(callback) = size.callback()
            && !self.transforms.contains(callback)
        {
            debug!(callback, "no hook registered under this name; skipping");
        }
        let image = self.transforms.apply(image, size.callback());
        let dimensions = Dimensions::from(&image);
        let bytes = self.backend.encode(&image, format, self.quality)?;

        debug!(
            source = %source.display(),
            ?geometry,
            from = ?(original.width, original.height),
            to = ?(dimensions.width, dimensions.height),
            %format,
            quality = ?format.is_lossy().then_some(self.quality.value()),
            bytes = bytes.len(),
            "rendered derivative"
        );
        Ok(Rendered {
            bytes,
            format,
            dimensions,
        })
    }

    /// [`render`](Self::render), then write the result to `cache_file`.
    ///
    /// A failed write is logged and otherwise ignored: the caller still gets
    /// the rendered bytes.
    pub fn render_to_cache(
        &self,
        source: &Path,
        size: &SizeSpec,
        cache: &DerivativeCache,
        cache_file: Option<&Path>,
    ) -> Result<Rendered> {
        let rendered = self.render(source, size)?;
        if let Some(cache_file) = cache_file
            && let Err(e) = cache.store(cache_file, &rendered.bytes)
        {
            warn!(path = %cache_file.display(), error = %e, "cache write failed");
        }
        Ok(rendered)
    }
}
