//! Image codec capability trait and shared types.
//!
//! The [`ImageCodec`] trait is everything the service needs from an image
//! library: decode, encode, resize, crop-fit, blank canvases, centered text
//! and centered compositing. The pipeline and the fallback renderer only talk
//! to this trait.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): the `image` crate plus
//! `imageproc` for text. Everything is statically linked into the binary.

use super::params::{CropParams, OutputFormat, Quality, ResizeParams, Rgba};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Decode(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
}

impl BackendError {
    /// True when the source file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<&DynamicImage> for Dimensions {
    fn from(img: &DynamicImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
        }
    }
}

/// A decoded source image and the format its derivatives are written in.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub image: DynamicImage,
    pub format: OutputFormat,
}

/// Capability interface over an image library.
///
/// Implementations must be `Send + Sync`: one codec is shared by every
/// request thread.
pub trait ImageCodec: Send + Sync {
    /// Decode a file from disk, detecting its format from the content.
    fn decode(&self, path: &Path) -> Result<Decoded, BackendError>;

    /// Encode to bytes. `quality` only matters for lossy formats.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// Resize within the given bounds.
    fn resize(&self, image: DynamicImage, params: &ResizeParams) -> DynamicImage;

    /// Fill the box and center-crop to it.
    fn crop_fit(&self, image: DynamicImage, params: &CropParams) -> DynamicImage;

    /// A flat-color canvas.
    fn canvas(&self, width: u32, height: u32, background: Rgba) -> DynamicImage;

    /// Draw `text` centered on the image.
    fn draw_text_centered(&self, image: &mut DynamicImage, text: &str, color: Rgba, size: f32);

    /// Composite `overlay` at the center of `image`, clipping what does not fit.
    fn insert_centered(&self, image: &mut DynamicImage, overlay: &DynamicImage);
}
