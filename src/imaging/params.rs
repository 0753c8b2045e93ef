//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They sit between the
//! pipeline (which decides sizes and formats) and the
//! [`backend`](super::backend) (which does the pixel work), so a mock backend
//! can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`OutputFormat`]: Encoded byte format of a derivative or placeholder.
//! - [`Rgba`]: A color parsed from `#rrggbb` / `#rrggbbaa` config strings.
//! - [`ResizeParams`]: Bounds for an aspect-preserving (or stretching) resize.
//! - [`CropParams`]: Exact box for a fill-and-center-crop.

use image::ImageFormat;
use std::fmt;
use std::path::Path;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Formats the service can encode.
///
/// Derivatives keep the format of their source; anything that cannot be
/// written back falls back to PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
    Tiff,
}

impl OutputFormat {
    /// Map a detected source format to the format its derivative is written in.
    pub fn for_source(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::WebP => Self::WebP,
            ImageFormat::Gif => Self::Gif,
            ImageFormat::Tiff => Self::Tiff,
            _ => Self::Png,
        }
    }

    /// Guess from a file extension, for sources whose content sniffing failed.
    pub fn from_path(path: &Path) -> Option<Self> {
        ImageFormat::from_path(path).ok().map(Self::for_source)
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    /// Whether [`Quality`] has any effect on the encoder.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        };
        f.write_str(name)
    }
}

/// Parameters for a bounded resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Keep the source aspect ratio; otherwise missing bounds keep the source edge.
    pub preserve_aspect: bool,
    pub allow_upsize: bool,
    /// Cap on both output edges, including the one derived from the aspect ratio.
    pub max_edge: u32,
}

/// Parameters for a fill-and-crop to an exact box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropParams {
    pub width: u32,
    pub height: u32,
    pub allow_upsize: bool,
    /// Cap on both output edges.
    pub max_edge: u32,
}

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#').unwrap_or(value);
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0, 0, 0, 255];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self(out))
            }
            6 => Some(Self([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Some(Self([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => None,
        }
    }
}

impl From<Rgba> for image::Rgba<u8> {
    fn from(c: Rgba) -> Self {
        image::Rgba(c.0)
    }
}
