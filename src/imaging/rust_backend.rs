//! Pure Rust image codec with no system libraries.
//!
//! Everything is statically linked into the binary, including the font used
//! for placeholder captions.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Encode | `image::DynamicImage::write_to`, `JpegEncoder` for quality |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3`, sizes from [`calculations`](super::calculations) |
//! | Crop-fit | `crop_imm` on the centered window, then `resize_exact` to the box |
//! | Text | `imageproc::drawing::draw_text_mut` + embedded DejaVu Sans Mono (`ab_glyph`) |
//! | Composite | `image::imageops::overlay` |

use super::backend::{BackendError, Decoded, ImageCodec};
use super::calculations::{
    calculate_bounded_fit_dimensions, calculate_center_offset, calculate_centered_origin,
    calculate_crop_window,
};
use super::params::{CropParams, OutputFormat, Quality, ResizeParams, Rgba};
use ab_glyph::{FontRef, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

static CAPTION_FONT: LazyLock<FontRef<'static>> = LazyLock::new(|| {
    FontRef::try_from_slice(include_bytes!("../../assets/DejaVuSansMono.ttf"))
        .expect("embedded caption font must parse")
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// True when `path` has one of the [`supported_input_extensions`].
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Codec backed by the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn display_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy())
}

/// Convert to a pixel layout the target encoder accepts.
fn prepare_for(format: OutputFormat, image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match (format, image) {
        (OutputFormat::Jpeg, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_)) => {
            Cow::Borrowed(image)
        }
        (OutputFormat::Jpeg, _) => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        (
            OutputFormat::Gif | OutputFormat::WebP,
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_),
        ) => Cow::Borrowed(image),
        (OutputFormat::Gif | OutputFormat::WebP, _) => {
            Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8()))
        }
        _ => Cow::Borrowed(image),
    }
}

impl ImageCodec for RustBackend {
    fn decode(&self, path: &Path) -> Result<Decoded, BackendError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader
            .format()
            .map(OutputFormat::for_source)
            .or_else(|| OutputFormat::from_path(path))
            .unwrap_or(OutputFormat::Png);
        let image = reader.decode().map_err(|e| {
            BackendError::Decode(format!("Unable to decode {}: {}", display_name(path), e))
        })?;
        Ok(Decoded { image, format })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let image = prepare_for(format, image);
        let mut buf = Vec::new();
        let result = match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
                image.write_with_encoder(encoder)
            }
            other => image.write_to(&mut Cursor::new(&mut buf), other.image_format()),
        };
        result.map_err(|e| BackendError::Encode(format!("{format}: {e}")))?;
        Ok(buf)
    }

    fn resize(&self, image: DynamicImage, params: &ResizeParams) -> DynamicImage {
        let source = (image.width(), image.height());
        let max_edge = params.max_edge.max(1);
        let mut target = if params.preserve_aspect {
            calculate_bounded_fit_dimensions(source, params.width, params.height, max_edge)
        } else {
            (
                params.width.unwrap_or(source.0).clamp(1, max_edge),
                params.height.unwrap_or(source.1).clamp(1, max_edge),
            )
        };
        if !params.allow_upsize && (target.0 > source.0 || target.1 > source.1) {
            target = source;
        }
        if target == source {
            return image;
        }
        image.resize_exact(target.0, target.1, FilterType::Lanczos3)
    }

    fn crop_fit(&self, image: DynamicImage, params: &CropParams) -> DynamicImage {
        let source = (image.width(), image.height());
        let max_edge = params.max_edge.max(1);
        let target = (
            params.width.clamp(1, max_edge),
            params.height.clamp(1, max_edge),
        );
        // Crop first, then scale: the only new buffers are the window and the target
        let window = calculate_crop_window(source, target);
        let cropped = if window == source {
            image
        } else {
            let (x, y) = calculate_center_offset(source, window);
            image.crop_imm(x, y, window.0, window.1)
        };

        if window == target || (!params.allow_upsize && window.0 < target.0) {
            // Without upsizing, the window is the largest box of the target aspect
            return cropped;
        }
        cropped.resize_exact(target.0, target.1, FilterType::Lanczos3)
    }

    fn canvas(&self, width: u32, height: u32, background: Rgba) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width.max(1),
            height.max(1),
            background.into(),
        ))
    }

    fn draw_text_centered(&self, image: &mut DynamicImage, text: &str, color: Rgba, size: f32) {
        if text.is_empty() {
            return;
        }
        let font = &*CAPTION_FONT;
        let scale = PxScale::from(size.max(1.0));
        let (text_w, text_h) = imageproc::drawing::text_size(scale, font, text);
        let x = (image.width() as i32 - text_w as i32) / 2;
        let y = (image.height() as i32 - text_h as i32) / 2;

        if let DynamicImage::ImageRgba8(buf) = image {
            imageproc::drawing::draw_text_mut(buf, color.into(), x, y, scale, font, text);
        } else {
            let mut buf = image.to_rgba8();
            imageproc::drawing::draw_text_mut(&mut buf, color.into(), x, y, scale, font, text);
            *image = DynamicImage::ImageRgba8(buf);
        }
    }

    fn insert_centered(&self, image: &mut DynamicImage, overlay: &DynamicImage) {
        let (x, y) = calculate_centered_origin(
            (image.width(), image.height()),
            (overlay.width(), overlay.height()),
        );
        image::imageops::overlay(image, overlay, x, y);
    }
}
