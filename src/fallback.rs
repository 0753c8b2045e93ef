//! Placeholder images for sources that are missing or cannot be decoded.
//!
//! A placeholder is a flat canvas with the embedded placeholder graphic in
//! the middle and the error message drawn centered on top, always encoded as
//! PNG. Placeholders are never cached.

use crate::imaging::{BackendError, Dimensions, ImageCodec, OutputFormat, Quality, Rgba};
use crate::pipeline::Rendered;
use image::{DynamicImage, ImageFormat};
use std::sync::LazyLock;
use tracing::debug;

/// The embedded 30×30 placeholder graphic, as PNG bytes.
///
/// Also served verbatim if rendering a placeholder fails outright.
pub const PLACEHOLDER_PNG: &[u8] = include_bytes!("../assets/placeholder.png");

static PLACEHOLDER_GRAPHIC: LazyLock<DynamicImage> = LazyLock::new(|| {
    image::load_from_memory_with_format(PLACEHOLDER_PNG, ImageFormat::Png)
        .expect("embedded placeholder graphic must decode")
});

/// Look and default size of placeholders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placeholder {
    pub default_width: u32,
    pub default_height: u32,
    pub max_edge: u32,
    pub background: Rgba,
    pub text_color: Rgba,
    pub font_size: f32,
    /// Encoder quality, shared with derivatives.
    pub quality: Quality,
}

impl Default for Placeholder {
    fn default() -> Self {
        Self {
            default_width: 32,
            default_height: 32,
            max_edge: 8192,
            background: Rgba([0xee, 0xee, 0xee, 0xff]),
            text_color: Rgba([0x77, 0x77, 0x77, 0xff]),
            font_size: 12.0,
            quality: Quality::default(),
        }
    }
}

impl Placeholder {
    /// Canvas size for a request: each zero edge takes its configured default.
    pub fn dimensions(&self, width: u32, height: u32) -> Dimensions {
        let pick = |requested: u32, default: u32| {
            let edge = if requested == 0 { default } else { requested };
            edge.clamp(1, self.max_edge.max(1))
        };
        Dimensions {
            width: pick(width, self.default_width),
            height: pick(height, self.default_height),
        }
    }

    /// Render a placeholder of `width` × `height` carrying `message`.
    pub fn render(
        &self,
        backend: &(impl ImageCodec + ?Sized),
        width: u32,
        height: u32,
        message: &str,
    ) -> Result<Rendered, BackendError> {
        let dimensions = self.dimensions(width, height);
        let mut canvas = backend.canvas(dimensions.width, dimensions.height, self.background);
        backend.insert_centered(&mut canvas, &PLACEHOLDER_GRAPHIC);
        backend.draw_text_centered(&mut canvas, message, self.text_color, self.font_size);
        let bytes = backend.encode(&canvas, OutputFormat::Png, self.quality)?;

        debug!(
            width = dimensions.width,
            height = dimensions.height,
            message,
            "rendered placeholder"
        );
        Ok(Rendered {
            bytes,
            format: OutputFormat::Png,
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    #[test]
    fn embedded_graphic_decodes() {
        assert_eq!(
            (PLACEHOLDER_GRAPHIC.width(), PLACEHOLDER_GRAPHIC.height()),
            (30, 30)
        );
    }

    #[test]
    fn zero_edges_take_defaults_independently() {
        let p = Placeholder {
            default_width: 32,
            default_height: 48,
            ..Placeholder::default()
        };
        assert_eq!(p.dimensions(0, 0), Dimensions { width: 32, height: 48 });
        assert_eq!(p.dimensions(100, 0), Dimensions { width: 100, height: 48 });
        assert_eq!(p.dimensions(0, 7), Dimensions { width: 32, height: 7 });
    }

    #[test]
    fn huge_requests_are_clamped() {
        let p = Placeholder {
            max_edge: 500,
            ..Placeholder::default()
        };
        assert_eq!(
            p.dimensions(u32::MAX, 20),
            Dimensions { width: 500, height: 20 }
        );
    }

    #[test]
    fn render_sequence() {
        let backend = MockBackend::new();
        let out = Placeholder::default()
            .render(&backend, 0, 0, "not found")
            .unwrap();
        assert_eq!(out.format, OutputFormat::Png);
        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Canvas {
                    width: 32,
                    height: 32
                },
                RecordedOp::Insert,
                RecordedOp::Text("not found".into()),
                RecordedOp::Encode {
                    format: OutputFormat::Png,
                    quality: 90,
                    width: 32,
                    height: 32
                },
            ]
        );
    }

    #[test]
    fn render_uses_configured_quality() {
        let backend = MockBackend::new();
        let placeholder = Placeholder {
            quality: Quality::new(40),
            ..Placeholder::default()
        };
        placeholder.render(&backend, 10, 10, "x").unwrap();
        assert!(backend.get_operations().contains(&RecordedOp::Encode {
            format: OutputFormat::Png,
            quality: 40,
            width: 10,
            height: 10
        }));
    }

    #[test]
    fn real_placeholder_is_png_of_requested_size() {
        let out = Placeholder::default()
            .render(&RustBackend::new(), 120, 80, "Unable to decode")
            .unwrap();
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Png);
        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (120, 80));
        // Corner keeps the background color
        assert_eq!(img.to_rgba8().get_pixel(0, 0).0, [0xee, 0xee, 0xee, 0xff]);
    }

    #[test]
    fn tiny_placeholder_still_renders() {
        let out = Placeholder::default()
            .render(&RustBackend::new(), 4, 4, "a long message that cannot fit")
            .unwrap();
        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }
}
