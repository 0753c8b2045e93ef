//! Image processing, pure Rust and statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with content sniffing |
//! | **Resize** | Lanczos3 `resize_exact` to computed bounds |
//! | **Crop-fit** | centered `crop_imm` window, then Lanczos3 to the box |
//! | **Encode** | source format, `JpegEncoder` quality for JPEG |
//! | **Placeholder text** | `imageproc` + `ab_glyph` with an embedded font |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageCodec`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Decoded, Dimensions, ImageCodec};
pub use params::{CropParams, OutputFormat, Quality, ResizeParams, Rgba};
pub use rust_backend::{RustBackend, has_supported_extension, supported_input_extensions};
