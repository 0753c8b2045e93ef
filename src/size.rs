//! Size token parsing for the `WxH[xC][xCallback]` convention.
//!
//! Every resize request carries a compact size token as its first path
//! segment. This module turns it into a [`SizeSpec`]:
//!
//! - `"200x300"` → 200×300, fit inside the box
//! - `"200x300xc"` → 200×300, fill and crop to exactly that box
//! - `"200x0"` → width 200, height follows the source aspect ratio
//! - `"0x0xxsepia"` → natural size, then the `sepia` hook
//!
//! Parsing never fails. Anything it cannot read degrades toward "no resize":
//! a non-numeric width becomes 0, an unknown crop flag means no crop.
//!
//! ## Leading digits
//!
//! Width and height take the leading decimal digits of their part, so
//! `"200x300c"` is a plain 200×300 fit with no crop. Crop is only switched on
//! by a third part that is exactly `c`.

use std::fmt;

/// Separator between the parts of a size token.
pub const SEPARATOR: char = 'x';

/// The literal third part that switches crop mode on.
const CROP_FLAG: &str = "c";

/// How the source is fitted to the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Aspect-preserving resize bounded by the given width and/or height.
    #[default]
    None,
    /// Fill the box and center-crop to exactly width × height.
    Crop,
}

/// Parsed size token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SizeSpec {
    /// Target width; 0 means unspecified.
    pub width: u32,
    /// Target height; 0 means unspecified.
    pub height: u32,
    pub crop: CropMode,
    /// Named post-process hook. Empty means none.
    pub callback: String,
}

impl SizeSpec {
    pub fn new(width: u32, height: u32, crop: CropMode, callback: impl Into<String>) -> Self {
        Self {
            width,
            height,
            crop,
            callback: callback.into(),
        }
    }

    /// Parse a size token. Never fails; see the [module docs](self).
    pub fn parse(token: &str) -> Self {
        let mut parts = token.splitn(4, SEPARATOR);
        let width = leading_number(parts.next().unwrap_or(""));
        let height = leading_number(parts.next().unwrap_or(""));
        let crop = match parts.next() {
            Some(CROP_FLAG) => CropMode::Crop,
            _ => CropMode::None,
        };
        let callback = parts.next().unwrap_or("").to_string();
        Self {
            width,
            height,
            crop,
            callback,
        }
    }

    /// True when neither width nor height was given.
    pub fn is_unsized(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn width(&self) -> Option<u32> {
        (self.width > 0).then_some(self.width)
    }

    pub fn height(&self) -> Option<u32> {
        (self.height > 0).then_some(self.height)
    }

    /// The hook key, if one was named.
    pub fn callback(&self) -> Option<&str> {
        (!self.callback.is_empty()).then_some(self.callback.as_str())
    }
}

/// Canonical token: `WxH`, then `xc` for crop, then `x<callback>`.
///
/// A callback without crop keeps an empty crop slot (`100x100xxgray`) so the
/// token parses back to the same spec.
impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        match (self.crop, self.callback()) {
            (CropMode::Crop, Some(cb)) => write!(f, "xcx{cb}"),
            (CropMode::Crop, None) => write!(f, "xc"),
            (CropMode::None, Some(cb)) => write!(f, "xx{cb}"),
            (CropMode::None, None) => Ok(()),
        }
    }
}

/// Check whether a path segment is a size token as routed:
/// `digits 'x' digits [a-z]*`.
pub fn is_size_token(segment: &str) -> bool {
    let Some((w, rest)) = segment.split_once(SEPARATOR) else {
        return false;
    };
    if w.is_empty() || !w.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && rest[digits..].bytes().all(|b| b.is_ascii_lowercase())
}

fn leading_number(part: &str) -> u32 {
    let digits = part.bytes().take_while(u8::is_ascii_digit).count();
    // Saturate absurd values instead of wrapping to "unspecified"
    part[..digits]
        .parse::<u64>()
        .map(|n| n.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}
