//! Named post-process hooks.
//!
//! A hook is anything implementing [`Transform`]: a single
//! `DynamicImage -> DynamicImage` step. Plain closures qualify through a
//! blanket impl, and [`TransformSpec`] covers the built-ins that can be
//! declared in the config file:
//!
//! ```toml
//! [transforms.default]
//! kind = "unsharpen"
//! sigma = 0.5
//! threshold = 1
//!
//! [transforms.bw]
//! kind = "grayscale"
//! ```
//!
//! The hook registered as [`DEFAULT_HOOK`] runs on every derivative after
//! the geometric resize. A size token's callback key then selects one more
//! hook by name. Unknown keys are a no-op.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Key of the hook applied to every derivative.
pub const DEFAULT_HOOK: &str = "default";

/// A post-processing step applied to a resized derivative.
pub trait Transform: Send + Sync {
    fn apply(&self, image: DynamicImage) -> DynamicImage;
}

impl<F> Transform for F
where
    F: Fn(DynamicImage) -> DynamicImage + Send + Sync,
{
    fn apply(&self, image: DynamicImage) -> DynamicImage {
        self(image)
    }
}

/// Built-in transforms, declared under `[transforms.<key>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformSpec {
    Grayscale,
    Invert,
    Blur { sigma: f32 },
    Unsharpen { sigma: f32, threshold: i32 },
    Brighten { value: i32 },
    Contrast { value: f32 },
    Huerotate { degrees: i32 },
    FlipHorizontal,
    FlipVertical,
    /// Clockwise; only 90, 180 and 270.
    Rotate { degrees: u32 },
}

impl TransformSpec {
    /// Reject parameter values the image operations cannot honor.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Blur { sigma } | Self::Unsharpen { sigma, .. }
                if sigma.is_nan() || *sigma <= 0.0 =>
            {
                Err(format!("sigma must be positive, got {sigma}"))
            }
            Self::Rotate { degrees } if !matches!(degrees, 90 | 180 | 270) => Err(format!(
                "rotate degrees must be 90, 180 or 270, got {degrees}"
            )),
            _ => Ok(()),
        }
    }
}

impl Transform for TransformSpec {
    fn apply(&self, image: DynamicImage) -> DynamicImage {
        match *self {
            Self::Grayscale => image.grayscale(),
            Self::Invert => {
                let mut image = image;
                image.invert();
                image
            }
            Self::Blur { sigma } => image.blur(sigma),
            Self::Unsharpen { sigma, threshold } => image.unsharpen(sigma, threshold),
            Self::Brighten { value } => image.brighten(value),
            Self::Contrast { value } => image.adjust_contrast(value),
            Self::Huerotate { degrees } => image.huerotate(degrees),
            Self::FlipHorizontal => image.fliph(),
            Self::FlipVertical => image.flipv(),
            Self::Rotate { degrees: 90 } => image.rotate90(),
            Self::Rotate { degrees: 180 } => image.rotate180(),
            Self::Rotate { degrees: 270 } => image.rotate270(),
            Self::Rotate { .. } => image,
        }
    }
}

/// Hooks by key. Cheap to clone; hooks are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    hooks: HashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from config-declared built-ins.
    pub fn from_specs(specs: &BTreeMap<String, TransformSpec>) -> Self {
        let mut registry = Self::new();
        for (key, spec) in specs {
            registry.register(key.clone(), spec.clone());
        }
        registry
    }

    /// Register (or replace) the hook under `key`.
    pub fn register(&mut self, key: impl Into<String>, hook: impl Transform + 'static) {
        self.hooks.insert(key.into(), Arc::new(hook));
    }

    pub fn get(&self, key: &str) -> Option<&dyn Transform> {
        self.hooks.get(key).map(|h| h.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.hooks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the default hook, then the hook named by `callback`.
    ///
    /// A callback of `"default"` runs the default hook a second time.
    pub fn apply(&self, image: DynamicImage, callback: Option<&str>) -> DynamicImage {
        let mut image = image;
        if let Some(hook) = self.get(DEFAULT_HOOK) {
            image = hook.apply(image);
        }
        if let Some(hook) = callback.and_then(|key| self.get(key)) {
            image = hook.apply(image);
        }
        image
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.hooks.keys().collect();
        keys.sort();
        f.debug_struct("TransformRegistry")
            .field("hooks", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    fn pixel(value: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 1, Rgba(value)))
    }

    fn first_pixel(image: &DynamicImage) -> [u8; 4] {
        image.to_rgba8().get_pixel(0, 0).0
    }

    #[test]
    fn closures_are_transforms() {
        let mut registry = TransformRegistry::new();
        registry.register("thumb", |img: DynamicImage| {
            img.resize_exact(1, 1, image::imageops::FilterType::Nearest)
        });
        let out = registry.apply(pixel([0, 0, 0, 255]), Some("thumb"));
        assert_eq!((out.width(), out.height()), (1, 1));
    }

    #[test]
    fn default_runs_before_named() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TransformRegistry::new();
        let o = order.clone();
        registry.register("named", move |img: DynamicImage| {
            o.lock().unwrap().push("named");
            img
        });
        let o = order.clone();
        registry.register(DEFAULT_HOOK, move |img: DynamicImage| {
            o.lock().unwrap().push("default");
            img
        });

        registry.apply(pixel([0; 4]), Some("named"));
        assert_eq!(*order.lock().unwrap(), vec!["default", "named"]);
    }

    #[test]
    fn default_applies_without_callback() {
        let mut registry = TransformRegistry::new();
        registry.register(DEFAULT_HOOK, TransformSpec::Invert);
        let out = registry.apply(pixel([10, 20, 30, 255]), None);
        assert_eq!(first_pixel(&out), [245, 235, 225, 255]);
    }

    #[test]
    fn unknown_callback_is_noop() {
        let registry = TransformRegistry::new();
        let out = registry.apply(pixel([1, 2, 3, 255]), Some("nope"));
        assert_eq!(first_pixel(&out), [1, 2, 3, 255]);
    }

    #[test]
    fn default_callback_runs_twice() {
        let mut registry = TransformRegistry::new();
        registry.register(DEFAULT_HOOK, TransformSpec::Invert);
        let out = registry.apply(pixel([10, 20, 30, 255]), Some(DEFAULT_HOOK));
        assert_eq!(first_pixel(&out), [10, 20, 30, 255]);
    }

    #[test]
    fn specs_deserialize_from_toml() {
        let toml_str = r#"
[default]
kind = "unsharpen"
sigma = 0.5
threshold = 1

[bw]
kind = "grayscale"

[turn]
kind = "rotate"
degrees = 90
"#;
        let specs: BTreeMap<String, TransformSpec> = toml::from_str(toml_str).unwrap();
        assert_eq!(specs["bw"], TransformSpec::Grayscale);
        assert_eq!(specs["turn"], TransformSpec::Rotate { degrees: 90 });
        assert_eq!(
            specs["default"],
            TransformSpec::Unsharpen {
                sigma: 0.5,
                threshold: 1
            }
        );

        let registry = TransformRegistry::from_specs(&specs);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains(DEFAULT_HOOK));
    }

    #[test]
    fn unknown_kind_rejected() {
        let result: Result<TransformSpec, _> = toml::from_str("kind = \"sepia\"");
        assert!(result.is_err());
    }

    #[test]
    fn validate_parameters() {
        assert!(TransformSpec::Blur { sigma: 1.5 }.validate().is_ok());
        assert!(TransformSpec::Blur { sigma: 0.0 }.validate().is_err());
        assert!(TransformSpec::Blur { sigma: f32::NAN }.validate().is_err());
        assert!(TransformSpec::Rotate { degrees: 45 }.validate().is_err());
        assert!(TransformSpec::Rotate { degrees: 270 }.validate().is_ok());
    }

    #[test]
    fn rotate_swaps_dimensions() {
        let out = TransformSpec::Rotate { degrees: 90 }.apply(pixel([0; 4]));
        assert_eq!((out.width(), out.height()), (1, 2));
    }

    #[test]
    fn grayscale_equalizes_channels() {
        let out = TransformSpec::Grayscale.apply(pixel([200, 10, 10, 255]));
        let [r, g, b, _] = first_pixel(&out);
        assert!(r == g && g == b);
    }
}
