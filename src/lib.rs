//! # Image Resize Server
//!
//! An HTTP service that serves resized derivatives of the images in one
//! directory, caching every derivative on disk so each size is encoded once.
//!
//! # Request Shape
//!
//! ```text
//! GET /<token>/<source>    resized derivative   e.g. /200x150xc/photos/a.jpg
//! GET /<source>            the source, untouched
//! ```
//!
//! The size token is `WxH`, optionally followed by `xc` to center-crop and
//! `x<hook>` to run a named post-process hook (see [`size`]). Every request
//! answers `200 OK` with an image; failures produce a gray placeholder with
//! the reason drawn on it instead of an error status.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`size`] | Size token grammar: parse and canonical formatting |
//! | [`source`] | Validated relative source identifiers (no traversal) |
//! | [`imaging`] | Codec trait, pure-Rust backend, dimension math |
//! | [`transform`] | Post-process hooks keyed by name |
//! | [`pipeline`] | decode → geometry → hooks → encode |
//! | [`cache`] | Derivative cache: paths, freshness, atomic store, purge |
//! | [`fallback`] | Placeholder images |
//! | [`response`] | MIME sniffing, ETags, the HTTP body type |
//! | [`controller`] | The per-request state machine and URL generation |
//! | [`server`] | axum router, blocking-pool dispatch, graceful shutdown |
//! | [`warm`] | Parallel cache pre-warming |
//! | [`config`] | Layered TOML configuration |
//!
//! # Design Decisions
//!
//! ## The Filesystem Is the Cache
//!
//! A derivative lives at `<cache_path>/<token>/<source>`, so the cache
//! directory can be exposed by any static file server under `cache_url` and
//! generated URLs point at it directly once a derivative exists. Freshness is
//! decided from modification times alone: a derivative is valid while it is
//! newer than its source and younger than `cache_ttl`.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling (Lanczos3), encoding and placeholder text all go
//! through the `image` and `imageproc` crates. The placeholder font is
//! embedded, so the binary has no runtime dependencies.
//!
//! ## Placeholders Instead of Errors
//!
//! Pages embed these URLs in `<img>` tags, where an error status renders as
//! a broken image. A placeholder of the requested size keeps layouts intact
//! and shows what went wrong.

pub mod cache;
pub mod config;
pub mod controller;
pub mod fallback;
pub mod imaging;
pub mod pipeline;
pub mod response;
pub mod server;
pub mod size;
pub mod source;
pub mod transform;
pub mod warm;
