//! End-to-end HTTP behavior through the axum router.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use image::{ImageFormat, RgbImage};
use image_resize_server::config::ServiceConfig;
use image_resize_server::controller::ImageController;
use image_resize_server::response::X_IMAGE_CACHE;
use image_resize_server::server;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct Served {
    status: StatusCode,
    content_type: String,
    cache: String,
    etag: String,
    body: Vec<u8>,
}

impl Served {
    fn image(&self) -> image::DynamicImage {
        image::load_from_memory(&self.body).expect("response body decodes")
    }
}

fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
    });
    img.save_with_format(path, format).unwrap();
}

fn setup(route_prefix: &str) -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let images = tmp.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_image(&images.join("square.png"), 100, 100, ImageFormat::Png);
    write_image(&images.join("photos/wide.jpg"), 400, 200, ImageFormat::Jpeg);
    std::fs::write(images.join("corrupt.png"), b"\x89PNG\r\n\x1a\nnot really").unwrap();

    let config = ServiceConfig {
        cache_path: Some(tmp.path().join("cache")),
        route_prefix: route_prefix.to_string(),
        ..ServiceConfig::with_image_path(&images)
    };
    let controller = ImageController::new(&config).unwrap();
    let app = server::router(Arc::new(controller), &config.normalized_route_prefix());
    (tmp, app)
}

async fn get(app: &Router, uri: &str) -> Served {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let header_str = |name: &header::HeaderName| {
        headers
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    };
    let content_type = header_str(&header::CONTENT_TYPE);
    let cache = header_str(&X_IMAGE_CACHE);
    let etag = header_str(&header::ETAG);
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    Served {
        status,
        content_type,
        cache,
        etag,
        body,
    }
}

#[tokio::test]
async fn crop_renders_then_hits_cache() {
    let (tmp, app) = setup("/");

    let first = get(&app, "/30x20xc/square.png").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.content_type, "image/png");
    assert_eq!(first.cache, "miss");
    let img = first.image();
    assert_eq!((img.width(), img.height()), (30, 20));
    assert!(tmp.path().join("cache/30x20xc/square.png").is_file());

    let second = get(&app, "/30x20xc/square.png").await;
    assert_eq!(second.cache, "hit");
    assert_eq!(second.body, first.body);
    assert_eq!(second.etag, first.etag);
}

#[tokio::test]
async fn fit_preserves_aspect_and_format() {
    let (_tmp, app) = setup("/");

    let served = get(&app, "/100x0/photos/wide.jpg").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.content_type, "image/jpeg");
    let img = served.image();
    assert_eq!((img.width(), img.height()), (100, 50));
}

#[tokio::test]
async fn unsized_token_keeps_natural_size() {
    let (_tmp, app) = setup("/");

    let served = get(&app, "/0x0/photos/wide.jpg").await;
    assert_eq!(served.cache, "miss");
    let img = served.image();
    assert_eq!((img.width(), img.height()), (400, 200));
}

#[tokio::test]
async fn flush_streams_source_bytes() {
    let (tmp, app) = setup("/");

    let served = get(&app, "/photos/wide.jpg").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.cache, "passthrough");
    assert_eq!(served.content_type, "image/jpeg");
    let original = std::fs::read(tmp.path().join("images/photos/wide.jpg")).unwrap();
    assert_eq!(served.body, original);
}

#[tokio::test]
async fn missing_flush_is_default_size_placeholder() {
    let (_tmp, app) = setup("/");

    let served = get(&app, "/nope.jpg").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.cache, "placeholder");
    assert_eq!(served.content_type, "image/png");
    let img = served.image();
    assert_eq!((img.width(), img.height()), (32, 32));
}

#[tokio::test]
async fn corrupt_source_is_placeholder_at_requested_size() {
    let (tmp, app) = setup("/");

    let served = get(&app, "/64x48/corrupt.png").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.cache, "placeholder");
    let img = served.image();
    assert_eq!((img.width(), img.height()), (64, 48));
    assert!(!tmp.path().join("cache/64x48/corrupt.png").exists());
}

#[tokio::test]
async fn traversal_gets_placeholder() {
    let (_tmp, app) = setup("/");

    for uri in ["/10x10/%2e%2e/secret.png", "/%2e%2e/%2e%2e/etc/passwd"] {
        let served = get(&app, uri).await;
        assert_eq!(served.status, StatusCode::OK, "{uri}");
        assert_eq!(served.cache, "placeholder", "{uri}");
    }
}

#[tokio::test]
async fn health_check() {
    let (_tmp, app) = setup("/");
    let served = get(&app, "/health").await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body, b"ok");
}

#[tokio::test]
async fn routes_mount_under_prefix() {
    let (_tmp, app) = setup("/img");

    let served = get(&app, "/img/20x20xc/square.png").await;
    assert_eq!(served.cache, "miss");
    assert_eq!(served.image().width(), 20);

    assert_eq!(get(&app, "/img/square.png").await.cache, "passthrough");
    assert_eq!(
        get(&app, "/square.png").await.status,
        StatusCode::NOT_FOUND
    );
}
