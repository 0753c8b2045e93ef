use anyhow::Context;
use clap::{Parser, Subcommand};
use image_resize_server::cache::PurgeMode;
use image_resize_server::config::{self, ServiceConfig};
use image_resize_server::controller::ImageController;
use image_resize_server::size::CropMode;
use image_resize_server::source::SourceId;
use image_resize_server::{server, warm};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "image-resize-server")]
#[command(about = "HTTP image resizing service with an on-disk derivative cache")]
#[command(long_about = "\
HTTP image resizing service with an on-disk derivative cache

Every file under image_path is served at two kinds of URL:

  /<source>              the file itself, untouched
  /<WxH[xc][xhook]>/<source>
                         a resized derivative, e.g. /200x150xc/photos/a.jpg

  200x0        fit to 200px wide, height follows the aspect ratio
  200x150      fit inside 200x150
  200x150xc    fill 200x150 and center-crop
  200x150xcxbw crop, then run the post-process hook named \"bw\"

Derivatives are written under cache_path/<token>/<source> and reused until
the source changes or cache_ttl passes. Missing or unreadable sources get a
placeholder image, never an error status.

Run 'image-resize-server gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Source image directory (overrides image_path)
    #[arg(long, global = true)]
    image_path: Option<PathBuf>,

    /// Derivative cache directory (overrides cache_path)
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Bind host (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Render size tokens for every source image ahead of time
    Warm {
        /// Size token to render, repeatable (added to warm.sizes)
        #[arg(long = "size", short)]
        sizes: Vec<String>,
    },
    /// Remove stale derivatives from the cache
    Purge {
        /// Remove every derivative, fresh or not
        #[arg(long)]
        all: bool,
    },
    /// Remove every derivative of one source
    Invalidate {
        /// Source path relative to image_path
        source: String,
    },
    /// Print the URL a page should use for a derivative
    Url {
        /// Source path relative to image_path
        source: String,
        #[arg(long, default_value_t = 0)]
        width: u32,
        #[arg(long, default_value_t = 0)]
        height: u32,
        /// Center-crop to exactly width x height
        #[arg(long)]
        crop: bool,
        /// Post-process hook name
        #[arg(long, default_value = "")]
        callback: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref(), Some(overrides(&cli)))
        .context("failed to load configuration")?;

    match cli.command {
        Command::Serve { .. } => serve(config),
        Command::Warm { sizes } => run_warm(config, sizes),
        Command::Purge { all } => {
            let mode = if all { PurgeMode::All } else { PurgeMode::Stale };
            let stats = config
                .cache()
                .purge(config.image_root()?, mode)
                .context("purge failed")?;
            println!("Cache: {stats}");
            Ok(())
        }
        Command::Invalidate { source } => {
            let id = SourceId::parse(&source)?;
            let removed = config
                .cache()
                .invalidate(&id)
                .with_context(|| format!("failed to invalidate {id}"))?;
            println!("{id}: {removed} derivatives removed");
            Ok(())
        }
        Command::Url {
            source,
            width,
            height,
            crop,
            callback,
        } => {
            let controller = ImageController::new(&config)?;
            let crop = if crop { CropMode::Crop } else { CropMode::None };
            println!(
                "{}",
                controller.image_url(&source, width, height, crop, &callback)?
            );
            Ok(())
        }
        Command::GenConfig => Ok(()),
    }
}

/// Command-line flags as a TOML layer over the config file.
fn overrides(cli: &Cli) -> toml::Value {
    let mut table = toml::Table::new();
    if let Some(path) = &cli.image_path {
        table.insert(
            "image_path".into(),
            toml::Value::String(path.to_string_lossy().into_owned()),
        );
    }
    if let Some(path) = &cli.cache_path {
        table.insert(
            "cache_path".into(),
            toml::Value::String(path.to_string_lossy().into_owned()),
        );
    }
    if let Command::Serve { host, port } = &cli.command {
        let mut server = toml::Table::new();
        if let Some(host) = host {
            server.insert("host".into(), toml::Value::String(host.clone()));
        }
        if let Some(port) = port {
            server.insert("port".into(), toml::Value::Integer(i64::from(*port)));
        }
        if !server.is_empty() {
            table.insert("server".into(), toml::Value::Table(server));
        }
    }
    toml::Value::Table(table)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let controller = Arc::new(ImageController::new(&config)?);
    let app = server::router(controller, &config.normalized_route_prefix());
    let address = config.server.bind_address();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        server::run(listener, app).await.context("server error")
    })
}

fn run_warm(config: ServiceConfig, mut sizes: Vec<String>) -> anyhow::Result<()> {
    for size in &config.warm.sizes {
        if !sizes.contains(size) {
            sizes.push(size.clone());
        }
    }
    if sizes.is_empty() {
        anyhow::bail!("no sizes to warm: pass --size or set warm.sizes");
    }

    init_thread_pool(&config.processing);
    let controller = ImageController::new(&config)?;
    println!("==> Warming {} sizes: {}", sizes.len(), sizes.join(", "));

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            println!("{event}");
        }
    });
    let result = warm::warm(&controller, &sizes, Some(tx));
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
    let stats = result?;
    println!("Warm: {stats}");
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
