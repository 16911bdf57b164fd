//! framecast relay daemon
//!
//! Subscribes to a raw frame feed, JPEG-encodes the newest frame, and
//! serves it to WebSocket viewers.
//!
//! Run with: cargo run -- --upstream 127.0.0.1:42024 --listen 0.0.0.0:42025

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use framecast::relay::config::{
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_JPEG_QUALITY, DEFAULT_TARGET_FPS,
};
use framecast::source::subscriber::{DEFAULT_SUBJECT, DEFAULT_UPSTREAM_ADDR};
use framecast::{
    FeedConfig, FeedSubscriber, FrameSlot, IngestPump, JpegEncoder, RelayConfig, RelayServer,
    ServerConfig, SessionRegistry,
};

/// Real-time pixel-frame broadcast relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Frame width in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Upstream frame feed address
    #[arg(long, default_value = DEFAULT_UPSTREAM_ADDR)]
    upstream: String,

    /// Feed subject to subscribe to
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,

    /// WebSocket listen address
    #[arg(long, default_value = "0.0.0.0:42025")]
    listen: SocketAddr,

    /// Maximum frames per second relayed to viewers
    #[arg(long, default_value_t = DEFAULT_TARGET_FPS)]
    fps: f64,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Per-session frame size bound in bytes (default: width * height * 3)
    #[arg(long)]
    max_frame_bytes: Option<usize>,

    /// Maximum concurrent viewers (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_viewers: usize,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut relay_config = RelayConfig::default()
        .dimensions(args.width, args.height)
        .target_fps(args.fps)
        .jpeg_quality(args.quality);
    if let Some(max) = args.max_frame_bytes {
        relay_config = relay_config.max_frame_bytes(max);
    }

    let feed_config = FeedConfig::default()
        .upstream_addr(args.upstream)
        .subject(args.subject)
        .dimensions(args.width, args.height);

    tracing::info!(
        width = relay_config.width,
        height = relay_config.height,
        fps = relay_config.target_fps,
        quality = relay_config.jpeg_quality,
        upstream = %feed_config.upstream_addr,
        subject = %feed_config.subject,
        "Starting relay"
    );

    // Pipeline state shared by the ingest pump and the serving side
    let slot = Arc::new(FrameSlot::new());
    let registry = Arc::new(SessionRegistry::new(relay_config.frame_capacity()));

    let encoder = JpegEncoder::new(relay_config.jpeg_quality);
    let source = FeedSubscriber::new(feed_config);
    let pump = IngestPump::new(
        &relay_config,
        source,
        encoder,
        Arc::clone(&slot),
        Arc::clone(&registry),
    );

    let server_config = ServerConfig::with_addr(args.listen).max_connections(args.max_viewers);
    let server = RelayServer::new(server_config, Arc::clone(&slot), Arc::clone(&registry));

    let cancel = CancellationToken::new();

    let ingest_cancel = cancel.clone();
    let ingest = tokio::spawn(async move { pump.run(ingest_cancel).await });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down");
            signal_cancel.cancel();
        }
    });

    let result = server.run(cancel.clone()).await;

    // Stop the pump as well when the server exits on its own
    cancel.cancel();

    if let Err(e) = ingest.await {
        tracing::error!(error = %e, "Ingest task failed");
    }

    result.map_err(Into::into)
}
