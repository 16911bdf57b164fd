//! Demo frame feed
//!
//! Serves an animated RGBA gradient over the frame feed protocol so the
//! relay can be exercised without a real frame producer.
//!
//! Run with: cargo run --bin gradient_feed -- --bind 127.0.0.1:42024

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use framecast::relay::config::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use framecast::relay::frame::RAW_BYTES_PER_PIXEL;
use framecast::source::subscriber::DEFAULT_SUBJECT;
use framecast::source::wire;

/// Animated gradient feed for exercising the relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to serve the feed on
    #[arg(long, default_value = "127.0.0.1:42024")]
    bind: SocketAddr,

    /// Frame width in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Subject to publish frames under
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,

    /// Frames generated per second
    #[arg(long, default_value_t = 60.0)]
    fps: f64,
}

/// Render one RGBA gradient frame; `phase` scrolls the pattern
fn gradient_frame(width: u32, height: u32, phase: u8) -> Bytes {
    let mut pixels =
        BytesMut::with_capacity(width as usize * height as usize * RAW_BYTES_PER_PIXEL);

    for y in 0..height {
        for x in 0..width {
            pixels.put_u8((x as u8).wrapping_add(phase));
            pixels.put_u8((y as u8).wrapping_add(phase));
            pixels.put_u8(phase);
            pixels.put_u8(0xFF);
        }
    }

    pixels.freeze()
}

async fn serve_subscriber(
    mut socket: TcpStream,
    feed: &mut broadcast::Receiver<Bytes>,
) -> std::io::Result<()> {
    socket.set_nodelay(true)?;

    loop {
        match feed.recv().await {
            Ok(message) => socket.write_all(&message).await?,
            // Skipped frames are fine; the relay only wants the newest
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listener = TcpListener::bind(args.bind).await?;
    tracing::info!(
        addr = %args.bind,
        width = args.width,
        height = args.height,
        subject = %args.subject,
        fps = args.fps,
        "Gradient feed listening"
    );

    let (tx, _) = broadcast::channel::<Bytes>(8);

    let generator_tx = tx.clone();
    let subject = args.subject;
    let (width, height) = (args.width, args.height);
    let period = Duration::from_secs_f64(1.0 / args.fps.max(0.001));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut sequence: u32 = 0;

        loop {
            interval.tick().await;

            let pixels = gradient_frame(width, height, sequence as u8);
            let message = wire::Message::frame(&subject, sequence, pixels);
            let mut buf = BytesMut::new();
            wire::encode(&message, &mut buf);

            // A send error just means no subscriber is connected
            let _ = generator_tx.send(buf.freeze());
            sequence = sequence.wrapping_add(1);
        }
    });

    loop {
        let (socket, peer_addr) = listener.accept().await?;
        tracing::info!(peer = %peer_addr, "Subscriber connected");

        let mut feed = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_subscriber(socket, &mut feed).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Subscriber dropped");
            }
        });
    }
}
