//! framecast: capture the display into a bounded frame buffer and drain it

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use framecast::{utils, CaptureController, Config, Frame};
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("framecast=debug"));
    let registry = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer().with_timer(tracing_subscriber::fmt::time::uptime()),
    );
    #[cfg(feature = "profiling")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());
    registry.init();

    info!("framecast launching...");

    // Load configuration
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref())?;
    framecast::CONFIG.store(Arc::new(config.clone()));

    let source = utils::open_source()?;
    let controller = Arc::new(CaptureController::new(source, &config.buffer)?);

    let thumbnail = controller.snapshot(&config.snapshot)?;
    info!(
        "Snapshot {}x{}, {} bytes",
        thumbnail.width,
        thumbnail.height,
        thumbnail.payload.len()
    );

    if !controller.start(config.capture.clone()) {
        return Err(eyre!("Capture did not start"));
    }

    let (tx, rx) = flume::bounded::<Frame>(config.buffer.capacity);

    // Drain at the capture cadence, like a sender pacing network writes
    let interval = config.capture.frame_interval();
    let drainer = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Ok(frame) = controller.drain() else {
                    continue;
                };
                if let Err(e) = tx.send_async(frame).await {
                    error!("Failed to hand off frame: {}", e);
                    break;
                }
            }
        })
    };

    let fps = config.capture.fps.max(1) as u64;
    let sink = tokio::spawn(async move {
        let (mut frames, mut bytes, mut repeated) = (0u64, 0usize, 0u64);
        while let Ok(frame) = rx.recv_async().await {
            frames += 1;
            bytes += frame.payload.len();
            repeated += u64::from(frame.meta.repeated);
            if frames % fps == 0 {
                info!(
                    frames,
                    repeated,
                    kib = bytes / 1024,
                    latency = ?frame.timestamp.elapsed(),
                    "sink throughput"
                );
            }
        }
        frames
    });

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, stopping capture");
    controller.stop();
    drainer.abort();

    let frames = sink.await?;
    let stats = controller.stats();
    info!(
        "Delivered {} frames; buffer inserted {}, evicted {}",
        frames, stats.inserted, stats.evicted
    );

    let joiner = Arc::clone(&controller);
    tokio::time::timeout(
        Duration::from_secs(2),
        tokio::task::spawn_blocking(move || joiner.join()),
    )
    .await??;

    info!("framecast shutting down");
    Ok(())
}
