pub mod capture;
pub mod error;
pub mod pipeline;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use capture::{CaptureController, Frame, FrameSource, RawFrame};
pub use error::{CaptureError, Result};
pub use pipeline::{BufferPolicy, FrameBuffer, OutputMode, Region, Tier};

/// Active configuration, swapped in by the binary after loading
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub buffer: BufferConfig,
    pub snapshot: SnapshotConfig,
}

/// Per-session capture settings, fixed for the lifetime of one loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub fps: u32,
    pub tier: Tier,
    pub quality: u8,
    pub region: Option<Region>,
    pub output: OutputMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    pub policy: BufferPolicy,
}

/// Single-frame grab settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub tier: Tier,
    pub quality: u8,
    /// Give up after this long; unset polls until a frame arrives
    pub timeout_ms: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            tier: Tier::Native,
            quality: 75,
            region: None,
            output: OutputMode::Encoded,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            // 12 seconds at 15 fps
            capacity: 180,
            policy: BufferPolicy::FreshnessFirst,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            tier: Tier::P720,
            quality: 30,
            timeout_ms: None,
        }
    }
}

impl CaptureConfig {
    /// Time budget of one capture cycle
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(config::ConfigError::Message("fps must be at least 1".into()).into());
        }
        if self.quality > 100 {
            return Err(config::ConfigError::Message(format!(
                "quality {} is outside 0-100",
                self.quality
            ))
            .into());
        }
        Ok(())
    }
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `FRAMECAST_*` environment
    /// variables (`FRAMECAST_CAPTURE__FPS=30`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("FRAMECAST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.capture.validate()?;
        Ok(config)
    }
}
