use std::time::Duration;

use thiserror::Error;

use crate::pipeline::transform::Region;

pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source has no new frame for this poll.
    #[error("no frame available from source")]
    SourceUnavailable,

    #[error("frame source failed: {0}")]
    Source(String),

    #[error("crop region {region:?} does not fit a {width}x{height} source")]
    InvalidRegion {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("malformed raw frame: {0}")]
    InvalidFrame(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("frame buffer is empty")]
    EmptyBuffer,

    #[error("no usable display found: {0}")]
    SourceInit(String),

    #[error("no frame produced within {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl CaptureError {
    /// Errors a capture cycle absorbs instead of surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable | Self::Source(_))
    }
}
