//! Whole-screen capture of the primary monitor via xcap

use bytes::Bytes;
use tracing::{info, instrument};
use xcap::Monitor;

use crate::capture::frame::{ChannelOrder, RawFrame};
use crate::capture::FrameSource;
use crate::error::{CaptureError, Result};

pub struct XcapSource {
    monitor: Monitor,
    width: u32,
    height: u32,
}

impl XcapSource {
    /// Select the primary monitor, failing if none is attached
    #[instrument]
    pub fn primary() -> Result<Self> {
        let monitors = Monitor::all().map_err(|e| CaptureError::SourceInit(e.to_string()))?;

        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary())
            .ok_or_else(|| CaptureError::SourceInit("no primary monitor".into()))?;

        let (width, height) = (monitor.width(), monitor.height());
        info!("Capturing monitor {:?} at {}x{}", monitor.name(), width, height);

        Ok(Self {
            monitor,
            width,
            height,
        })
    }
}

impl FrameSource for XcapSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn poll(&mut self) -> Result<RawFrame> {
        let image = self
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::Source(e.to_string()))?;

        // Scaled displays may hand back a different size than advertised
        let (width, height) = image.dimensions();
        Ok(RawFrame::packed(
            Bytes::from(image.into_raw()),
            width,
            height,
            ChannelOrder::Rgba,
        ))
    }
}
