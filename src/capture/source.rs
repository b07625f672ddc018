//! Frame source boundary and a synthetic test-pattern source

use bytes::Bytes;
use tracing::info;

use crate::capture::frame::{ChannelOrder, RawFrame};
use crate::error::{CaptureError, Result};

/// Provider of raw display frames.
///
/// Discovery and initialization happen in the implementor's constructor, so
/// a missing display fails there with [`CaptureError::SourceInit`].
/// `poll` returns [`CaptureError::SourceUnavailable`] when no new frame is ready.
pub trait FrameSource: Send {
    /// Source dimensions in pixels
    fn dimensions(&self) -> (u32, u32);

    fn poll(&mut self) -> Result<RawFrame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn poll(&mut self) -> Result<RawFrame> {
        (**self).poll()
    }
}

/// Moving BGRA gradient
pub struct PatternSource {
    width: u32,
    height: u32,
    tick: u64,
    gap_every: u64,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::SourceInit(format!(
                "pattern of {}x{} has no pixels",
                width, height
            )));
        }
        info!("Synthetic pattern source {}x{}", width, height);
        Ok(Self {
            width,
            height,
            tick: 0,
            gap_every: 0,
        })
    }

    /// Report "no new frame" on every `every`-th poll
    pub fn with_gaps(mut self, every: u64) -> Self {
        self.gap_every = every;
        self
    }
}

impl FrameSource for PatternSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn poll(&mut self) -> Result<RawFrame> {
        self.tick += 1;
        if self.gap_every > 0 && self.tick % self.gap_every == 0 {
            return Err(CaptureError::SourceUnavailable);
        }

        let shift = self.tick as u32;
        let mut data = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(y.wrapping_add(shift) as u8); // B
                data.push((x ^ y) as u8); // G
                data.push(x.wrapping_add(shift) as u8); // R
                data.push(0xFF); // A
            }
        }

        Ok(RawFrame::packed(
            Bytes::from(data),
            self.width,
            self.height,
            ChannelOrder::Bgra,
        ))
    }
}
