use bytes::Bytes;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{CaptureError, Result};

/// Raw pixels as handed over by a frame source
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including any pitch padding after the last pixel
    pub stride: u32,
    pub order: ChannelOrder,
}

impl RawFrame {
    /// Tightly packed frame (no row padding)
    pub fn packed(data: impl Into<Bytes>, width: u32, height: u32, order: ChannelOrder) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width * order.bytes_per_pixel() as u32,
            order,
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    pub fn check(&self) -> Result<()> {
        let row = self.width as usize * self.order.bytes_per_pixel();
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }
        if (self.stride as usize) < row {
            return Err(CaptureError::InvalidFrame(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row
            )));
        }
        // Last row may omit its padding
        let needed = self.stride as usize * (self.height as usize - 1) + row;
        if self.data.len() < needed {
            return Err(CaptureError::InvalidFrame(format!(
                "{} bytes for {}x{} {:?}, need {}",
                self.data.len(),
                self.width,
                self.height,
                self.order,
                needed
            )));
        }
        Ok(())
    }
}

/// Channel layouts display adapters hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Bgra,
    Bgrx,
    Rgba,
    Rgbx,
    Rgb,
    Bgr,
}

impl ChannelOrder {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra | Self::Bgrx | Self::Rgba | Self::Rgbx => 4,
            Self::Rgb | Self::Bgr => 3,
        }
    }

    /// Byte offsets of red, green and blue inside one pixel
    pub fn rgb_offsets(self) -> [usize; 3] {
        match self {
            Self::Bgra | Self::Bgrx | Self::Bgr => [2, 1, 0],
            Self::Rgba | Self::Rgbx | Self::Rgb => [0, 1, 2],
        }
    }
}

/// What a capture cycle produces
#[derive(Debug, Clone)]
pub enum Payload {
    /// JPEG bytes
    Encoded(Bytes),
    /// Transformed image, not encoded
    Image(Arc<RgbImage>),
}

impl Payload {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Encoded(bytes) => Some(bytes),
            Self::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&RgbImage> {
        match self {
            Self::Encoded(_) => None,
            Self::Image(image) => Some(image),
        }
    }

    /// Size in bytes held by this payload
    pub fn len(&self) -> usize {
        match self {
            Self::Encoded(bytes) => bytes.len(),
            Self::Image(image) => image.as_raw().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffered frame; cloning shares the payload
#[derive(Debug, Clone)]
pub struct Frame {
    pub payload: Payload,

    pub meta: Arc<FrameMetadata>,

    /// When the frame entered the pipeline
    pub timestamp: Instant,
}

#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Insertion order within one controller
    pub sequence: u64,
    /// Output dimensions after crop and resize
    pub width: u32,
    pub height: u32,
    /// Re-inserted copy of an earlier frame
    pub repeated: bool,
}

impl Frame {
    pub fn new(payload: Payload, sequence: u64, width: u32, height: u32) -> Self {
        Self {
            payload,
            meta: Arc::new(FrameMetadata {
                sequence,
                width,
                height,
                repeated: false,
            }),
            timestamp: Instant::now(),
        }
    }

    /// Copy standing in for a frame the source did not deliver
    pub fn repeat(&self, sequence: u64) -> Self {
        Self {
            payload: self.payload.clone(),
            meta: Arc::new(FrameMetadata {
                sequence,
                repeated: true,
                ..(*self.meta).clone()
            }),
            timestamp: Instant::now(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }
}
