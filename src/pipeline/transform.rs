//! Frame transform: normalize, crop, resize, encode

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::capture::frame::{Payload, RawFrame};
use crate::error::{CaptureError, Result};
use crate::pipeline::pixels;

/// Output resolution preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tier {
    /// Source resolution, never resized
    #[default]
    #[serde(rename = "1080p", alias = "native")]
    Native,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "144p")]
    P144,
}

/// Target size per tier, indexed by discriminant
const LADDER: [Option<(u32, u32)>; 6] = [
    None,
    Some((1280, 720)),
    Some((854, 480)),
    Some((640, 360)),
    Some((426, 240)),
    Some((256, 144)),
];

impl Tier {
    /// Fixed output size, `None` for pass-through
    pub fn target(self) -> Option<(u32, u32)> {
        LADDER[self as usize]
    }
}

/// Crop rectangle in absolute source pixels, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width and height, assuming the region is well-formed
    pub fn extent(&self) -> (u32, u32) {
        (
            self.right.saturating_sub(self.left),
            self.bottom.saturating_sub(self.top),
        )
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.left < self.right
            && self.right <= width
            && self.top < self.bottom
            && self.bottom <= height
    }

    pub fn check(&self, width: u32, height: u32) -> Result<()> {
        if self.fits(width, height) {
            Ok(())
        } else {
            Err(CaptureError::InvalidRegion {
                region: *self,
                width,
                height,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// JPEG bytes
    #[default]
    Encoded,
    /// Decoded RGB image
    Image,
}

/// Result of one transform
#[derive(Debug, Clone)]
pub struct Transformed {
    pub payload: Payload,
    pub width: u32,
    pub height: u32,
}

/// Normalize `raw` to RGB, crop to `region`, resize to `tier` and encode at
/// `quality` unless `mode` asks for the image itself.
pub fn transform(
    raw: &RawFrame,
    region: Option<Region>,
    tier: Tier,
    quality: u8,
    mode: OutputMode,
) -> Result<Transformed> {
    let started = Instant::now();

    if let Some(region) = region {
        region.check(raw.width, raw.height)?;
    }

    let mut image = pixels::to_rgb(raw)?;

    if let Some(region) = region {
        let (width, height) = region.extent();
        if (width, height) != (raw.width, raw.height) {
            image = imageops::crop_imm(&image, region.left, region.top, width, height).to_image();
        }
    }

    if let Some((width, height)) = tier.target() {
        image = imageops::resize(&image, width, height, FilterType::Lanczos3);
    }

    let (width, height) = image.dimensions();
    let payload = match mode {
        OutputMode::Image => Payload::Image(Arc::new(image)),
        OutputMode::Encoded => Payload::Encoded(encode_jpeg(&image, quality)?),
    };

    metrics::histogram!("transform_time_us").record(started.elapsed().as_micros() as f64);

    Ok(Transformed {
        payload,
        width,
        height,
    })
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Bytes> {
    let mut jpeg = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(image)?;
    Ok(Bytes::from(jpeg))
}
