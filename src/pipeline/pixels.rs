//! Channel normalization from adapter layouts to packed RGB

use image::RgbImage;

use crate::capture::frame::RawFrame;
use crate::error::{CaptureError, Result};

/// Convert a raw frame into an RGB image, dropping alpha/padding channels
/// and any pitch padding at row ends.
pub fn to_rgb(raw: &RawFrame) -> Result<RgbImage> {
    raw.check()?;

    let bpp = raw.order.bytes_per_pixel();
    let [r, g, b] = raw.order.rgb_offsets();
    let row_len = raw.width as usize * bpp;

    let mut rgb = Vec::with_capacity(raw.width as usize * raw.height as usize * 3);
    for y in 0..raw.height as usize {
        let start = y * raw.stride as usize;
        let row = &raw.data[start..start + row_len];
        for pixel in row.chunks_exact(bpp) {
            rgb.push(pixel[r]); // R
            rgb.push(pixel[g]); // G
            rgb.push(pixel[b]); // B
        }
    }

    RgbImage::from_raw(raw.width, raw.height, rgb)
        .ok_or_else(|| CaptureError::InvalidFrame("pixel count mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::ChannelOrder;

    #[test]
    fn bgra_is_swapped_to_rgb() {
        let raw = RawFrame::packed(vec![10, 20, 30, 255, 1, 2, 3, 0], 2, 1, ChannelOrder::Bgra);
        let image = to_rgb(&raw).unwrap();
        assert_eq!(image.as_raw(), &vec![30, 20, 10, 3, 2, 1]);
    }

    #[test]
    fn rgbx_drops_padding_channel() {
        let raw = RawFrame::packed(vec![10, 20, 30, 99], 1, 1, ChannelOrder::Rgbx);
        let image = to_rgb(&raw).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn row_padding_is_trimmed() {
        // 1x2 BGR image with 2 bytes of pitch padding per row
        let data = vec![1, 2, 3, 0xEE, 0xEE, 4, 5, 6];
        let raw = RawFrame::packed(data, 1, 2, ChannelOrder::Bgr).with_stride(5);
        let image = to_rgb(&raw).unwrap();
        assert_eq!(image.dimensions(), (1, 2));
        assert_eq!(image.as_raw(), &vec![3, 2, 1, 6, 5, 4]);
    }
}
