use tracing::info;

use crate::capture::FrameSource;
use crate::error::Result;

/// Synthetic frame size used when no display backend is compiled in
pub const PATTERN_SIZE: (u32, u32) = (1920, 1080);

/// Open the best available frame source
#[cfg(feature = "xcap")]
pub fn open_source() -> Result<Box<dyn FrameSource>> {
    info!("Looking for the primary display...");
    Ok(Box::new(crate::capture::XcapSource::primary()?))
}

/// Open the best available frame source
#[cfg(not(feature = "xcap"))]
pub fn open_source() -> Result<Box<dyn FrameSource>> {
    info!("No display backend enabled, using synthetic pattern");
    let (width, height) = PATTERN_SIZE;
    // Every 10th poll has no new frame, like an idle desktop
    Ok(Box::new(
        crate::capture::PatternSource::new(width, height)?.with_gaps(10),
    ))
}
