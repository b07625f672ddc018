pub mod buffer;
pub mod pixels;
pub mod transform;

pub use buffer::{BufferPolicy, BufferStats, FrameBuffer};
pub use transform::{transform, OutputMode, Region, Tier, Transformed};
