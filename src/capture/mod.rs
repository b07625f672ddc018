pub mod controller;
pub mod frame;
pub mod pacing;
pub mod source;
#[cfg(feature = "xcap")]
pub mod screen;

pub use controller::{CaptureController, LoopState};
pub use frame::{ChannelOrder, Frame, FrameMetadata, Payload, RawFrame};
pub use source::{FrameSource, PatternSource};
#[cfg(feature = "xcap")]
pub use screen::XcapSource;
