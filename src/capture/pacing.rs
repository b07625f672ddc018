//! Paced capture loop: poll, transform, buffer, sleep off the rest of the interval

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::capture::controller::{LoopState, Shared};
use crate::capture::Frame;
use crate::error::{CaptureError, Result};
use crate::pipeline::{transform, Transformed};
use crate::CaptureConfig;

/// Time left in a cycle of length `interval` after `elapsed` of work.
/// `None` means the cycle overran and the next one starts immediately.
pub fn remaining(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|rest| !rest.is_zero())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Captured,
    /// Source had nothing; the last produced frame was inserted again
    Repeated,
    /// Source had nothing and the buffer was empty
    Skipped,
}

pub(crate) struct CaptureLoop {
    shared: Arc<Shared>,
    config: CaptureConfig,
    warned: bool,
}

impl CaptureLoop {
    pub fn new(shared: Arc<Shared>, config: CaptureConfig) -> Self {
        Self {
            shared,
            config,
            warned: false,
        }
    }

    pub fn run(mut self) {
        let interval = self.config.frame_interval();
        info!(
            "Capture loop started: {} fps, tier {:?}, quality {}",
            self.config.fps, self.config.tier, self.config.quality
        );

        while self.shared.state.get() == LoopState::Running {
            let started = Instant::now();

            let cycle = self.cycle();

            let elapsed = started.elapsed();
            metrics::histogram!("cycle_time_us").record(elapsed.as_micros() as f64);
            debug!(?cycle, ?elapsed, "cycle done");

            if let Some(rest) = remaining(interval, elapsed) {
                thread::sleep(rest);
            }
        }

        self.shared.state.set(LoopState::Idle);
        info!("Capture loop stopped");
    }

    /// Poll and transform one frame. A panicking source or transform counts
    /// as a failed cycle.
    fn produce(&self) -> Result<Transformed> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            let raw = self.shared.poll_source()?;
            transform(
                &raw,
                self.config.region,
                self.config.tier,
                self.config.quality,
                self.config.output,
            )
        }))
        .unwrap_or_else(|_| {
            warn!("Frame producer panicked, skipping cycle");
            Err(CaptureError::Source("frame producer panicked".into()))
        })
    }

    fn cycle(&mut self) -> Cycle {
        match self.produce() {
            Ok(out) => {
                let frame = Frame::new(
                    out.payload,
                    self.shared.next_sequence(),
                    out.width,
                    out.height,
                );
                self.shared.publish(frame);
                metrics::counter!("frames_captured").increment(1);
                Cycle::Captured
            }
            Err(err) => {
                if err.is_transient() {
                    debug!("no frame this cycle: {}", err);
                } else if !self.warned {
                    // Same config fails the same way every cycle
                    warn!("Dropping frames: {}", err);
                    self.warned = true;
                }

                // The last produced frame outlives the session that made it
                match self.shared.latest() {
                    Some(last) if !self.shared.buffer.is_empty() => {
                        self.shared
                            .buffer
                            .insert(last.repeat(self.shared.next_sequence()));
                        metrics::counter!("frames_repeated").increment(1);
                        Cycle::Repeated
                    }
                    _ => {
                        metrics::counter!("frames_skipped").increment(1);
                        Cycle::Skipped
                    }
                }
            }
        }
    }
}
