//! Public lifecycle surface: start/stop the capture loop, drain frames, snapshot

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use arc_swap::ArcSwapOption;
use tracing::{error, info, instrument, warn};

use crate::capture::pacing::CaptureLoop;
use crate::capture::{Frame, FrameSource, RawFrame};
use crate::error::{CaptureError, Result};
use crate::pipeline::{transform, BufferStats, FrameBuffer, OutputMode, Transformed};
use crate::{BufferConfig, CaptureConfig, SnapshotConfig};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle = 0,
    Running = 1,
    /// Stop requested, loop has not yet noticed
    Stopping = 2,
}

pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    fn new() -> Self {
        Self(AtomicU8::new(LoopState::Idle as u8))
    }

    pub fn get(&self) -> LoopState {
        match self.0.load(Ordering::Acquire) {
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Idle,
        }
    }

    pub fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: LoopState, to: LoopState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// State shared between the controller and its capture loop
pub(crate) struct Shared {
    pub state: AtomicState,
    pub buffer: FrameBuffer,
    source: Mutex<Box<dyn FrameSource>>,
    latest: ArcSwapOption<Frame>,
    sequence: AtomicU64,
}

impl Shared {
    pub fn poll_source(&self) -> Result<RawFrame> {
        let mut source: MutexGuard<'_, Box<dyn FrameSource>> = self
            .source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        source.poll()
    }

    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.load_full()
    }

    /// Buffer a freshly produced frame and make it the latest
    pub fn publish(&self, frame: Frame) {
        self.latest.store(Some(Arc::new(frame.clone())));
        self.buffer.insert(frame);
    }
}

/// Owns one frame source and at most one running capture loop
pub struct CaptureController {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureController {
    /// Wrap an initialized source. The buffer policy is fixed for the
    /// controller's lifetime.
    #[instrument(skip(source))]
    pub fn new(source: impl FrameSource + 'static, buffer: &BufferConfig) -> Result<Self> {
        let dimensions = source.dimensions();
        if dimensions.0 == 0 || dimensions.1 == 0 {
            return Err(CaptureError::SourceInit(format!(
                "source reports {}x{}",
                dimensions.0, dimensions.1
            )));
        }

        info!(
            "Capture controller for {}x{} source, {} frame {:?} buffer",
            dimensions.0, dimensions.1, buffer.capacity, buffer.policy
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: AtomicState::new(),
                buffer: FrameBuffer::new(buffer.capacity, buffer.policy),
                source: Mutex::new(Box::new(source)),
                latest: ArcSwapOption::empty(),
                sequence: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        })
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the capture loop on its own thread. Returns false if a loop is
    /// already running or still winding down, or if `config` is invalid.
    pub fn start(&self, config: CaptureConfig) -> bool {
        if let Err(err) = config.validate() {
            error!("Refusing to start capture: {}", err);
            return false;
        }

        if !self.shared.state.transition(LoopState::Idle, LoopState::Running) {
            return false;
        }

        let mut worker = self.worker();
        // Previous loop already set Idle, so this returns promptly
        if let Some(previous) = worker.take() {
            let _ = previous.join();
        }

        let capture = CaptureLoop::new(Arc::clone(&self.shared), config);
        match thread::Builder::new()
            .name("framecast-capture".into())
            .spawn(move || capture.run())
        {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(err) => {
                error!("Failed to spawn capture thread: {}", err);
                self.shared.state.set(LoopState::Idle);
                false
            }
        }
    }

    /// Ask the loop to stop after its current cycle. Returns immediately;
    /// false if nothing was running.
    pub fn stop(&self) -> bool {
        let stopped = self
            .shared
            .state
            .transition(LoopState::Running, LoopState::Stopping);
        if stopped {
            info!("Capture stop requested");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.get() == LoopState::Running
    }

    pub fn state(&self) -> LoopState {
        self.shared.state.get()
    }

    /// Block until the loop thread has exited
    pub fn join(&self) {
        let handle = self.worker().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
                self.shared.state.set(LoopState::Idle);
            }
        }
    }

    /// Next frame per the buffer policy, or [`CaptureError::EmptyBuffer`]
    pub fn drain(&self) -> Result<Frame> {
        self.shared.buffer.retrieve()
    }

    /// Most recently captured frame, without removing anything
    pub fn latest(&self) -> Option<Frame> {
        self.shared.latest().map(|frame| (*frame).clone())
    }

    /// Grab one frame synchronously, independent of the loop. Polls the
    /// source without backoff until it yields a frame or the configured
    /// timeout passes.
    #[instrument(skip(self))]
    pub fn snapshot(&self, config: &SnapshotConfig) -> Result<Transformed> {
        let started = Instant::now();
        let timeout = config.timeout();

        let raw = loop {
            match self.shared.poll_source() {
                Ok(raw) => break raw,
                Err(err) if err.is_transient() => {}
                Err(err) => return Err(err),
            }
            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    return Err(CaptureError::Timeout(timeout));
                }
            }
            std::hint::spin_loop();
        };

        transform(&raw, None, config.tier, config.quality, OutputMode::Encoded)
    }

    pub fn len(&self) -> usize {
        self.shared.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.buffer.is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.buffer.stats()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
