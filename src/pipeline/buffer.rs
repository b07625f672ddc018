//! Bounded frame buffer with a fixed eviction policy

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::error::{CaptureError, Result};

/// Which end frames enter and leave by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Newest frame is retrieved first; the oldest is evicted when full
    #[default]
    FreshnessFirst,
    /// Frames are retrieved in production order; the oldest is evicted when full
    Fifo,
}

/// Capacity-bounded frame container shared by the capture loop and consumers.
///
/// The front of the deque is always the oldest frame. Both policies evict
/// from the front; they differ only in which end `retrieve` pops.
pub struct FrameBuffer {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    policy: BufferPolicy,

    stats: CachePadded<Stats>,
}

#[derive(Default)]
struct Stats {
    inserted: AtomicUsize,
    retrieved: AtomicUsize,
    evicted: AtomicUsize,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub inserted: usize,
    pub retrieved: usize,
    pub evicted: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize, policy: BufferPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            stats: CachePadded::new(Stats::default()),
        }
    }

    fn frames(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Producer: add a frame, evicting the oldest one when full
    pub fn insert(&self, frame: Frame) {
        let mut frames = self.frames();
        if frames.len() >= self.capacity {
            frames.pop_front();
            self.stats.evicted.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("frames_evicted").increment(1);
        }
        frames.push_back(frame);
        self.stats.inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Consumer: take the next frame according to the policy
    pub fn retrieve(&self) -> Result<Frame> {
        let frame = match self.policy {
            BufferPolicy::FreshnessFirst => self.frames().pop_back(),
            BufferPolicy::Fifo => self.frames().pop_front(),
        }
        .ok_or(CaptureError::EmptyBuffer)?;

        self.stats.retrieved.fetch_add(1, Ordering::Relaxed);
        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            inserted: self.stats.inserted.load(Ordering::Relaxed),
            retrieved: self.stats.retrieved.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Payload;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::thread;

    fn frame(sequence: u64) -> Frame {
        Frame::new(Payload::Encoded(Bytes::new()), sequence, 1, 1)
    }

    fn drain(buffer: &FrameBuffer) -> Vec<u64> {
        std::iter::from_fn(|| buffer.retrieve().ok())
            .map(|f| f.sequence())
            .collect()
    }

    #[test]
    fn length_never_exceeds_capacity() {
        for policy in [BufferPolicy::FreshnessFirst, BufferPolicy::Fifo] {
            for capacity in [1, 2, 5, 16] {
                let buffer = FrameBuffer::new(capacity, policy);
                for i in 0..(capacity as u64 * 3 + 1) {
                    buffer.insert(frame(i));
                    assert!(buffer.len() <= capacity);
                }
                assert_eq!(buffer.len(), capacity);
            }
        }
    }

    #[test]
    fn fifo_preserves_arrival_order() {
        let buffer = FrameBuffer::new(8, BufferPolicy::Fifo);
        for i in 1..=5 {
            buffer.insert(frame(i));
        }
        assert_eq!(drain(&buffer), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fifo_overflow_drops_head() {
        let buffer = FrameBuffer::new(3, BufferPolicy::Fifo);
        for i in 1..=5 {
            buffer.insert(frame(i));
        }
        assert_eq!(drain(&buffer), vec![3, 4, 5]);
        assert_eq!(buffer.stats().evicted, 2);
    }

    #[test]
    fn freshness_first_returns_newest_first() {
        let buffer = FrameBuffer::new(8, BufferPolicy::FreshnessFirst);
        for i in 1..=5 {
            buffer.insert(frame(i));
        }
        assert_eq!(drain(&buffer), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn freshness_first_overflow_loses_earliest() {
        let buffer = FrameBuffer::new(3, BufferPolicy::FreshnessFirst);
        for i in 1..=7 {
            buffer.insert(frame(i));
        }
        let order = drain(&buffer);
        assert_eq!(order, vec![7, 6, 5]);
        assert!(order.iter().all(|&s| s > 4));
    }

    #[test]
    fn empty_retrieve_reports_empty_buffer() {
        let buffer = FrameBuffer::new(4, BufferPolicy::Fifo);
        assert!(matches!(buffer.retrieve(), Err(CaptureError::EmptyBuffer)));
        buffer.insert(frame(1));
        assert!(buffer.retrieve().is_ok());
        assert!(matches!(buffer.retrieve(), Err(CaptureError::EmptyBuffer)));
    }

    #[test]
    fn concurrent_readers_never_see_a_frame_twice() {
        let buffer = Arc::new(FrameBuffer::new(1000, BufferPolicy::Fifo));
        for i in 0..1000 {
            buffer.insert(frame(i));
        }

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || drain(&buffer))
            })
            .collect();

        let mut seen: Vec<u64> = readers
            .into_iter()
            .flat_map(|r| r.join().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
        assert_eq!(buffer.stats().retrieved, 1000);
    }
}
