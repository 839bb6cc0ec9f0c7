//! Sample accumulator - the producer side of the analysis handoff
//!
//! Runs inside the audio-delivery callback. Every call is bounded and
//! real-time safe:
//! - No heap allocations (blocks come from the pre-allocated pool)
//! - No locks (rtrb queues and one relaxed atomic counter)
//! - No blocking: a stalled consumer costs a dropped block, never a wait

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::buffer_pool::{AudioThreadChannels, StereoBlock};

/// Gathers synchronized sample pairs into fixed-size stereo blocks
pub struct SampleAccumulator {
    channels: AudioThreadChannels,
    active: StereoBlock,
    cursor: usize,
    dropped_blocks: Arc<AtomicU64>,
    published_blocks: Arc<AtomicU64>,
}

impl SampleAccumulator {
    pub fn new(channels: AudioThreadChannels, active: StereoBlock) -> Self {
        Self {
            channels,
            active,
            cursor: 0,
            dropped_blocks: Arc::new(AtomicU64::new(0)),
            published_blocks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append one measurement/reference pair
    #[inline]
    pub fn push(&mut self, measurement: f32, reference: f32) {
        self.active.measurement[self.cursor] = measurement;
        self.active.reference[self.cursor] = reference;
        self.cursor += 1;

        if self.cursor == self.active.len() {
            self.publish();
            self.cursor = 0;
        }
    }

    /// Single-channel variant: measurement only, silent reference
    #[inline]
    pub fn push_mono(&mut self, sample: f32) {
        self.push(sample, 0.0);
    }

    /// Push a run of de-interleaved samples (lengths must match)
    pub fn push_slices(&mut self, measurement: &[f32], reference: &[f32]) {
        for (&a, &b) in measurement.iter().zip(reference.iter()) {
            self.push(a, b);
        }
    }

    /// Push interleaved frames, taking `channels[0]` and `channels[1]`
    pub fn push_interleaved(&mut self, data: &[f32], channel_count: usize) {
        if channel_count < 2 {
            return;
        }
        for frame in data.chunks_exact(channel_count) {
            self.push(frame[0], frame[1]);
        }
    }

    /// Samples written into the current block so far
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Shared counter of blocks overwritten because the consumer stalled
    pub fn dropped_blocks_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped_blocks)
    }

    /// Shared counter of blocks handed to the consumer
    pub fn published_blocks_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.published_blocks)
    }

    fn publish(&mut self) {
        // Previous block not yet taken by the consumer: overwrite the active one instead
        let capacity = self.channels.ready_producer.buffer().capacity();
        if self.channels.ready_producer.slots() < capacity {
            self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let fresh = match self.channels.pool_consumer.pop() {
            Ok(block) => block,
            Err(_) => {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let full = std::mem::replace(&mut self.active, fresh);
        if let Err(rtrb::PushError::Full(full)) = self.channels.ready_producer.push(full) {
            // Unreachable after the slots check; keep the data rather than dropping the Vec
            self.active = full;
            self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.published_blocks.fetch_add(1, Ordering::Relaxed);
    }
}
