// BlockPool - lock-free pool of stereo analysis blocks with dual SPSC queues
//
// Implements an object pool pattern using two lock-free SPSC (Single Producer Single Consumer)
// ring buffers. The audio callback never allocates: every block it fills was allocated here.
//
// Architecture:
// - READY queue: audio thread pushes completed blocks, analysis thread consumes
// - POOL queue: analysis thread returns consumed blocks, audio thread recycles
//
// Block flow:
// 1. Audio thread fills its active block sample by sample
// 2. When full, it swaps in an empty block popped from POOL and pushes the full one to READY
// 3. Analysis thread pops from READY, transforms it, pushes it back to POOL
//
// With two blocks in flight this is a classic double buffer: if the analysis thread has not
// returned the previous block by the time the next one completes, POOL is empty and the
// audio thread keeps overwriting its active block instead of waiting. Extra blocks in flight
// only let the consumer hold a block while it works; READY never holds more than one.

use rtrb::{Consumer, Producer};

/// Samples per channel in one analysis block (FFT order 13)
pub const BLOCK_SIZE: usize = 1 << 13;

/// Default number of pre-allocated blocks (one filling, one ready)
pub const DEFAULT_BLOCKS_IN_FLIGHT: usize = 2;

/// One block of synchronized measurement/reference samples
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBlock {
    /// Channel A: the signal under test
    pub measurement: Vec<f32>,
    /// Channel B: the signal it is compared against
    pub reference: Vec<f32>,
}

impl StereoBlock {
    /// Allocate a zeroed block with `len` samples per channel
    pub fn zeroed(len: usize) -> Self {
        Self {
            measurement: vec![0.0; len],
            reference: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.measurement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurement.is_empty()
    }
}

/// Producer-side halves used by the audio callback
pub struct AudioThreadChannels {
    /// Completed blocks handed to the analysis thread
    pub ready_producer: Producer<StereoBlock>,
    /// Empty blocks returned by the analysis thread
    pub pool_consumer: Consumer<StereoBlock>,
}

/// Consumer-side halves used by the analysis thread
pub struct AnalysisThreadChannels {
    /// Completed blocks from the audio callback
    pub ready_consumer: Consumer<StereoBlock>,
    /// Consumed blocks going back to the audio callback
    pub pool_producer: Producer<StereoBlock>,
}

/// Split block pool channels for producer/consumer separation
///
/// Returned by [`BlockPool::new`]; call [`BlockPoolChannels::split_for_threads`]
/// to hand each side to its thread. `spare` is the block the producer starts
/// filling.
pub struct BlockPoolChannels {
    pub ready_producer: Producer<StereoBlock>,
    pub ready_consumer: Consumer<StereoBlock>,
    pub pool_producer: Producer<StereoBlock>,
    pub pool_consumer: Consumer<StereoBlock>,
    pub spare: StereoBlock,
}

impl BlockPoolChannels {
    /// Separate the queues into the audio-thread and analysis-thread halves
    pub fn split_for_threads(self) -> (AudioThreadChannels, AnalysisThreadChannels, StereoBlock) {
        (
            AudioThreadChannels {
                ready_producer: self.ready_producer,
                pool_consumer: self.pool_consumer,
            },
            AnalysisThreadChannels {
                ready_consumer: self.ready_consumer,
                pool_producer: self.pool_producer,
            },
            self.spare,
        )
    }
}

/// Lock-free block pool using dual SPSC ring buffers
pub struct BlockPool;

impl BlockPool {
    /// Create a pool of `block_count` stereo blocks of `block_size` samples
    ///
    /// One block is handed out as the producer's initial active block, the
    /// rest wait in the pool queue.
    ///
    /// # Panics
    /// Panics if `block_count < 2` or `block_size` is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(block_count: usize, block_size: usize) -> BlockPoolChannels {
        assert!(block_count >= 2, "block_count must be at least 2");
        assert!(block_size > 0, "block_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(block_count);
        let (ready_producer, ready_consumer) = rtrb::RingBuffer::new(block_count);

        // This is the only place where block allocation occurs
        for _ in 1..block_count {
            pool_producer
                .push(StereoBlock::zeroed(block_size))
                .expect("Failed to push block to pool queue during initialization");
        }

        BlockPoolChannels {
            ready_producer,
            ready_consumer,
            pool_producer,
            pool_consumer,
            spare: StereoBlock::zeroed(block_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_pool_creation() {
        let mut channels = BlockPool::new(4, 512);

        let mut available = 0;
        while channels.pool_consumer.pop().is_ok() {
            available += 1;
        }
        assert_eq!(available, 3, "one block is reserved as the active spare");
        assert_eq!(channels.spare.len(), 512);
        assert!(
            channels.ready_consumer.pop().is_err(),
            "Ready queue should be empty initially"
        );
    }

    #[test]
    fn test_block_circulation() {
        let channels = BlockPool::new(2, 64);
        let (mut audio, mut analysis, mut active) = channels.split_for_threads();

        active.measurement[0] = 1.0;
        active.reference[0] = -1.0;
        let fresh = audio.pool_consumer.pop().expect("pool has a block");
        let full = std::mem::replace(&mut active, fresh);
        audio.ready_producer.push(full).expect("ready queue has room");

        let block = analysis.ready_consumer.pop().expect("block is ready");
        assert_eq!(block.measurement[0], 1.0);
        assert_eq!(block.reference[0], -1.0);
        analysis
            .pool_producer
            .push(block)
            .expect("pool queue has room");

        assert!(audio.pool_consumer.pop().is_ok());
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioThreadChannels>();
        assert_send::<AnalysisThreadChannels>();
        assert_send::<BlockPoolChannels>();
    }

    #[test]
    #[should_panic(expected = "block_count must be at least 2")]
    fn test_single_block_panics() {
        BlockPool::new(1, 1024);
    }

    #[test]
    #[should_panic(expected = "block_size must be greater than 0")]
    fn test_zero_block_size_panics() {
        BlockPool::new(2, 0);
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(BLOCK_SIZE, 8192);
        assert_eq!(DEFAULT_BLOCKS_IN_FLIGHT, 2);
    }
}
