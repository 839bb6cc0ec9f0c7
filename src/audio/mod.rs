// Audio module - sample providers and the lock-free block handoff

pub mod accumulator;
pub mod buffer_pool;
#[cfg(feature = "live-input")]
pub mod engine;
pub mod synth;
pub mod wav;

// Re-export commonly used types for convenience
pub use accumulator::SampleAccumulator;
pub use buffer_pool::{
    AnalysisThreadChannels, AudioThreadChannels, BlockPool, BlockPoolChannels, StereoBlock,
    BLOCK_SIZE, DEFAULT_BLOCKS_IN_FLIGHT,
};
#[cfg(feature = "live-input")]
pub use engine::{list_input_devices, AudioEngine, InputDeviceInfo};
pub use synth::{Resonance, SelfTestSignal};
pub use wav::WavReplay;
