// RTA AutoEQ Core - dual-channel real-time analyser
// Lock-free block handoff, relative response analysis and console EQ derivation

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod console;
pub mod engine;
pub mod eq;
pub mod error;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{ResponseCurve, BUCKET_COUNT, FFT_SIZE, SAMPLE_RATE};
pub use config::AppConfig;
pub use engine::{DisplayFrame, EngineHandle};
pub use eq::{ApplyOutcome, Cluster, Detection, EqBand};
