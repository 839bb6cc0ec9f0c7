//! Engine module housing the analyser's owner type.
//!
//! `EngineHandle` (in `core`) wires the analysis thread, detection state,
//! freeze state and console client together; `display` builds redraw frames.

pub mod core;
pub mod display;

pub use core::EngineHandle;
pub use display::DisplayFrame;
