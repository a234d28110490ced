//! Core types for pcm-render.
//!
//! This module re-exports the data types used throughout the crate:
//! - [`SampleBuffer`]: an immutable snapshot of interleaved stereo samples
//! - [`GenerationState`]: the coordinator's idle/generating lifecycle
//! - [`ToneSong`] and [`RenderOptions`]: input for the built-in tone renderer

mod buffer;
mod song;
mod state;

// Re-export all types at the module level
pub use buffer::{SampleBuffer, CHANNELS, SAMPLE_RATE};
pub use song::{RenderOptions, ToneNote, ToneSong, Waveform, MAX_RENDER_SEC};
pub use state::GenerationState;
