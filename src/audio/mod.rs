//! Audio output module.
//!
//! Provides WAVE encoding and windowed sample reads for generated audio.

pub mod sampler;
pub mod wav;

// Re-export commonly used items
pub use sampler::{read_window, read_window_checked};
pub use wav::{clamp_sample, encode, write_wave, WaveFile, HEADER_LEN};
