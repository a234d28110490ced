//! pcm-render: offline PCM track generation with WAVE export.
//!
//! A [`GenerationCoordinator`] runs a [`Renderer`] on a background worker
//! thread and publishes each progress snapshot as the current
//! [`SampleBuffer`]. The latest snapshot can be exported as a byte-exact
//! 16-bit stereo 44.1kHz WAVE file or sampled in windows for playback and
//! visualization.
//!
//! # Modules
//!
//! - [`types`]: Core data types (SampleBuffer, GenerationState, ToneSong)
//! - [`generation`]: Coordinator, renderer interface, built-in tone renderer
//! - [`audio`]: WAVE encoder and window sampler
//! - [`config`]: Runtime configuration (RenderConfig)
//! - [`error`]: Error types and codes (RenderError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use pcm_render::{GenerationCoordinator, RenderOptions, ToneRenderer, ToneSong};
//!
//! let song = ToneSong::from_file("song.json".as_ref())?;
//! let coordinator = GenerationCoordinator::new(ToneRenderer::new())?;
//!
//! coordinator.generate(&song, &RenderOptions::default(), |progress, track, id| {
//!     println!("track {}: {:.0}%", id, progress * 100.0);
//!     if progress >= 1.0 {
//!         let wave = track.create_wave().unwrap();
//!         std::fs::write("out.wav", wave.as_bytes()).unwrap();
//!     }
//! })?;
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use audio::{encode, read_window, WaveFile};
pub use config::RenderConfig;
pub use error::{ErrorCode, RenderError, Result};
pub use generation::{GenerationCoordinator, ProgressSink, Renderer, ToneRenderer, TrackHandle};
pub use types::{GenerationState, RenderOptions, SampleBuffer, ToneSong};
