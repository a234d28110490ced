//! Audio generation module.
//!
//! Provides the coordinator that runs a renderer on a background worker,
//! the renderer interface, and the built-in tone renderer.

pub mod coordinator;
pub mod renderer;
pub mod tone;

// Re-export commonly used items
pub use coordinator::{GenerationCoordinator, TrackHandle};
pub use renderer::{ProgressSink, Renderer};
pub use tone::ToneRenderer;
