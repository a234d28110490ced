//! The producer side of a generation run.
//!
//! A [`Renderer`] turns a song and options into sample data on the
//! coordinator's worker thread, publishing full snapshots through a
//! [`ProgressSink`] as it goes.

use std::ops::ControlFlow;

use crate::error::Result;
use crate::types::SampleBuffer;

/// Receives progress snapshots from a running renderer.
pub trait ProgressSink {
    /// Publishes the full buffer rendered so far together with a progress
    /// ratio in `[0, 1]`. The final snapshot of a run uses `1.0`.
    ///
    /// Returns `ControlFlow::Break` once the run has been superseded or
    /// cancelled; the renderer should stop and return.
    fn report(&mut self, progress: f32, buffer: SampleBuffer) -> ControlFlow<()>;
}

impl<F> ProgressSink for F
where
    F: FnMut(f32, SampleBuffer) -> ControlFlow<()>,
{
    fn report(&mut self, progress: f32, buffer: SampleBuffer) -> ControlFlow<()> {
        self(progress, buffer)
    }
}

/// A synthesis backend driven by [`super::GenerationCoordinator`].
///
/// Songs and options are opaque to the coordinator; it clones what the
/// caller passes and hands the clones to `render` unchanged.
pub trait Renderer: Send + 'static {
    /// Description of the composition.
    type Song: Clone + Send + 'static;

    /// Render settings such as quality or length.
    type Options: Clone + Send + 'static;

    /// Renders `song`, reporting zero or more intermediate snapshots and one
    /// final snapshot at `1.0`.
    ///
    /// Returning early after a `Break` from the sink is not an error.
    fn render(
        &mut self,
        song: Self::Song,
        options: Self::Options,
        sink: &mut dyn ProgressSink,
    ) -> Result<()>;
}
