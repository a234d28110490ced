//! Windowed reads of a sample buffer for playback and visualization.

use crate::error::{RenderError, Result};
use crate::types::{SampleBuffer, SAMPLE_RATE};

/// Divisor mapping 16-bit samples to roughly [-1, 1].
const SCALE: f64 = 32768.0;

/// Reads `frames` stereo frames starting at `t` seconds.
///
/// Returns `2 * frames` interleaved values. Position `j` holds
/// `buffer[2 * floor(t * 44100) + j] / 32768`, or `0.0` when `t <= 0`, the
/// index is past the end, or there is no buffer yet. Values are not clamped,
/// so overdriven samples read back outside [-1, 1].
///
/// # Example
///
/// ```
/// use pcm_render::audio::read_window;
/// use pcm_render::types::SampleBuffer;
///
/// let buffer = SampleBuffer::from_interleaved(vec![16384, -16384]).unwrap();
/// assert_eq!(read_window(Some(&buffer), 1e-6, 1), vec![0.5, -0.5]);
/// assert_eq!(read_window(None, 1.0, 2), vec![0.0; 4]);
/// ```
pub fn read_window(buffer: Option<&SampleBuffer>, t: f64, frames: usize) -> Vec<f32> {
    let len = 2 * frames;
    let samples = match buffer {
        Some(buffer) if t > 0.0 => buffer.as_slice(),
        _ => return vec![0.0; len],
    };

    // Float-to-int casts saturate, so huge t lands past the end.
    let start = ((t * SAMPLE_RATE as f64).floor() as usize).saturating_mul(2);

    (0..len)
        .map(|j| match samples.get(start.saturating_add(j)) {
            Some(&s) => (s as f64 / SCALE) as f32,
            None => 0.0,
        })
        .collect()
}

/// Like [`read_window`], for callers holding a signed frame count.
///
/// Fails with `InvalidArgument` if `frames` is negative.
pub fn read_window_checked(buffer: Option<&SampleBuffer>, t: f64, frames: i64) -> Result<Vec<f32>> {
    let frames = usize::try_from(frames).map_err(|_| RenderError::negative_frames(frames))?;
    Ok(read_window(buffer, t, frames))
}
