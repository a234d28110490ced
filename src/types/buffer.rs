//! SampleBuffer type holding one generated PCM snapshot.
//!
//! A SampleBuffer is the unit handed from the renderer to the coordinator on
//! every progress notification. It is immutable once built, so readers can
//! keep a snapshot while a newer one is published.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::{RenderError, Result};

/// Output sample rate in Hz. Fixed; there is no rate negotiation.
pub const SAMPLE_RATE: u32 = 44100;

/// Number of interleaved channels (stereo).
pub const CHANNELS: u16 = 2;

/// Interleaved stereo samples: even indices are left, odd indices are right.
///
/// Samples are stored as `i32` so a renderer can hand over its mix
/// accumulator directly; values outside the 16-bit range are kept as is and
/// only clamped when encoded. Cloning is cheap and shares the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Arc<[i32]>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self {
            samples: Arc::from(Vec::new()),
        }
    }
}

impl SampleBuffer {
    /// Creates an empty buffer.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps interleaved stereo samples.
    ///
    /// Returns `InvalidArgument` if the sample count is odd.
    pub fn from_interleaved(samples: Vec<i32>) -> Result<Self> {
        if samples.len() % 2 != 0 {
            return Err(RenderError::odd_sample_count(samples.len()));
        }
        Ok(Self {
            samples: samples.into(),
        })
    }

    /// Interleaves separate left and right channels.
    ///
    /// Returns `InvalidArgument` if the channels differ in length.
    pub fn from_channels(left: &[i32], right: &[i32]) -> Result<Self> {
        if left.len() != right.len() {
            return Err(RenderError::invalid_argument(format!(
                "Channel lengths differ: left has {}, right has {}",
                left.len(),
                right.len()
            )));
        }
        let samples: Vec<i32> = left
            .iter()
            .zip(right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        Ok(Self {
            samples: samples.into(),
        })
    }

    /// Returns the interleaved samples.
    pub fn as_slice(&self) -> &[i32] {
        &self.samples
    }

    /// Returns the number of stereo frames (half the sample count).
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Returns the duration in seconds at [`SAMPLE_RATE`].
    pub fn duration_sec(&self) -> f64 {
        self.frames() as f64 / SAMPLE_RATE as f64
    }

    /// Returns true if both buffers share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl Deref for SampleBuffer {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        &self.samples
    }
}

impl TryFrom<Vec<i32>> for SampleBuffer {
    type Error = RenderError;

    fn try_from(samples: Vec<i32>) -> Result<Self> {
        Self::from_interleaved(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn odd_length_is_rejected() {
        let err = SampleBuffer::from_interleaved(vec![1, 2, 3]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn empty_buffer_is_valid() {
        let buffer = SampleBuffer::from_interleaved(Vec::new()).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.frames(), 0);
        assert_eq!(buffer, SampleBuffer::empty());
    }

    #[test]
    fn channels_are_interleaved_left_first() {
        let buffer = SampleBuffer::from_channels(&[1, 3, 5], &[2, 4, 6]).unwrap();
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.frames(), 3);
    }

    #[test]
    fn mismatched_channels_are_rejected() {
        assert!(SampleBuffer::from_channels(&[1, 2], &[3]).is_err());
    }

    #[test]
    fn wide_samples_are_preserved() {
        let buffer = SampleBuffer::try_from(vec![-40000, 40000]).unwrap();
        assert_eq!(buffer[0], -40000);
        assert_eq!(buffer[1], 40000);
    }

    #[test]
    fn duration_uses_fixed_rate() {
        let buffer = SampleBuffer::from_interleaved(vec![0; 2 * 44100]).unwrap();
        assert_eq!(buffer.duration_sec(), 1.0);
    }

    #[test]
    fn clones_share_storage() {
        let a = SampleBuffer::from_interleaved(vec![7, 8]).unwrap();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
    }
}
