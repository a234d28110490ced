//! WAVE encoder for generated tracks.
//!
//! Produces a canonical 44-byte RIFF/WAVE header followed by 16-bit
//! little-endian PCM. The header is written field by field so the output is
//! byte-exact regardless of any WAV library's chunk layout choices.

use std::path::Path;

use crate::error::{RenderError, Result};
use crate::types::{SampleBuffer, CHANNELS, SAMPLE_RATE};

/// Size of the RIFF/WAVE header in bytes.
pub const HEADER_LEN: usize = 44;

/// Bits per encoded sample.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Bytes per second of encoded audio (176400).
pub const BYTE_RATE: u32 = SAMPLE_RATE * CHANNELS as u32 * BITS_PER_SAMPLE as u32 / 8;

/// Bytes per stereo frame (4).
pub const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Lowest encoded sample value. One above `i16::MIN`; existing exports
/// depend on this floor.
pub const SAMPLE_MIN: i32 = -32767;

/// Highest encoded sample value.
pub const SAMPLE_MAX: i32 = 32767;

/// PCM format tag.
const FORMAT_PCM: u16 = 1;

/// Length of the `fmt ` chunk body for plain PCM.
const FMT_CHUNK_LEN: u32 = 16;

/// An encoded WAVE file.
///
/// Always `HEADER_LEN + 2 * samples` bytes long, with the RIFF and data
/// chunk sizes consistent with that length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveFile {
    bytes: Vec<u8>,
}

#[allow(clippy::len_without_is_empty)]
impl WaveFile {
    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the file and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the total file length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the file carries no sample data.
    pub fn is_header_only(&self) -> bool {
        self.bytes.len() == HEADER_LEN
    }

    /// Returns the RIFF `ChunkSize` field (file length minus 8).
    pub fn chunk_size(&self) -> u32 {
        read_u32(&self.bytes, 4)
    }

    /// Returns the `Subchunk2Size` field (data length in bytes).
    pub fn data_size(&self) -> u32 {
        read_u32(&self.bytes, 40)
    }

    /// Writes the file to disk.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)
            .map_err(|e| RenderError::export_failed(path.display().to_string(), e))
    }
}

impl AsRef<[u8]> for WaveFile {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Clamps a sample to the encoder's 16-bit range.
///
/// Saturating, with an asymmetric floor: `-32768` becomes `-32767`.
pub fn clamp_sample(sample: i32) -> i16 {
    sample.clamp(SAMPLE_MIN, SAMPLE_MAX) as i16
}

/// Encodes a sample buffer as a stereo 16-bit 44.1kHz WAVE file.
///
/// An empty buffer yields a 44-byte header-only file. Fails with
/// `InvalidArgument` only if the file would not fit the 32-bit RIFF sizes.
///
/// # Example
///
/// ```
/// use pcm_render::audio::encode;
/// use pcm_render::types::SampleBuffer;
///
/// let buffer = SampleBuffer::from_interleaved(vec![100, -100]).unwrap();
/// let wave = encode(&buffer).unwrap();
/// assert_eq!(wave.len(), 48);
/// assert_eq!(&wave.as_bytes()[0..4], b"RIFF");
/// ```
pub fn encode(buffer: &SampleBuffer) -> Result<WaveFile> {
    let data_len = u32::try_from(buffer.len())
        .ok()
        .and_then(|n| n.checked_mul(2))
        .filter(|n| n.checked_add(HEADER_LEN as u32 - 8).is_some())
        .ok_or_else(|| {
            RenderError::invalid_argument(format!(
                "{} samples exceed the 4 GiB WAVE size limit",
                buffer.len()
            ))
        })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + data_len as usize);
    write_header(&mut bytes, data_len);
    for &sample in buffer.iter() {
        bytes.extend_from_slice(&clamp_sample(sample).to_le_bytes());
    }

    debug_assert_eq!(bytes.len(), HEADER_LEN + 2 * buffer.len());
    Ok(WaveFile { bytes })
}

/// Encodes a sample buffer and writes it to `path`.
pub fn write_wave(buffer: &SampleBuffer, path: &Path) -> Result<()> {
    encode(buffer)?.write_to(path)
}

fn write_header(out: &mut Vec<u8>, data_len: u32) {
    let chunk_size = data_len + HEADER_LEN as u32 - 8;

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&chunk_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&BYTE_RATE.to_le_bytes());
    out.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(field)
}
