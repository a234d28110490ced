//! Song and option types consumed by the built-in tone renderer.
//!
//! The coordinator treats songs and options as opaque; these concrete types
//! only matter to [`crate::generation::ToneRenderer`] and the CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// Longest render accepted, song plus tail, in seconds.
pub const MAX_RENDER_SEC: f32 = 600.0;

/// Oscillator shape for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Saw,
    /// Seeded white noise; `frequency_hz` is ignored.
    Noise,
}

/// A single note of a [`ToneSong`], positioned in beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToneNote {
    /// Onset in beats from the start of the song.
    pub start_beat: f32,

    /// Length in beats.
    pub beats: f32,

    /// Pitch in Hz.
    pub frequency_hz: f32,

    /// Linear amplitude, 0.0 to 1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Stereo position, -1.0 (left) to 1.0 (right).
    #[serde(default)]
    pub pan: f32,

    #[serde(default)]
    pub waveform: Waveform,
}

fn default_volume() -> f32 {
    0.5
}

/// A minimal song description: a tempo and a list of notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToneSong {
    /// Tempo in beats per minute.
    pub bpm: f32,

    pub notes: Vec<ToneNote>,
}

impl ToneSong {
    /// Parses a song from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RenderError::invalid_song(e.to_string()))
    }

    /// Reads and parses a song file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RenderError::invalid_song(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Returns the length of one beat in seconds.
    pub fn seconds_per_beat(&self) -> f32 {
        60.0 / self.bpm
    }

    /// Returns the time in seconds at which the last note ends.
    pub fn length_sec(&self) -> f32 {
        let spb = self.seconds_per_beat();
        self.notes
            .iter()
            .map(|n| (n.start_beat + n.beats) * spb)
            .fold(0.0, f32::max)
    }

    /// Validates the song.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if !(self.bpm.is_finite() && self.bpm > 0.0 && self.bpm <= 999.0) {
            return Some(format!("bpm must be between 0 and 999, got {}", self.bpm));
        }

        for (i, note) in self.notes.iter().enumerate() {
            if !(note.start_beat.is_finite() && note.start_beat >= 0.0) {
                return Some(format!("note {}: start_beat must be >= 0", i));
            }
            if !(note.beats.is_finite() && note.beats > 0.0) {
                return Some(format!("note {}: beats must be > 0", i));
            }
            if note.waveform != Waveform::Noise
                && !(note.frequency_hz.is_finite() && note.frequency_hz > 0.0)
            {
                return Some(format!("note {}: frequency_hz must be > 0", i));
            }
            if !(0.0..=1.0).contains(&note.volume) {
                return Some(format!("note {}: volume must be between 0 and 1", i));
            }
            if !(-1.0..=1.0).contains(&note.pan) {
                return Some(format!("note {}: pan must be between -1 and 1", i));
            }
        }

        let length = self.length_sec();
        if !(length.is_finite() && length <= MAX_RENDER_SEC) {
            return Some(format!(
                "song is {} seconds long, the limit is {}",
                length, MAX_RENDER_SEC
            ));
        }

        None
    }
}

/// Render settings forwarded alongside a song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    /// Master gain applied after mixing. Values above 1.0 can overdrive the
    /// 16-bit range; the WAVE encoder clamps.
    pub gain: f32,

    /// Silence appended after the last note, in seconds.
    pub tail_sec: f32,

    /// Seed for the noise voice.
    pub seed: u64,

    /// Number of progress notifications per run (the last one is final).
    pub progress_steps: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            gain: 1.0,
            tail_sec: 0.5,
            seed: 0,
            progress_steps: 20,
        }
    }
}

impl RenderOptions {
    /// Validates the options.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if !(self.gain.is_finite() && self.gain >= 0.0) {
            return Some(format!("gain must be >= 0, got {}", self.gain));
        }
        if !(self.tail_sec.is_finite() && (0.0..=MAX_RENDER_SEC).contains(&self.tail_sec)) {
            return Some(format!(
                "tail_sec must be between 0 and {}, got {}",
                MAX_RENDER_SEC, self.tail_sec
            ));
        }
        if self.progress_steps == 0 {
            return Some("progress_steps must be > 0".to_string());
        }
        None
    }
}
