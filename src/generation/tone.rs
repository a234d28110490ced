//! Built-in tone renderer.
//!
//! Mixes the notes of a [`ToneSong`] into a 32-bit accumulator and publishes
//! a full snapshot after each rendered chunk. This keeps the crate runnable
//! end to end without an external synthesizer.

use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::renderer::{ProgressSink, Renderer};
use crate::error::{RenderError, Result};
use crate::types::{
    RenderOptions, SampleBuffer, ToneNote, ToneSong, Waveform, MAX_RENDER_SEC, SAMPLE_RATE,
};

/// Amplitude of a full-volume note before master gain.
const FULL_SCALE: f32 = 32767.0;

/// Fade-in/fade-out length applied to every note (5 ms).
const RAMP_FRAMES: usize = SAMPLE_RATE as usize / 200;

/// Renders [`ToneSong`]s with simple oscillators.
#[derive(Debug, Default, Clone)]
pub struct ToneRenderer;

impl ToneRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// A note resolved to frame positions.
struct Voice<'a> {
    note: &'a ToneNote,
    start: usize,
    end: usize,
    left_gain: f32,
    right_gain: f32,
}

impl<'a> Voice<'a> {
    fn new(note: &'a ToneNote, seconds_per_beat: f32) -> Self {
        let start = seconds_to_frames(note.start_beat * seconds_per_beat);
        let end = seconds_to_frames((note.start_beat + note.beats) * seconds_per_beat);
        Self {
            note,
            start,
            end,
            left_gain: 1.0 - note.pan.max(0.0),
            right_gain: 1.0 + note.pan.min(0.0),
        }
    }

    /// Oscillator value at `offset` frames into the note, in [-1, 1].
    fn oscillator(&self, offset: usize, rng: &mut ChaCha8Rng) -> f32 {
        let cycles = self.note.frequency_hz * offset as f32 / SAMPLE_RATE as f32;
        let phase = cycles.fract();
        match self.note.waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Noise => rng.gen_range(-1.0..=1.0),
        }
    }

    /// Linear attack/release envelope.
    fn envelope(&self, offset: usize) -> f32 {
        let len = self.end - self.start;
        let ramp = RAMP_FRAMES.min(len / 2).max(1);
        let remaining = len - offset;
        if offset < ramp {
            offset as f32 / ramp as f32
        } else if remaining < ramp {
            remaining as f32 / ramp as f32
        } else {
            1.0
        }
    }

    /// Adds this voice's contribution to frames `from..to` of `mix`,
    /// saturating at the `i32` range.
    fn mix_into(&self, mix: &mut [i32], from: usize, to: usize, gain: f32, rng: &mut ChaCha8Rng) {
        let from = from.max(self.start);
        let to = to.min(self.end);
        for frame in from..to {
            let offset = frame - self.start;
            let value = self.oscillator(offset, rng)
                * self.envelope(offset)
                * self.note.volume
                * gain
                * FULL_SCALE;
            // Float-to-int casts saturate.
            let left = (value * self.left_gain).round() as i32;
            let right = (value * self.right_gain).round() as i32;
            mix[2 * frame] = mix[2 * frame].saturating_add(left);
            mix[2 * frame + 1] = mix[2 * frame + 1].saturating_add(right);
        }
    }
}

fn seconds_to_frames(seconds: f32) -> usize {
    (seconds as f64 * SAMPLE_RATE as f64).round() as usize
}

impl Renderer for ToneRenderer {
    type Song = ToneSong;
    type Options = RenderOptions;

    fn render(
        &mut self,
        song: ToneSong,
        options: RenderOptions,
        sink: &mut dyn ProgressSink,
    ) -> Result<()> {
        if let Some(reason) = song.validate() {
            return Err(RenderError::render_failed(reason));
        }
        if let Some(reason) = options.validate() {
            return Err(RenderError::render_failed(reason));
        }

        let length_sec = song.length_sec() + options.tail_sec;
        if length_sec > MAX_RENDER_SEC {
            return Err(RenderError::render_failed(format!(
                "render length {} seconds exceeds the {} second limit",
                length_sec, MAX_RENDER_SEC
            )));
        }

        let seconds_per_beat = song.seconds_per_beat();
        let voices: Vec<Voice<'_>> = song
            .notes
            .iter()
            .map(|note| Voice::new(note, seconds_per_beat))
            .filter(|voice| voice.end > voice.start)
            .collect();

        let total_frames = voices
            .iter()
            .map(|v| v.end)
            .max()
            .unwrap_or(0)
            .checked_add(seconds_to_frames(options.tail_sec))
            .filter(|frames| frames.checked_mul(2).is_some())
            .ok_or_else(|| RenderError::render_failed("render length overflows"))?;
        let chunk_frames = total_frames.div_ceil(options.progress_steps as usize).max(1);

        tracing::debug!(
            notes = voices.len(),
            total_frames,
            chunk_frames,
            "rendering tone song"
        );

        if total_frames == 0 {
            sink.report(1.0, SampleBuffer::empty());
            return Ok(());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let mut mix = vec![0i32; 2 * total_frames];

        let mut from = 0;
        while from < total_frames {
            let to = (from + chunk_frames).min(total_frames);
            for voice in &voices {
                voice.mix_into(&mut mix, from, to, options.gain, &mut rng);
            }

            let progress = to as f32 / total_frames as f32;
            let snapshot = SampleBuffer::from_interleaved(mix.clone())?;
            if sink.report(progress, snapshot).is_break() {
                tracing::debug!(progress, "tone render cancelled");
                return Ok(());
            }
            from = to;
        }

        Ok(())
    }
}
