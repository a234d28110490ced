//! CLI argument parser for standalone rendering.
//!
//! Loads a song, renders it on the background worker and exports the
//! result as a WAVE file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::types::RenderOptions;

/// pcm-render: render a song to a 16-bit stereo 44.1kHz WAVE file
#[derive(Parser, Debug)]
#[command(name = "pcm-render")]
#[command(about = "Render a song to a 16-bit stereo 44.1kHz WAVE file")]
#[command(version)]
pub struct Cli {
    /// Song description (JSON with bpm and notes)
    #[arg(short, long)]
    pub song: PathBuf,

    /// Render options file (JSON); individual flags below override it
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Output WAV file path (defaults to the export directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Master gain applied after mixing
    #[arg(short, long)]
    pub gain: Option<f32>,

    /// Seconds of silence appended after the last note
    #[arg(short, long)]
    pub tail: Option<f32>,

    /// Seed for the noise voice
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of progress notifications
    #[arg(long)]
    pub steps: Option<u32>,

    /// Track identifier reported with progress
    #[arg(long)]
    pub track_id: Option<u32>,

    /// After rendering, print a sample window starting at this time in seconds
    #[arg(long)]
    pub peek: Option<f64>,

    /// Stereo frames to print with --peek
    #[arg(long, default_value = "8", allow_hyphen_values = true)]
    pub frames: i64,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Builds render options from the options file and flag overrides.
    pub fn render_options(&self) -> Result<RenderOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    RenderError::invalid_song(format!("cannot read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&json)
                    .map_err(|e| RenderError::invalid_song(format!("options: {}", e)))?
            }
            None => RenderOptions::default(),
        };

        if let Some(gain) = self.gain {
            options.gain = gain;
        }
        if let Some(tail) = self.tail {
            options.tail_sec = tail;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if let Some(steps) = self.steps {
            options.progress_steps = steps;
        }

        match options.validate() {
            Some(reason) => Err(RenderError::invalid_argument(reason)),
            None => Ok(options),
        }
    }

    /// Returns the effective track id: the flag, else the configured value.
    pub fn track_id(&self, config: &RenderConfig) -> u32 {
        self.track_id.unwrap_or(config.track_id)
    }

    /// Returns the effective output path.
    ///
    /// Defaults to `track-<id>.wav` in the configured export directory.
    pub fn output_path(&self, config: &RenderConfig) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => RenderConfig {
                track_id: self.track_id(config),
                ..config.clone()
            }
            .default_export_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["pcm-render"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn song_is_required() {
        assert!(Cli::try_parse_from(["pcm-render"]).is_err());
    }

    #[test]
    fn defaults() {
        let cli = parse(&["--song", "song.json"]);
        assert_eq!(cli.song, PathBuf::from("song.json"));
        assert_eq!(cli.frames, 8);
        assert!(cli.peek.is_none());
        assert_eq!(cli.render_options().unwrap(), RenderOptions::default());
    }

    #[test]
    fn flags_override_options() {
        let cli = parse(&["-s", "a.json", "--gain", "0.5", "--seed", "7", "--steps", "3"]);
        let options = cli.render_options().unwrap();
        assert_eq!(options.gain, 0.5);
        assert_eq!(options.seed, 7);
        assert_eq!(options.progress_steps, 3);
    }

    #[test]
    fn options_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.json");
        std::fs::write(&path, r#"{ "tail_sec": 2.0, "seed": 11 }"#).unwrap();

        let cli = parse(&["-s", "a.json", "--options", path.to_str().unwrap(), "--seed", "12"]);
        let options = cli.render_options().unwrap();
        assert_eq!(options.tail_sec, 2.0);
        assert_eq!(options.seed, 12);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = parse(&["-s", "a.json", "--steps", "0"]);
        let err = cli.render_options().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn negative_frames_parse_for_later_rejection() {
        let cli = parse(&["-s", "a.json", "--peek", "0.5", "--frames", "-3"]);
        assert_eq!(cli.frames, -3);
    }

    #[test]
    fn output_path_defaults_to_export_dir() {
        let config = RenderConfig {
            export_dir: Some(PathBuf::from("renders")),
            track_id: 1,
            ..Default::default()
        };

        let cli = parse(&["-s", "a.json", "--track-id", "4"]);
        assert_eq!(cli.output_path(&config), PathBuf::from("renders/track-4.wav"));
        assert_eq!(cli.track_id(&config), 4);

        let cli = parse(&["-s", "a.json", "-o", "mine.wav"]);
        assert_eq!(cli.output_path(&config), PathBuf::from("mine.wav"));
        assert_eq!(cli.track_id(&config), 1);
    }
}
