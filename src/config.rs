//! Runtime configuration module.
//!
//! Contains the settings that are not part of a song: where exports go, the
//! track identifier reported to observers, and the log filter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default tracing filter when neither `RUST_LOG` nor `PCM_RENDER_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime configuration for rendering and export.
///
/// Loaded from environment variables at startup; command-line flags take
/// precedence over these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Directory for exported WAVE files.
    /// If None, uses the platform-specific default cache location.
    pub export_dir: Option<PathBuf>,

    /// Track identifier passed to progress observers.
    pub track_id: u32,

    /// `tracing-subscriber` filter directive, e.g. `info` or `pcm_render=debug`.
    pub log_filter: String,
}

impl RenderConfig {
    /// Creates a RenderConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a RenderConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `PCM_RENDER_EXPORT_DIR` - Directory for exported WAVE files
    /// - `PCM_RENDER_TRACK_ID` - Track identifier reported to observers
    /// - `PCM_RENDER_LOG` - Log filter directive
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PCM_RENDER_EXPORT_DIR") {
            if !path.is_empty() {
                config.export_dir = Some(PathBuf::from(path));
            }
        }

        if let Ok(track_str) = std::env::var("PCM_RENDER_TRACK_ID") {
            if let Ok(track_id) = track_str.parse::<u32>() {
                config.track_id = track_id;
            }
        }

        if let Ok(filter) = std::env::var("PCM_RENDER_LOG") {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }

        config
    }

    /// Returns the effective export directory, using platform defaults if not specified.
    pub fn effective_export_dir(&self) -> PathBuf {
        if let Some(ref path) = self.export_dir {
            path.clone()
        } else {
            default_export_dir()
        }
    }

    /// Returns the default export path for this configuration's track.
    pub fn default_export_path(&self) -> PathBuf {
        self.effective_export_dir()
            .join(format!("track-{}.wav", self.track_id))
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.log_filter.trim().is_empty() {
            return Some("log_filter must not be empty".to_string());
        }

        if let Some(ref dir) = self.export_dir {
            if dir.as_os_str().is_empty() {
                return Some("export_dir must not be empty".to_string());
            }
        }

        None
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            export_dir: None,
            track_id: 0,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Returns the platform-specific default export path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/pcm-render/exports
/// - Linux: ~/.cache/pcm-render/exports
/// - Windows: C:\Users\<user>\AppData\Local\pcm-render\cache\exports
fn default_export_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "pcm-render") {
        proj_dirs.cache_dir().join("exports")
    } else {
        // Fallback to current directory
        PathBuf::from("./exports")
    }
}
