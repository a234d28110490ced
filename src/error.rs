//! Error types for pcm-render.
//!
//! Defines the error codes and the error type shared by the coordinator,
//! the WAVE encoder and the command-line front end.

use std::fmt;

/// Error codes identifying the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A value had the wrong shape or range.
    /// Trigger: odd-length sample data, negative frame counts, oversize WAVE.
    InvalidArgument,

    /// The song or options description could not be read.
    /// Trigger: missing file, malformed JSON, unknown fields.
    InvalidSong,

    /// The renderer gave up on a generation run.
    /// Trigger: renderer-specific failure while producing samples.
    RenderFailed,

    /// The background worker is not running.
    /// Trigger: thread spawn failure, or the worker already shut down.
    WorkerUnavailable,

    /// Writing the exported WAVE file failed.
    /// Trigger: unwritable path, disk full.
    ExportFailed,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::InvalidSong => "INVALID_SONG",
            ErrorCode::RenderFailed => "RENDER_FAILED",
            ErrorCode::WorkerUnavailable => "WORKER_UNAVAILABLE",
            ErrorCode::ExportFailed => "EXPORT_FAILED",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "An argument had an invalid shape or range",
            ErrorCode::InvalidSong => "The song description could not be loaded",
            ErrorCode::RenderFailed => "The renderer failed to produce samples",
            ErrorCode::WorkerUnavailable => "The generation worker is not running",
            ErrorCode::ExportFailed => "The WAVE file could not be written",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => {
                "Check that sample data is stereo-interleaved (even length) \
                 and that counts are non-negative"
            }
            ErrorCode::InvalidSong => {
                "Verify the song file exists and is valid JSON with bpm and notes fields"
            }
            ErrorCode::RenderFailed => {
                "Inspect the song for out-of-range values (bpm, frequencies) and try again"
            }
            ErrorCode::WorkerUnavailable => {
                "Create a new coordinator; the previous one was shut down or could not start"
            }
            ErrorCode::ExportFailed => {
                "Check that the output directory exists, is writable, and has free space"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for rendering and export operations.
#[derive(Debug)]
pub struct RenderError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RenderError {
    /// Creates a new RenderError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new RenderError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an INVALID_ARGUMENT error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, reason)
    }

    /// Creates an INVALID_ARGUMENT error for sample data with an odd length.
    pub fn odd_sample_count(len: usize) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!(
                "Sample data has {} values; stereo-interleaved data needs an even count",
                len
            ),
        )
    }

    /// Creates an INVALID_ARGUMENT error for a negative frame count.
    pub fn negative_frames(frames: i64) -> Self {
        Self::new(
            ErrorCode::InvalidArgument,
            format!("Frame count must be non-negative, got {}", frames),
        )
    }

    /// Creates an INVALID_SONG error.
    pub fn invalid_song(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidSong,
            format!("Invalid song: {}", reason.into()),
        )
    }

    /// Creates a RENDER_FAILED error.
    pub fn render_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RenderFailed,
            format!("Render failed: {}", reason.into()),
        )
    }

    /// Creates a WORKER_UNAVAILABLE error.
    pub fn worker_unavailable(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::WorkerUnavailable,
            format!("Worker unavailable: {}", reason.into()),
        )
    }

    /// Creates an EXPORT_FAILED error wrapping an I/O failure.
    pub fn export_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::with_source(
            ErrorCode::ExportFailed,
            format!("Failed to write WAVE file: {}", path.into()),
            source,
        )
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using RenderError.
pub type Result<T> = std::result::Result<T, RenderError>;
