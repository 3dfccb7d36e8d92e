use std::fmt;
use std::path::Path;

use crate::formats::FormatProfile;

pub mod ffmpeg;

pub use ffmpeg::FfmpegEncoder;

/// Why one encoder run did not produce an output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeFailure {
    /// Best-effort text from the encoder's error channel.
    pub diagnostic: Option<String>,
}

impl EncodeFailure {
    pub fn with_diagnostic(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn silent() -> Self {
        Self { diagnostic: None }
    }
}

impl fmt::Display for EncodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.diagnostic {
            Some(msg) if !msg.trim().is_empty() => write!(f, "{}", msg.trim()),
            _ => write!(f, "unknown encoder error"),
        }
    }
}

/// One-shot external transcoder.
///
/// Implementations block until the output file is complete. They must not
/// touch anything but `output`.
pub trait AudioEncoder: Send + Sync {
    fn encode(&self, input: &Path, output: &Path, profile: &FormatProfile) -> Result<(), EncodeFailure>;
    fn encoder_type(&self) -> &'static str;
}
