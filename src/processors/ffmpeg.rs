use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use super::{AudioEncoder, EncodeFailure};
use crate::formats::FormatProfile;

/// Runs the `ffmpeg` binary once per file.
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Argument list for one conversion:
    /// `-y -hide_banner -loglevel error -i <input> [-acodec <codec>] <extra...> <output>`
    pub fn build_args(input: &Path, output: &Path, profile: &FormatProfile) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_os_string());

        if let Some(codec) = &profile.codec {
            args.push("-acodec".into());
            args.push(codec.into());
        }
        args.extend(profile.extra_args.iter().map(OsString::from));
        args.push(output.as_os_str().to_os_string());
        args
    }

    /// Last non-empty line of the encoder's stderr; ffmpeg puts the reason
    /// for an abort there.
    fn diagnostic_from_stderr(stderr: &[u8]) -> Option<String> {
        String::from_utf8_lossy(stderr)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(str::to_string)
    }
}

impl AudioEncoder for FfmpegEncoder {
    fn encode(&self, input: &Path, output: &Path, profile: &FormatProfile) -> Result<(), EncodeFailure> {
        let args = Self::build_args(input, output, profile);
        debug!("Running {:?} {:?}", self.binary, args);

        let result = Command::new(&self.binary).args(&args).output();

        match result {
            Ok(out) if out.status.success() => {
                info!("Encoded {:?} -> {:?}", input, output);
                Ok(())
            }
            Ok(out) => {
                let diagnostic = Self::diagnostic_from_stderr(&out.stderr)
                    .unwrap_or_else(|| format!("encoder exited with {}", out.status));
                Err(EncodeFailure::with_diagnostic(diagnostic))
            }
            Err(e) => Err(EncodeFailure::with_diagnostic(format!(
                "failed to launch {}: {}",
                self.binary.display(),
                e
            ))),
        }
    }

    fn encoder_type(&self) -> &'static str {
        "ffmpeg"
    }
}
