//! Target-format resolution: registered encoding profiles plus validated
//! custom extensions.

use serde::Serialize;

use crate::errors::{AudioResult, ConvertError};

/// Longest accepted custom extension.
pub const MAX_CUSTOM_EXTENSION_LEN: usize = 10;

/// Encoding parameters for one target format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatProfile {
    /// Codec handed to the encoder; `None` lets the encoder pick one from
    /// the output extension.
    pub codec: Option<String>,
    pub extension: String,
    pub extra_args: Vec<String>,
}

impl FormatProfile {
    fn registered(codec: &str, extension: &str, extra_args: &[&str]) -> Self {
        Self {
            codec: Some(codec.to_string()),
            extension: extension.to_string(),
            extra_args: extra_args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn custom(extension: &str) -> Self {
        Self {
            codec: None,
            extension: extension.to_string(),
            extra_args: Vec::new(),
        }
    }
}

const STEREO_48K: [&str; 4] = ["-ar", "48000", "-ac", "2"];

fn with_stereo_48k(args: &[&'static str]) -> Vec<&'static str> {
    let mut all = args.to_vec();
    all.extend_from_slice(&STEREO_48K);
    all
}

/// Names in the static registry, in display order.
pub const REGISTERED_FORMATS: [&str; 8] = ["wav", "flac", "mp3", "ogg", "opus", "m4a", "aac", "aiff"];

fn lookup(name: &str) -> Option<FormatProfile> {
    let profile = match name {
        "wav" => FormatProfile::registered("pcm_s24le", "wav", &STEREO_48K),
        "flac" => FormatProfile::registered("flac", "flac", &with_stereo_48k(&["-compression_level", "8"])),
        "mp3" => FormatProfile::registered("libmp3lame", "mp3", &with_stereo_48k(&["-b:a", "320k"])),
        "ogg" => FormatProfile::registered("libvorbis", "ogg", &with_stereo_48k(&["-q:a", "6"])),
        "opus" => FormatProfile::registered("libopus", "opus", &with_stereo_48k(&["-b:a", "160k"])),
        "m4a" | "aac" => FormatProfile::registered("aac", "m4a", &with_stereo_48k(&["-b:a", "256k"])),
        "aiff" => FormatProfile::registered("pcm_s24be", "aiff", &STEREO_48K),
        _ => return None,
    };
    Some(profile)
}

/// Resolve a requested format token into a profile.
///
/// Tokens are case-insensitive and trimmed. Unknown tokens are accepted as
/// a bare extension when they are ASCII alphanumeric and at most
/// [`MAX_CUSTOM_EXTENSION_LEN`] characters long.
pub fn resolve(token: &str) -> AudioResult<FormatProfile> {
    let name = token.trim().to_lowercase();
    if name.is_empty() {
        return Err(ConvertError::InvalidRequest(
            "no target format specified".to_string(),
        ));
    }

    if let Some(profile) = lookup(&name) {
        return Ok(profile);
    }

    let valid = name.len() <= MAX_CUSTOM_EXTENSION_LEN && name.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(ConvertError::InvalidRequest(format!(
            "invalid target format '{}': custom formats must be alphanumeric and at most {} characters",
            token.trim(),
            MAX_CUSTOM_EXTENSION_LEN
        )));
    }

    Ok(FormatProfile::custom(&name))
}

/// Registry entries keyed by name, for the formats listing endpoint.
pub fn registered_formats() -> Vec<(&'static str, FormatProfile)> {
    REGISTERED_FORMATS
        .iter()
        .filter_map(|name| lookup(name).map(|p| (*name, p)))
        .collect()
}
