use serde::Serialize;

use crate::formats::FormatProfile;

pub mod v1;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct FormatInfo {
    pub name: String,
    pub extension: String,
    pub codec: Option<String>,
}

impl FormatInfo {
    pub fn from_profile(name: &str, profile: &FormatProfile) -> Self {
        Self {
            name: name.to_string(),
            extension: profile.extension.clone(),
            codec: profile.codec.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub formats: Vec<FormatInfo>,
    /// Unregistered names are accepted as a bare extension up to this length.
    pub custom_max_length: usize,
}
