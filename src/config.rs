//! Service configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration passed explicitly into the pipeline and the
/// artifact store. Nothing reads these values from globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:8081"`).
    pub bind_address: String,

    /// Root for transient per-batch upload directories.
    pub upload_root: PathBuf,

    /// Root for per-batch output directories. Outputs are never purged by
    /// the service itself.
    pub output_root: PathBuf,

    /// Encoder binary, resolved through `PATH` when not absolute.
    pub ffmpeg_path: PathBuf,

    /// Format used when the request carries no `format` field.
    pub default_format: String,

    /// Record a warning for uploads whose filename sanitizes to nothing
    /// instead of skipping them silently.
    pub warn_on_unnamed_uploads: bool,

    /// Per-file upload limit in bytes.
    pub max_file_bytes: usize,

    /// `env_logger` filter string, e.g. `"info"` or `"debug,actix_web=warn"`.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8081".to_owned(),
            upload_root: PathBuf::from("uploads"),
            output_root: PathBuf::from("outputs"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            default_format: "wav".to_owned(),
            warn_on_unnamed_uploads: false,
            max_file_bytes: 512 * 1024 * 1024,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("CONVERT_BIND", &defaults.bind_address),
            upload_root: PathBuf::from(env_or("CONVERT_UPLOAD_DIR", "uploads")),
            output_root: PathBuf::from(env_or("CONVERT_OUTPUT_DIR", "outputs")),
            ffmpeg_path: PathBuf::from(env_or("CONVERT_FFMPEG", "ffmpeg")),
            default_format: env_or("CONVERT_DEFAULT_FORMAT", &defaults.default_format),
            warn_on_unnamed_uploads: env_flag("CONVERT_WARN_UNNAMED", false),
            max_file_bytes: parse_env("CONVERT_MAX_FILE_MB", 512usize).saturating_mul(1024 * 1024),
            log_level: env_or("CONVERT_LOG", &defaults.log_level),
        }
    }

    /// Same configuration rooted somewhere else; used by tests and tooling.
    pub fn with_roots(upload_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            output_root: output_root.into(),
            ..Self::default()
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
