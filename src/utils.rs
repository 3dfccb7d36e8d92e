use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use zip::{write::FileOptions, ZipWriter};

use crate::batch::ConvertedFile;

/// Bundle converted files into a flat zip, each entry named after its
/// converted filename.
pub fn create_zip_from_files(files: &[ConvertedFile], zip_path: &Path) -> std::io::Result<()> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options: FileOptions<'_, ()> = FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for converted in files {
        zip.start_file(converted.converted_name.as_str(), options)?;
        let contents = std::fs::read(&converted.path)?;
        zip.write_all(&contents)?;
    }

    zip.finish()?;
    info!("Wrote zip {:?} with {} entries", zip_path, files.len());
    Ok(())
}

/// Remove a directory tree, logging instead of failing.
pub fn remove_dir_best_effort(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove directory {:?}: {}", dir, e),
    }
}

/// Remove a single file, logging instead of failing.
pub fn remove_file_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove file {:?}: {}", path, e),
    }
}

/// Human-readable size: whole bytes below 1 KiB, otherwise two decimals in
/// the first unit that brings the value under 1024.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut value = bytes as f64;
    for unit in ["KB", "MB", "GB", "TB"] {
        value /= 1024.0;
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
    }
    format!("{:.2} TB", value)
}

/// Reduce a client-supplied name to a flat, filesystem-safe filename.
///
/// Path separators become whitespace, whitespace runs collapse to `_`,
/// anything outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`
/// and `_` are stripped. The result never contains a separator and is never
/// `.` or `..`; it may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lower-cased extension of a filename's last component, without the dot.
/// A bare `.flac` counts as having the extension `flac`.
pub fn extension_of(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match last.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

/// Filename without its final extension.
pub fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_boundaries() {
        assert_eq!(human_size(0), "0 bytes");
        assert_eq!(human_size(1023), "1023 bytes");
        assert_eq!(human_size(1024), "1.00 KB");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(1_048_576), "1.00 MB");
        assert_eq!(human_size(1024u64.pow(3)), "1.00 GB");
    }

    #[test]
    fn human_size_saturates_at_terabytes() {
        assert_eq!(human_size(1024u64.pow(5)), "1024.00 TB");
    }

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename(".."), "");
    }

    #[test]
    fn sanitize_keeps_ordinary_names() {
        assert_eq!(sanitize_filename("My Song (live).mp3"), "My_Song_live.mp3");
        assert_eq!(sanitize_filename("track-01.flac"), "track-01.flac");
        assert_eq!(sanitize_filename(".hidden.wav"), "hidden.wav");
    }

    #[test]
    fn sanitize_can_yield_empty() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("   "), "");
        assert_eq!(sanitize_filename("日本"), "");
    }

    #[test]
    fn remove_file_tolerates_missing_and_removes_present() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("partial.zip");
        remove_file_best_effort(&path);
        std::fs::write(&path, b"x").unwrap();
        remove_file_best_effort(&path);
        assert!(!path.exists());
    }

    #[test]
    fn stem_and_extension() {
        assert_eq!(stem_of("song.final.wav"), "song.final");
        assert_eq!(stem_of("noext"), "noext");
        assert_eq!(extension_of("Track.FLAC").as_deref(), Some("flac"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".flac").as_deref(), Some("flac"));
        assert_eq!(extension_of("dir.d/noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}
