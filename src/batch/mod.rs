//! Batch conversion: one request's uploads in, converted files (and an
//! optional zip) out.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::errors::{AudioResult, ConvertError};
use crate::formats::{self, FormatProfile};
use crate::processors::AudioEncoder;
use crate::utils::{create_zip_from_files, remove_file_best_effort};

pub mod artifacts;
pub mod converter;
pub mod workspace;

pub use artifacts::ArtifactStore;
pub use converter::{ConversionOutcome, FileConverter};
pub use workspace::{Batch, BatchWorkspace};

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Everything a single `/convert` call asks for.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub files: Vec<UploadedFile>,
    /// `None` selects the configured default format.
    pub format: Option<String>,
    pub bundle_zip: bool,
    pub individual_links: bool,
}

/// Metadata for one successfully produced output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub original_name: String,
    pub converted_name: String,
    pub path: PathBuf,
    pub size: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub original_name: String,
    pub converted_name: String,
    pub size: String,
    pub size_bytes: u64,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZipDescriptor {
    pub filename: String,
    pub download_url: String,
}

/// Response for a batch that produced at least one file.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub batch_id: String,
    pub extension: String,
    pub message: String,
    pub files: Vec<FileDescriptor>,
    pub zip: Option<ZipDescriptor>,
    pub warnings: Vec<String>,
}

pub fn file_download_url(batch_id: &str, filename: &str) -> String {
    format!("/download/batch/{}/{}", batch_id, filename)
}

pub fn zip_download_url(batch_id: &str) -> String {
    format!("/download/batch/{}/zip", batch_id)
}

pub fn summary_message(count: usize, extension: &str) -> String {
    let noun = if count == 1 { "file" } else { "files" };
    format!("Converted {} {} to .{}.", count, noun, extension)
}

/// Runs batches against a fixed pair of storage roots and one encoder.
pub struct BatchPipeline {
    encoder: Arc<dyn AudioEncoder>,
    upload_root: PathBuf,
    output_root: PathBuf,
    default_format: String,
    warn_on_unnamed: bool,
}

impl BatchPipeline {
    pub fn new(config: &Config, encoder: Arc<dyn AudioEncoder>) -> Self {
        Self {
            encoder,
            upload_root: config.upload_root.clone(),
            output_root: config.output_root.clone(),
            default_format: config.default_format.clone(),
            warn_on_unnamed: config.warn_on_unnamed_uploads,
        }
    }

    /// Convert every upload in order, then assemble the response.
    ///
    /// Fails only for request-level problems (no files, bad format) or when
    /// not a single file could be converted; in the latter case the batch's
    /// output directory is removed.
    pub fn convert(&self, request: ConversionRequest) -> AudioResult<BatchResult> {
        if request.files.is_empty() {
            return Err(ConvertError::InvalidRequest("no files supplied".to_string()));
        }
        let token = request.format.as_deref().unwrap_or(&self.default_format);
        let profile = formats::resolve(token)?;

        let workspace = BatchWorkspace::create(&self.upload_root, &self.output_root)?;
        self.run(workspace, profile, request)
    }

    /// Convert into an already allocated workspace and assemble the response.
    fn run(
        &self,
        mut workspace: BatchWorkspace,
        profile: FormatProfile,
        request: ConversionRequest,
    ) -> AudioResult<BatchResult> {
        info!(
            "Batch {}: converting {} upload(s) to .{}",
            workspace.id(),
            request.files.len(),
            profile.extension
        );

        let converter = FileConverter::new(self.encoder.as_ref(), self.warn_on_unnamed);
        let ConversionOutcome {
            converted,
            mut warnings,
        } = converter.convert_all(&request.files, &workspace, &profile);
        workspace.discard_uploads();

        if converted.is_empty() {
            workspace.discard_outputs();
            info!("Batch {}: nothing converted", workspace.id());
            return Err(ConvertError::NoValidOutput {
                message: "No files could be converted.".to_string(),
                warnings,
            });
        }

        let batch_id = workspace.id().to_string();

        let zip = if request.bundle_zip {
            let zip_name = format!("{}.zip", batch_id);
            let zip_path = workspace.output_dir().join(&zip_name);
            match create_zip_from_files(&converted, &zip_path) {
                Ok(()) => Some(ZipDescriptor {
                    filename: zip_name,
                    download_url: zip_download_url(&batch_id),
                }),
                Err(e) => {
                    warn!("Batch {}: failed to build zip: {}", batch_id, e);
                    remove_file_best_effort(&zip_path);
                    warnings.push(format!("Could not create zip archive: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let files = if request.individual_links {
            converted
                .iter()
                .map(|c| FileDescriptor {
                    original_name: c.original_name.clone(),
                    converted_name: c.converted_name.clone(),
                    size: c.size.clone(),
                    size_bytes: c.size_bytes,
                    download_url: file_download_url(&batch_id, &c.converted_name),
                })
                .collect()
        } else {
            Vec::new()
        };

        let message = summary_message(converted.len(), &profile.extension);
        info!("Batch {}: {} ({} warning(s))", batch_id, message, warnings.len());

        Ok(BatchResult {
            success: true,
            batch_id,
            extension: profile.extension,
            message,
            files,
            zip,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::EncodeFailure;
    use std::io::Read;
    use std::path::Path;
    use tempfile::TempDir;

    struct CopyEncoder;

    impl AudioEncoder for CopyEncoder {
        fn encode(&self, input: &Path, output: &Path, _profile: &FormatProfile) -> Result<(), EncodeFailure> {
            if input.file_name().map_or(false, |n| n.to_string_lossy().contains("broken")) {
                return Err(EncodeFailure::with_diagnostic("moov atom not found"));
            }
            std::fs::copy(input, output)
                .map(|_| ())
                .map_err(|e| EncodeFailure::with_diagnostic(e.to_string()))
        }

        fn encoder_type(&self) -> &'static str {
            "copy"
        }
    }

    fn pipeline(root: &TempDir) -> BatchPipeline {
        let config = Config::with_roots(root.path().join("uploads"), root.path().join("outputs"));
        BatchPipeline::new(&config, Arc::new(CopyEncoder))
    }

    fn audio(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: Some(name.to_string()),
            content_type: Some("audio/mpeg".to_string()),
            bytes: bytes.to_vec(),
        }
    }

    fn text(name: &str) -> UploadedFile {
        UploadedFile {
            filename: Some(name.to_string()),
            content_type: Some("text/plain".to_string()),
            bytes: b"not audio".to_vec(),
        }
    }

    fn batch_dirs(root: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn one_failure_out_of_three() {
        let root = TempDir::new().unwrap();
        let result = pipeline(&root)
            .convert(ConversionRequest {
                files: vec![audio("a.mp3", b"a"), audio("broken.mp3", b"b"), audio("c.mp3", b"c")],
                format: Some("flac".into()),
                bundle_zip: false,
                individual_links: true,
            })
            .unwrap();

        assert!(result.success);
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("Conversion failed for broken.mp3"));
        assert_eq!(result.message, "Converted 2 files to .flac.");
        assert_eq!(result.extension, "flac");
        assert!(result.zip.is_none());
    }

    #[test]
    fn descriptors_point_at_download_routes() {
        let root = TempDir::new().unwrap();
        let result = pipeline(&root)
            .convert(ConversionRequest {
                files: vec![audio("Song One.mp3", b"abc")],
                format: None,
                bundle_zip: true,
                individual_links: true,
            })
            .unwrap();

        assert_eq!(result.message, "Converted 1 file to .wav.");
        let file = &result.files[0];
        assert_eq!(file.original_name, "Song One.mp3");
        assert_eq!(file.converted_name, "Song_One.wav");
        assert_eq!(file.size, "3 bytes");
        assert_eq!(
            file.download_url,
            format!("/download/batch/{}/Song_One.wav", result.batch_id)
        );
        let zip = result.zip.unwrap();
        assert_eq!(zip.filename, format!("{}.zip", result.batch_id));
        assert_eq!(zip.download_url, format!("/download/batch/{}/zip", result.batch_id));
    }

    #[test]
    fn links_are_optional_but_files_stay_on_disk() {
        let root = TempDir::new().unwrap();
        let result = pipeline(&root)
            .convert(ConversionRequest {
                files: vec![audio("a.mp3", b"a")],
                format: Some("mp3".into()),
                bundle_zip: false,
                individual_links: false,
            })
            .unwrap();

        assert!(result.files.is_empty());
        assert!(root
            .path()
            .join("outputs")
            .join(&result.batch_id)
            .join("a.mp3")
            .is_file());
    }

    #[test]
    fn zip_holds_exactly_the_converted_files() {
        let root = TempDir::new().unwrap();
        let result = pipeline(&root)
            .convert(ConversionRequest {
                files: vec![
                    audio("x.wav", b"xx"),
                    text("readme.txt"),
                    audio("broken.wav", b"b"),
                    audio("y.wav", b"yyy"),
                ],
                format: Some("mp3".into()),
                bundle_zip: true,
                individual_links: false,
            })
            .unwrap();

        let zip_path = root
            .path()
            .join("outputs")
            .join(&result.batch_id)
            .join(format!("{}.zip", result.batch_id));
        let mut archive = zip::ZipArchive::new(std::fs::File::open(zip_path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["x.mp3", "y.mp3"]);

        let mut contents = Vec::new();
        archive.by_name("y.mp3").unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"yyy");
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn zip_failure_is_only_a_warning() {
        let root = TempDir::new().unwrap();
        let p = pipeline(&root);
        let uploads = root.path().join("uploads");
        let outputs = root.path().join("outputs");
        let workspace = BatchWorkspace::create_with_id("batch_zipfail".into(), &uploads, &outputs).unwrap();
        // A directory squatting on the archive path makes the zip write fail.
        std::fs::create_dir_all(outputs.join("batch_zipfail").join("batch_zipfail.zip")).unwrap();

        let result = p
            .run(
                workspace,
                formats::resolve("mp3").unwrap(),
                ConversionRequest {
                    files: vec![audio("a.wav", b"a")],
                    format: Some("mp3".into()),
                    bundle_zip: true,
                    individual_links: true,
                },
            )
            .unwrap();

        assert!(result.success);
        assert!(result.zip.is_none());
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("Could not create zip archive"));
        assert!(outputs.join("batch_zipfail").join("a.mp3").is_file());
    }

    #[test]
    fn nothing_converted_removes_output_dir() {
        let root = TempDir::new().unwrap();
        let err = pipeline(&root)
            .convert(ConversionRequest {
                files: vec![text("a.txt"), text("b.pdf")],
                format: Some("mp3".into()),
                bundle_zip: true,
                individual_links: true,
            })
            .unwrap_err();

        match err {
            ConvertError::NoValidOutput { warnings, .. } => assert_eq!(warnings.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(batch_dirs(&root.path().join("outputs")).is_empty());
        assert!(batch_dirs(&root.path().join("uploads")).is_empty());
    }

    #[test]
    fn uploads_are_discarded_after_success() {
        let root = TempDir::new().unwrap();
        let result = pipeline(&root)
            .convert(ConversionRequest {
                files: vec![audio("a.mp3", b"a")],
                format: Some("wav".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(!root.path().join("uploads").join(&result.batch_id).exists());
    }

    #[test]
    fn request_level_validation_creates_no_workspace() {
        let root = TempDir::new().unwrap();
        let p = pipeline(&root);

        let no_files = p.convert(ConversionRequest {
            format: Some("mp3".into()),
            ..Default::default()
        });
        assert!(matches!(no_files, Err(ConvertError::InvalidRequest(_))));

        let bad_format = p.convert(ConversionRequest {
            files: vec![audio("a.mp3", b"a")],
            format: Some("way-too-long-ext".into()),
            ..Default::default()
        });
        assert!(matches!(bad_format, Err(ConvertError::InvalidRequest(_))));

        let empty_format = p.convert(ConversionRequest {
            files: vec![audio("a.mp3", b"a")],
            format: Some("  ".into()),
            ..Default::default()
        });
        assert!(matches!(empty_format, Err(ConvertError::InvalidRequest(_))));

        assert!(batch_dirs(&root.path().join("outputs")).is_empty());
    }

    #[test]
    fn summary_pluralizes() {
        assert_eq!(summary_message(1, "mp3"), "Converted 1 file to .mp3.");
        assert_eq!(summary_message(0, "mp3"), "Converted 0 files to .mp3.");
        assert_eq!(summary_message(3, "ogg"), "Converted 3 files to .ogg.");
    }
}
