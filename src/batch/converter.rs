use std::collections::HashSet;
use std::path::Path;

use log::{debug, info, warn};

use super::workspace::BatchWorkspace;
use super::{ConvertedFile, UploadedFile};
use crate::formats::FormatProfile;
use crate::processors::AudioEncoder;
use crate::utils::{extension_of, human_size, remove_file_best_effort, sanitize_filename, stem_of};

/// Extensions treated as audio when the declared media type says otherwise.
pub const AUDIO_EXTENSIONS: [&str; 18] = [
    "mp3", "wav", "flac", "aac", "ogg", "oga", "m4a", "wma", "aiff", "aif", "opus", "alac", "ape", "amr",
    "wv", "mka", "caf", "webm",
];

/// Audio-like if the media type is `audio/*` or the extension is a known
/// audio extension.
pub fn is_audio_upload(filename: &str, content_type: Option<&str>) -> bool {
    let declared_audio = content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("audio/"))
        .unwrap_or(false);
    declared_audio
        || extension_of(filename)
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
}

/// Hands out unique filenames inside one directory.
#[derive(Debug, Default)]
struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    fn claim(&mut self, stem: &str, extension: Option<&str>) -> String {
        let compose = |n: usize| {
            let stem = if n == 0 { stem.to_string() } else { format!("{}-{}", stem, n) };
            match extension {
                Some(ext) => format!("{}.{}", stem, ext),
                None => stem,
            }
        };
        let mut n = 0;
        let mut name = compose(n);
        while self.taken.contains(&name) {
            n += 1;
            name = compose(n);
        }
        self.taken.insert(name.clone());
        name
    }

    fn release(&mut self, name: &str) {
        self.taken.remove(name);
    }
}

/// Per-item results of a batch.
#[derive(Debug, Default)]
pub struct ConversionOutcome {
    pub converted: Vec<ConvertedFile>,
    pub warnings: Vec<String>,
}

/// Converts uploads one at a time. Nothing that goes wrong with a single
/// item stops the batch; it becomes a warning instead.
pub struct FileConverter<'a> {
    encoder: &'a dyn AudioEncoder,
    warn_on_unnamed: bool,
}

impl<'a> FileConverter<'a> {
    pub fn new(encoder: &'a dyn AudioEncoder, warn_on_unnamed: bool) -> Self {
        Self {
            encoder,
            warn_on_unnamed,
        }
    }

    pub fn convert_all(
        &self,
        uploads: &[UploadedFile],
        workspace: &BatchWorkspace,
        profile: &FormatProfile,
    ) -> ConversionOutcome {
        let mut outcome = ConversionOutcome::default();
        let mut upload_names = NameAllocator::default();
        let mut output_names = NameAllocator::default();

        for upload in uploads {
            let original = upload.filename.as_deref().unwrap_or("");
            let sanitized = sanitize_filename(original);
            if sanitized.is_empty() {
                if self.warn_on_unnamed {
                    outcome
                        .warnings
                        .push("Skipped an upload without a usable filename".to_string());
                } else {
                    debug!("Skipping unnamed upload in batch {}", workspace.id());
                }
                continue;
            }

            // Sanitizing drops a leading dot, so `.flac` must be judged by its
            // original name.
            let content_type = upload.content_type.as_deref();
            if !is_audio_upload(&sanitized, content_type) && !is_audio_upload(original, content_type) {
                warn!("Skipping {}: unsupported audio type", original);
                outcome
                    .warnings
                    .push(format!("Skipped {}: unsupported audio type", original));
                continue;
            }

            let extension = extension_of(&sanitized);
            let input_name = upload_names.claim(stem_of(&sanitized), extension.as_deref());
            let input_path = workspace.upload_dir().join(&input_name);
            if let Err(e) = std::fs::write(&input_path, &upload.bytes) {
                warn!("Failed to store upload {:?}: {}", input_path, e);
                outcome
                    .warnings
                    .push(format!("Could not store {}: {}", original, e));
                continue;
            }

            let output_name = output_names.claim(stem_of(&sanitized), Some(&profile.extension));
            let output_path = workspace.output_dir().join(&output_name);

            match self.encoder.encode(&input_path, &output_path, profile) {
                Ok(()) => {
                    let size_bytes = file_size(&output_path);
                    info!(
                        "Converted {} -> {} ({}) with {}",
                        original,
                        output_name,
                        human_size(size_bytes),
                        self.encoder.encoder_type()
                    );
                    outcome.converted.push(ConvertedFile {
                        original_name: original.to_string(),
                        converted_name: output_name,
                        path: output_path,
                        size: human_size(size_bytes),
                        size_bytes,
                    });
                }
                Err(failure) => {
                    warn!("Conversion failed for {}: {}", original, failure);
                    remove_file_best_effort(&output_path);
                    output_names.release(&output_name);
                    outcome
                        .warnings
                        .push(format!("Conversion failed for {}: {}", original, failure));
                }
            }
        }

        outcome
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
