use std::path::{Path, PathBuf};

use log::warn;

use crate::errors::{AudioResult, ConvertError};
use crate::utils::sanitize_filename;

/// Read-side lookup of finished batch outputs.
///
/// Every path handed out is a regular file whose canonical location lies
/// inside the canonical batch directory. Misses and escapes both come back
/// as the same [`ConvertError::NotFound`].
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn resolve_file(&self, batch_id: &str, filename: &str) -> AudioResult<PathBuf> {
        let batch_id = sanitize_filename(batch_id);
        let filename = sanitize_filename(filename);
        if batch_id.is_empty() || filename.is_empty() {
            return Err(ConvertError::not_found());
        }
        self.confined(&batch_id, &filename)
    }

    pub fn resolve_zip(&self, batch_id: &str) -> AudioResult<PathBuf> {
        let batch_id = sanitize_filename(batch_id);
        if batch_id.is_empty() {
            return Err(ConvertError::not_found());
        }
        let zip_name = format!("{}.zip", batch_id);
        self.confined(&batch_id, &zip_name)
    }

    fn confined(&self, batch_id: &str, filename: &str) -> AudioResult<PathBuf> {
        let batch_dir = self.output_root.join(batch_id);
        let candidate = batch_dir.join(filename);

        let (Ok(batch_dir), Ok(candidate)) = (batch_dir.canonicalize(), candidate.canonicalize()) else {
            return Err(ConvertError::not_found());
        };

        if !is_within(&candidate, &batch_dir) {
            warn!("Refusing {:?}: resolves outside {:?}", candidate, batch_dir);
            return Err(ConvertError::not_found());
        }
        if !candidate.is_file() {
            return Err(ConvertError::not_found());
        }
        Ok(candidate)
    }
}

fn is_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}
