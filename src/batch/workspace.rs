use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::errors::AudioResult;
use crate::utils::remove_dir_best_effort;

pub const BATCH_PREFIX: &str = "batch_";
const SUFFIX_LEN: usize = 6;

/// Directories owned by one conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: String,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// `batch_<YYYYmmddHHMMSS>_<suffix>`. The random suffix keeps two batches
/// started in the same second apart.
pub fn new_batch_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}_{}", BATCH_PREFIX, Local::now().format("%Y%m%d%H%M%S"), suffix)
}

/// Scoped owner of a [`Batch`]. The upload directory is removed when the
/// workspace is dropped, whatever path the request took to get there.
#[derive(Debug)]
pub struct BatchWorkspace {
    batch: Batch,
    uploads_discarded: bool,
}

impl BatchWorkspace {
    /// Allocate a fresh batch under the given roots.
    pub fn create(upload_root: &Path, output_root: &Path) -> AudioResult<Self> {
        Self::create_with_id(new_batch_id(), upload_root, output_root)
    }

    /// Allocate (or reopen) a batch with a known id. Directory creation is
    /// idempotent.
    pub fn create_with_id(id: String, upload_root: &Path, output_root: &Path) -> AudioResult<Self> {
        let batch = Batch {
            upload_dir: upload_root.join(&id),
            output_dir: output_root.join(&id),
            id,
        };
        std::fs::create_dir_all(&batch.upload_dir)?;
        // Don't leave an orphan upload dir behind if the second mkdir fails.
        let workspace = Self {
            batch,
            uploads_discarded: false,
        };
        std::fs::create_dir_all(&workspace.batch.output_dir)?;

        debug!("Allocated batch {}", workspace.batch.id);
        Ok(workspace)
    }

    pub fn id(&self) -> &str {
        &self.batch.id
    }

    pub fn upload_dir(&self) -> &Path {
        &self.batch.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.batch.output_dir
    }

    /// Remove the upload tree now. Safe to call more than once.
    pub fn discard_uploads(&mut self) {
        if !self.uploads_discarded {
            remove_dir_best_effort(&self.batch.upload_dir);
            self.uploads_discarded = true;
        }
    }

    /// Remove the output tree. Only used when nothing was converted.
    pub fn discard_outputs(&self) {
        info!("Discarding empty batch output {}", self.batch.id);
        remove_dir_best_effort(&self.batch.output_dir);
    }
}

impl Drop for BatchWorkspace {
    fn drop(&mut self) {
        self.discard_uploads();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn batch_ids_are_prefixed_and_distinct() {
        let a = new_batch_id();
        let b = new_batch_id();
        assert!(a.starts_with(BATCH_PREFIX));
        // batch_ + 14 digit timestamp + _ + suffix
        assert_eq!(a.len(), BATCH_PREFIX.len() + 14 + 1 + SUFFIX_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn creates_both_directories() {
        let root = TempDir::new().unwrap();
        let ws = BatchWorkspace::create(&root.path().join("up"), &root.path().join("out")).unwrap();
        assert!(ws.upload_dir().is_dir());
        assert!(ws.output_dir().is_dir());
    }

    #[test]
    fn creation_is_idempotent_on_existing_directories() {
        let root = TempDir::new().unwrap();
        let up = root.path().join("up");
        let out = root.path().join("out");
        let first = BatchWorkspace::create_with_id("batch_1".into(), &up, &out).unwrap();
        let second = BatchWorkspace::create_with_id("batch_1".into(), &up, &out);
        assert!(second.is_ok());
        drop(first);
    }

    #[test]
    fn drop_removes_uploads_but_keeps_outputs() {
        let root = TempDir::new().unwrap();
        let ws = BatchWorkspace::create(&root.path().join("up"), &root.path().join("out")).unwrap();
        let upload_dir = ws.upload_dir().to_path_buf();
        let output_dir = ws.output_dir().to_path_buf();
        std::fs::write(upload_dir.join("a.wav"), b"x").unwrap();

        drop(ws);

        assert!(!upload_dir.exists());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn discard_outputs_removes_tree() {
        let root = TempDir::new().unwrap();
        let ws = BatchWorkspace::create(&root.path().join("up"), &root.path().join("out")).unwrap();
        std::fs::write(ws.output_dir().join("a.mp3"), b"x").unwrap();
        ws.discard_outputs();
        assert!(!ws.output_dir().exists());
    }

    #[test]
    fn discard_tolerates_missing_directories() {
        let root = TempDir::new().unwrap();
        let mut ws = BatchWorkspace::create(&root.path().join("up"), &root.path().join("out")).unwrap();
        std::fs::remove_dir_all(ws.upload_dir()).unwrap();
        ws.discard_uploads();
        ws.discard_uploads();
    }
}
