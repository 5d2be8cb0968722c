use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Prefix for in-progress download files, visible in `ls -a` so operators
/// can recognize and reclaim abandoned transfers.
const TEMP_PREFIX: &str = ".stratoDownload";

/// A destination file staged under a temporary name.
///
/// Created pre-allocated to the final size, renamed into place on
/// [`commit`](StagedFile::commit), removed on drop otherwise.
pub struct StagedFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Stage a destination file of `size` bytes.
    ///
    /// The on-disk name is `<dir>/.stratoDownload-<job_id>-<basename>` where
    /// `<dir>` and `<basename>` come from `final_path`. The file is created
    /// (truncating any leftover from a previous run) and extended to `size`
    /// so sequential writes never grow the file.
    pub fn create(final_path: &Path, job_id: &str, size: u64) -> Result<Self> {
        let dir = final_path
            .parent()
            .ok_or_else(|| Error::NoParent(final_path.to_path_buf()))?;
        let basename = final_path
            .file_name()
            .ok_or_else(|| Error::NoFileName(final_path.to_path_buf()))?;

        let temp_path = dir.join(format!(
            "{TEMP_PREFIX}-{job_id}-{}",
            basename.to_string_lossy()
        ));

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::Create {
                path: temp_path.clone(),
                source: e,
            })?;
        file.set_len(size).map_err(|e| Error::Allocate {
            path: temp_path.clone(),
            size,
            source: e,
        })?;

        Ok(Self {
            temp_path,
            final_path: final_path.to_path_buf(),
            committed: false,
        })
    }

    /// Open a write handle to the staged file.
    pub fn open(&self) -> Result<File> {
        OpenOptions::new()
            .write(true)
            .open(&self.temp_path)
            .map_err(|e| Error::Open {
                path: self.temp_path.clone(),
                source: e,
            })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Atomically rename the temp file onto the destination path.
    pub fn commit(mut self) -> Result<PathBuf> {
        std::fs::rename(&self.temp_path, &self.final_path).map_err(|e| Error::Commit {
            path: self.final_path.clone(),
            source: e,
        })?;
        self.committed = true;
        Ok(self.final_path.clone())
    }

    /// Remove the temp file without committing. Equivalent to dropping,
    /// but lets callers express the intent explicitly.
    pub fn discard(self) {}
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
