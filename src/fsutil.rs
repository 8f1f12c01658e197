//! Filesystem helpers

use crate::Result;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Suffix naming the input dataset of a model layer
pub const INPUT_DATASET_SUFFIX: &str = "_input";
/// Suffix naming the output dataset of a model layer
pub const OUTPUT_DATASET_SUFFIX: &str = "_output";
/// Extension of container files
pub const CONTAINER_FILE_EXTENSION: &str = ".parquet";

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// True if anything exists at `path`
#[must_use]
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

/// True iff `path` is a regular file
#[must_use]
pub fn is_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// True iff `path` is a directory
#[must_use]
pub fn is_directory<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_dir()
}

/// True iff `path` is a file starting with the Parquet magic bytes.
///
/// Unreadable paths are reported as `false`.
#[must_use]
pub fn is_container_file<P: AsRef<Path>>(path: P) -> bool {
    let mut magic = [0u8; 4];
    File::open(path.as_ref())
        .and_then(|mut file| file.read_exact(&mut magic))
        .is_ok()
        && &magic == PARQUET_MAGIC
}

/// All files (not directories) under `dir`, sorted.
///
/// Without `recursive` only the first level is listed.
///
/// # Errors
/// Returns [`crate::Error::Io`] if `dir` or a subdirectory cannot be read.
pub fn list_files<P: AsRef<Path>>(dir: P, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.as_ref().to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
