//! Source file loading with memory mapping for large inputs.

// Memory mapping requires unsafe
#![allow(unsafe_code)]

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Files at or above this size are memory mapped (1MB).
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Largest source file accepted for segmentation (64MB).
const MAX_SOURCE_SIZE: u64 = 64 * 1024 * 1024;

/// A source file opened for segmentation.
///
/// # Examples
///
/// ```no_run
/// use codesplit::io::SourceFile;
///
/// let source = SourceFile::open("src/main.rs").unwrap();
/// let content = source.read_to_string().unwrap();
/// ```
pub struct SourceFile {
    file: File,
    size: u64,
    path: String,
}

impl SourceFile {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be opened, or
    /// exceeds the maximum source size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        if !path_ref.exists() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let file = File::open(path_ref).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let size = file
            .metadata()
            .map_err(|e| IoError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?
            .len();

        if size > MAX_SOURCE_SIZE {
            return Err(IoError::ReadFailed {
                path: path_str,
                reason: format!("file too large: {size} bytes (max: {MAX_SOURCE_SIZE} bytes)"),
            }
            .into());
        }

        Ok(Self {
            file,
            size,
            path: path_str,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the whole file as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the content is not valid UTF-8.
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = if self.size >= MMAP_THRESHOLD {
            self.read_mmap()?
        } else {
            self.read_direct()?
        };

        String::from_utf8(bytes).map_err(|e| {
            IoError::ReadFailed {
                path: self.path.clone(),
                reason: format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to()),
            }
            .into()
        })
    }

    fn read_mmap(&self) -> Result<Vec<u8>> {
        // Safety: the map is read-only and dropped before returning
        let mmap = unsafe {
            Mmap::map(&self.file).map_err(|e| IoError::MmapFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
        };
        Ok(mmap.to_vec())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_direct(&self) -> Result<Vec<u8>> {
        let mut file = &self.file;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)
            .map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(buffer)
    }
}

/// Reads a source file to a string.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String> {
    SourceFile::open(path)?.read_to_string()
}
