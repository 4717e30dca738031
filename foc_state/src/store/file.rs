//! File-backed store.
//!
//! The whole address space is one image file. Writes patch a copy of the
//! image, write it to a sibling temp file and rename it over the original,
//! so a crash mid-write leaves either the old or the new image.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use foc_common::consts::ERASED_BYTE;
use tracing::debug;

use super::{NvStore, check_range};
use crate::error::StoreResult;

/// Store persisted in a single image file.
///
/// A missing or short file reads as erased (`0xFF`).
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    capacity: usize,
}

impl FileStore {
    /// Store of `capacity` bytes at `path`. The file is created on first write.
    pub fn new<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity,
        }
    }

    /// Path of the image file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file: the image file name with `.tmp` appended, so it
    /// never coincides with the image itself.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_image(&self) -> StoreResult<Vec<u8>> {
        let mut image = Vec::with_capacity(self.capacity);
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut image)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Store image {:?} does not exist, reading as erased", self.path);
            }
            Err(e) => return Err(e.into()),
        }
        image.resize(self.capacity, ERASED_BYTE);
        Ok(image)
    }

    fn write_image(&self, image: &[u8]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(image)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl NvStore for FileStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()> {
        check_range(offset, buf.len(), self.capacity)?;
        let image = self.read_image()?;
        buf.copy_from_slice(&image[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()> {
        check_range(offset, data.len(), self.capacity)?;
        let mut image = self.read_image()?;
        image[offset..offset + data.len()].copy_from_slice(data);
        self.write_image(&image)?;
        debug!("Wrote {} bytes at offset {} to {:?}", data.len(), offset, self.path);
        Ok(())
    }
}
