//! The backing store: one contiguous byte array of `BLOCK_COUNT` blocks,
//! and the two whole-image operations that cross the host boundary.

use std::fs;
use std::path::Path;

use log::warn;

use crate::error::{FsError, FsResult};
use crate::layout::{BLOCK_COUNT, BLOCK_SIZE};

/// The byte-addressable virtual disk. Reads/writes outside `[0, BLOCK_COUNT)`
/// fail the operation, not the process: reads return zeros, writes are
/// silently dropped, so a corrupted layout can never walk off the array.
pub struct Image {
    blocks: Vec<u8>,
}

impl Image {
    pub fn new_zeroed() -> Self {
        Self {
            blocks: vec![0u8; BLOCK_SIZE * BLOCK_COUNT as usize],
        }
    }

    pub fn read_block(&self, n: u32, buf: &mut [u8; BLOCK_SIZE]) {
        if n >= BLOCK_COUNT {
            warn!("read_block: block {n} out of range, returning zeros");
            buf.fill(0);
            return;
        }
        let start = n as usize * BLOCK_SIZE;
        buf.copy_from_slice(&self.blocks[start..start + BLOCK_SIZE]);
    }

    pub fn write_block(&mut self, n: u32, buf: &[u8; BLOCK_SIZE]) {
        if n >= BLOCK_COUNT {
            warn!("write_block: block {n} out of range, write ignored");
            return;
        }
        let start = n as usize * BLOCK_SIZE;
        self.blocks[start..start + BLOCK_SIZE].copy_from_slice(buf);
    }

    /// Writes the whole image to `path`, first renaming any existing file
    /// at `path` to `<path>.bak`.
    pub fn save(&self, path: &Path) -> FsResult<()> {
        if path.exists() {
            let backup = backup_path(path);
            fs::rename(path, &backup)?;
        }
        fs::write(path, &self.blocks)?;
        Ok(())
    }

    /// Reads a whole image back from `path`. Rejects a file whose size
    /// isn't exactly `BLOCK_SIZE * BLOCK_COUNT` as corrupt.
    pub fn load(path: &Path) -> FsResult<Self> {
        let bytes = fs::read(path).map_err(FsError::HostIo)?;
        let expected = BLOCK_SIZE * BLOCK_COUNT as usize;
        if bytes.len() != expected {
            return Err(FsError::CorruptImage(format!(
                "image size {} != expected {expected}",
                bytes.len()
            )));
        }
        Ok(Self { blocks: bytes })
    }
}

fn backup_path(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".bak");
    std::path::PathBuf::from(s)
}
