//! Directory entries and the directory-maintenance operations built on
//! top of them: `lookup_in_dir`, `mkdir`, `create`, `rmdir`, `unlink`,
//! `list`. A directory's data lives entirely in `addrs[0]`; only
//! single-block directories are supported.

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::inode::InodeType;
use crate::layout::{BLOCK_SIZE, DIRSIZ};

pub const DIRENT_SIZE: usize = 4 + DIRSIZ;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawDirEntry {
    inum: u32,
    name: [u8; DIRSIZ],
}

/// A single (name, inode) pairing inside a directory's data block. The
/// empty entry is inode number 0; names are null-terminated within the
/// fixed `DIRSIZ`-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub inum: u32,
    name: [u8; DIRSIZ],
}

impl DirEntry {
    /// Builds an entry. Panics if `name` (plus its null terminator)
    /// doesn't fit in `DIRSIZ` bytes; callers validate this first via
    /// [`validate_name`].
    pub fn new(inum: u32, name: &str) -> Self {
        let bytes = name.as_bytes();
        assert!(bytes.len() < DIRSIZ, "name too long for a directory entry");
        let mut buf = [0u8; DIRSIZ];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self { inum, name: buf }
    }

    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn is_empty_slot(&self) -> bool {
        self.inum == 0
    }
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

fn encode_entry(entry: &DirEntry) -> [u8; DIRENT_SIZE] {
    let raw = RawDirEntry {
        inum: entry.inum,
        name: entry.name,
    };
    let mut slot = [0u8; DIRENT_SIZE];
    bincode::serde::encode_into_slice(&raw, &mut slot, bincode_config())
        .expect("dirent fits in its slot");
    slot
}

fn decode_entry(slot: &[u8]) -> DirEntry {
    let (raw, _): (RawDirEntry, usize) =
        bincode::serde::decode_from_slice(slot, bincode_config()).expect("dirent slot is well-formed");
    DirEntry {
        inum: raw.inum,
        name: raw.name,
    }
}

/// Writes `entries` into a zeroed block buffer, leaving slots beyond the
/// given entries as the empty entry.
pub fn write_entries(block: &mut [u8; BLOCK_SIZE], entries: &[DirEntry]) {
    block.fill(0);
    for (i, entry) in entries.iter().enumerate() {
        let start = i * DIRENT_SIZE;
        block[start..start + DIRENT_SIZE].copy_from_slice(&encode_entry(entry));
    }
}

fn read_entry_at(block: &[u8; BLOCK_SIZE], slot: usize) -> DirEntry {
    let start = slot * DIRENT_SIZE;
    decode_entry(&block[start..start + DIRENT_SIZE])
}

/// Validates a name against the rules shared by every directory-mutating
/// operation: non-empty, not `.`/`..`, and short enough to fit `DIRSIZ`.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument("name is empty".into()));
    }
    if name == "." || name == ".." {
        return Err(FsError::InvalidArgument(format!(
            "'{name}' is not a valid entry name"
        )));
    }
    if name.as_bytes().len() >= DIRSIZ {
        return Err(FsError::InvalidArgument(format!(
            "name '{name}' is too long (max {} bytes)",
            DIRSIZ - 1
        )));
    }
    Ok(())
}

impl FileSystem {
    /// Reads the live entries of a directory inode's single data block.
    fn live_entries(&self, dir_inum: u32) -> FsResult<(crate::inode::Inode, Vec<DirEntry>)> {
        let dir = self.get_inode(dir_inum)?;
        if dir.kind != InodeType::Directory {
            return Err(FsError::NotADirectory);
        }
        let count = dir.size_bytes as usize / DIRENT_SIZE;
        let block = self.read_block_buf(dir.addrs[0]);
        let entries = (0..count).map(|i| read_entry_at(&block, i)).collect();
        Ok((dir, entries))
    }

    /// Scans `dir_inum`'s entries for `name`, returning its inode number.
    pub fn lookup_in_dir(&self, dir_inum: u32, name: &str) -> FsResult<u32> {
        if name.as_bytes().len() >= DIRSIZ {
            return Err(FsError::InvalidArgument(format!(
                "name '{name}' is too long (max {} bytes)",
                DIRSIZ - 1
            )));
        }
        let (_, entries) = self.live_entries(dir_inum)?;
        entries
            .into_iter()
            .find(|e| e.name() == name)
            .map(|e| e.inum)
            .ok_or(FsError::NotFound)
    }

    /// Common allocation dance behind `mkdir`/`create`: validates the
    /// name, rejects duplicates, allocates an inode of `kind` and a data
    /// block, rolling back whichever resource was already granted if the
    /// second allocation fails.
    fn new_child(&mut self, parent_inum: u32, name: &str, kind: InodeType) -> FsResult<(u32, u32)> {
        validate_name(name)?;
        let (_, entries) = self.live_entries(parent_inum)?;
        if entries.len() >= ENTRIES_PER_BLOCK {
            return Err(FsError::NoSpace);
        }
        if entries.iter().any(|e| e.name() == name) {
            return Err(FsError::Exists);
        }

        let child_inum = self.ialloc(kind)?;
        let child_block = match self.balloc() {
            Ok(block) => block,
            Err(e) => {
                self.ifree(child_inum);
                return Err(e);
            }
        };
        Ok((child_inum, child_block))
    }

    /// Appends `entry` to `dir_inum`'s single data block and bumps its
    /// `size_bytes` by one entry. Callers must have already checked
    /// capacity and uniqueness.
    fn append_entry(&mut self, dir_inum: u32, entry: DirEntry) -> FsResult<()> {
        let mut dir = self.get_inode(dir_inum)?;
        let count = dir.size_bytes as usize / DIRENT_SIZE;
        let mut block = self.read_block_buf(dir.addrs[0]);
        let start = count * DIRENT_SIZE;
        block[start..start + DIRENT_SIZE].copy_from_slice(&encode_entry(&entry));
        self.write_block_buf(dir.addrs[0], &block);
        dir.size_bytes += DIRENT_SIZE as u32;
        self.put_inode(dir_inum, &dir)
    }

    /// Removes the entry named `name` from `dir_inum` by swapping in the
    /// last live slot and shrinking `size_bytes` by one entry.
    fn remove_entry(&mut self, dir_inum: u32, name: &str) -> FsResult<DirEntry> {
        let mut dir = self.get_inode(dir_inum)?;
        let count = dir.size_bytes as usize / DIRENT_SIZE;
        let mut block = self.read_block_buf(dir.addrs[0]);
        let slot = (0..count)
            .find(|&i| read_entry_at(&block, i).name() == name)
            .ok_or(FsError::NotFound)?;
        let removed = read_entry_at(&block, slot);

        let last = count - 1;
        if slot != last {
            let last_entry = read_entry_at(&block, last);
            let start = slot * DIRENT_SIZE;
            block[start..start + DIRENT_SIZE].copy_from_slice(&encode_entry(&last_entry));
        }
        let last_start = last * DIRENT_SIZE;
        block[last_start..last_start + DIRENT_SIZE].fill(0);
        self.write_block_buf(dir.addrs[0], &block);

        dir.size_bytes -= DIRENT_SIZE as u32;
        self.put_inode(dir_inum, &dir)?;
        Ok(removed)
    }

    /// Creates a subdirectory named `name` under `parent_inum`. Returns
    /// the new inode number.
    pub fn mkdir(&mut self, parent_inum: u32, name: &str) -> FsResult<u32> {
        let (child_inum, child_block) = self.new_child(parent_inum, name, InodeType::Directory)?;

        let mut child = self.get_inode(child_inum)?;
        child.size_bytes = 2 * DIRENT_SIZE as u32;
        child.link_count = 2;
        child.addrs[0] = child_block;
        self.put_inode(child_inum, &child)?;

        let entries = [DirEntry::new(child_inum, "."), DirEntry::new(parent_inum, "..")];
        let mut block = [0u8; BLOCK_SIZE];
        write_entries(&mut block, &entries);
        self.write_block_buf(child_block, &block);

        self.append_entry(parent_inum, DirEntry::new(child_inum, name))?;
        let mut parent = self.get_inode(parent_inum)?;
        parent.link_count += 1;
        self.put_inode(parent_inum, &parent)?;

        Ok(child_inum)
    }

    /// Creates a regular file named `name` under `parent_inum`. Returns
    /// the new inode number.
    pub fn create(&mut self, parent_inum: u32, name: &str) -> FsResult<u32> {
        let (child_inum, child_block) = self.new_child(parent_inum, name, InodeType::File)?;

        let mut child = self.get_inode(child_inum)?;
        child.size_bytes = 0;
        child.link_count = 1;
        child.addrs[0] = child_block;
        self.put_inode(child_inum, &child)?;

        self.append_entry(parent_inum, DirEntry::new(child_inum, name))?;
        Ok(child_inum)
    }

    /// Removes the empty subdirectory `name` from `parent_inum`.
    pub fn rmdir(&mut self, parent_inum: u32, name: &str) -> FsResult<()> {
        let target_inum = self.lookup_in_dir(parent_inum, name)?;
        let target = self.get_inode(target_inum)?;
        if target.kind != InodeType::Directory {
            return Err(FsError::NotADirectory);
        }
        let entry_count = target.size_bytes as usize / DIRENT_SIZE;
        if entry_count != 2 {
            return Err(FsError::NotEmpty);
        }

        self.remove_entry(parent_inum, name)?;
        let mut parent = self.get_inode(parent_inum)?;
        parent.link_count -= 1;
        self.put_inode(parent_inum, &parent)?;

        for &addr in target.addrs.iter() {
            if addr != 0 {
                self.bfree(addr)?;
            }
        }
        self.ifree(target_inum);
        Ok(())
    }

    /// Removes the regular file `name` from `parent_inum`. Fails if any
    /// open descriptor still refers to it.
    pub fn unlink(&mut self, parent_inum: u32, name: &str) -> FsResult<()> {
        let target_inum = self.lookup_in_dir(parent_inum, name)?;
        let target = self.get_inode(target_inum)?;
        if target.kind != InodeType::File {
            return Err(FsError::NotAFile);
        }
        if self
            .descriptors
            .iter()
            .flatten()
            .any(|d| d.inum == target_inum)
        {
            return Err(FsError::Busy);
        }

        self.remove_entry(parent_inum, name)?;
        for &addr in target.addrs.iter() {
            if addr != 0 {
                self.bfree(addr)?;
            }
        }
        self.ifree(target_inum);
        Ok(())
    }

    /// Yields the live `(name, inum)` pairs of a directory in storage
    /// order.
    pub fn list(&self, dir_inum: u32) -> FsResult<Vec<(String, u32)>> {
        let (_, entries) = self.live_entries(dir_inum)?;
        Ok(entries
            .into_iter()
            .map(|e| (e.name().to_string(), e.inum))
            .collect())
    }
}
