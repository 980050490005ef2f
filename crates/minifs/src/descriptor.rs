//! The descriptor table: a fixed-capacity, process-wide array of open
//! file handles projecting an inode to a seekable byte stream.

use bitflags::bitflags;

use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::inode::InodeType;
use crate::layout::{BLOCK_SIZE, DIRECT_POINTERS, MAX_FILE_SIZE, MAX_OPEN_FILES};

bitflags! {
    /// Mirrors the C original's `O_RDONLY`/`O_WRONLY`/`O_RDWR`/`O_CREATE`
    /// bit values; `RDWR` is the union of the two access bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const RDONLY = 0x0001;
        const WRONLY = 0x0002;
        const RDWR   = Self::RDONLY.bits() | Self::WRONLY.bits();
        const CREATE = 0x0100;
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Descriptor {
    pub inum: u32,
    pub mode: OpenFlags,
    pub position: u32,
}

impl FileSystem {
    /// Opens `name` under `parent_inum`. Creates the file first if it is
    /// absent and `OpenFlags::CREATE` is set; otherwise fails with
    /// `NotFound`. Returns the lowest free descriptor, `0..MAX_OPEN_FILES`.
    pub fn open(&mut self, parent_inum: u32, name: &str, flags: OpenFlags) -> FsResult<usize> {
        let inum = match self.lookup_in_dir(parent_inum, name) {
            Ok(inum) => inum,
            Err(FsError::NotFound) if flags.contains(OpenFlags::CREATE) => {
                self.create(parent_inum, name)?
            }
            Err(e) => return Err(e),
        };

        let inode = self.get_inode(inum)?;
        if inode.kind != InodeType::File {
            return Err(FsError::NotAFile);
        }

        let slot = self
            .descriptors
            .iter()
            .position(|d| d.is_none())
            .ok_or(FsError::NoDescriptor)?;

        let mode = flags & (OpenFlags::RDONLY | OpenFlags::WRONLY);
        self.descriptors[slot] = Some(Descriptor {
            inum,
            mode,
            position: 0,
        });
        Ok(slot)
    }

    /// Frees descriptor `fd`.
    pub fn close(&mut self, fd: usize) -> FsResult<()> {
        let slot = self.descriptor_mut(fd)?;
        *slot = None;
        Ok(())
    }

    fn descriptor(&self, fd: usize) -> FsResult<&Descriptor> {
        self.descriptors
            .get(fd)
            .and_then(|d| d.as_ref())
            .ok_or_else(|| FsError::InvalidArgument(format!("descriptor {fd} is not open")))
    }

    fn descriptor_mut(&mut self, fd: usize) -> FsResult<&mut Option<Descriptor>> {
        self.descriptors
            .get_mut(fd)
            .filter(|d| d.is_some())
            .ok_or_else(|| FsError::InvalidArgument(format!("descriptor {fd} is not open")))
    }

    /// Reads up to `count` bytes of `fd`'s file into `buf`. The legacy
    /// behaviour (the default) always starts at offset 0 regardless of
    /// the descriptor's position; a `FileSystem` built with
    /// [`FileSystem::with_seeked_reads`] honors `position` instead. A
    /// zero entry in `addrs` ends the file early (no hole support).
    pub fn read(&mut self, fd: usize, buf: &mut [u8], count: usize) -> FsResult<usize> {
        let descriptor = *self.descriptor(fd)?;
        if !descriptor.mode.contains(OpenFlags::RDONLY) {
            return Err(FsError::Permission);
        }
        let inode = self.get_inode(descriptor.inum)?;

        let start_offset = if self.legacy_zero_offset_reads {
            0
        } else {
            descriptor.position
        };
        let avail = inode.size_bytes.saturating_sub(start_offset) as usize;
        let n = count.min(avail).min(buf.len());

        let mut produced = 0;
        while produced < n {
            let offset = start_offset as usize + produced;
            let block_index = offset / BLOCK_SIZE;
            if block_index >= DIRECT_POINTERS {
                break;
            }
            let addr = inode.addrs[block_index];
            if addr == 0 {
                break;
            }
            let block = self.read_block_buf(addr);
            let in_block = offset % BLOCK_SIZE;
            let take = (BLOCK_SIZE - in_block).min(n - produced);
            buf[produced..produced + take].copy_from_slice(&block[in_block..in_block + take]);
            produced += take;
        }
        Ok(produced)
    }

    /// Writes `count` bytes from `buf` at `fd`'s current position,
    /// allocating blocks as needed. Clamps to the 8-direct-block maximum
    /// file size and advances `position` by the number of bytes
    /// actually written.
    pub fn write(&mut self, fd: usize, buf: &[u8], count: usize) -> FsResult<usize> {
        let mut descriptor = *self.descriptor(fd)?;
        if !descriptor.mode.contains(OpenFlags::WRONLY) {
            return Err(FsError::Permission);
        }

        let mut count = count.min(buf.len());
        let mut target = descriptor.position as u64 + count as u64;
        if target > MAX_FILE_SIZE as u64 {
            target = MAX_FILE_SIZE as u64;
            count = target.saturating_sub(descriptor.position as u64) as usize;
            if count == 0 {
                return Ok(0);
            }
        }

        let mut inode = self.get_inode(descriptor.inum)?;
        let existing_blocks = inode.blocks_in_use();
        let blocks_needed = (target as usize).div_ceil(BLOCK_SIZE);

        for block_index in existing_blocks..blocks_needed {
            match self.balloc() {
                Ok(addr) => inode.addrs[block_index] = addr,
                Err(_) => {
                    // Clamp the write to whatever was successfully
                    // allocated so far.
                    target = (block_index * BLOCK_SIZE) as u64;
                    count = target.saturating_sub(descriptor.position as u64) as usize;
                    break;
                }
            }
        }
        if count == 0 {
            return Ok(0);
        }

        let mut written = 0;
        while written < count {
            let offset = descriptor.position as usize + written;
            let block_index = offset / BLOCK_SIZE;
            let addr = inode.addrs[block_index];
            let mut block = self.read_block_buf(addr);
            let in_block = offset % BLOCK_SIZE;
            let take = (BLOCK_SIZE - in_block).min(count - written);
            block[in_block..in_block + take].copy_from_slice(&buf[written..written + take]);
            self.write_block_buf(addr, &block);
            written += take;
        }

        descriptor.position += written as u32;
        inode.size_bytes = inode.size_bytes.max(descriptor.position);
        self.put_inode(descriptor.inum, &inode)?;
        self.descriptors[fd] = Some(descriptor);

        Ok(written)
    }
}
