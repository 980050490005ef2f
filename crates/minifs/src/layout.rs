//! On-disk geometry constants and the superblock record.
//!
//! The layout is fixed at build time: every block range below is computed
//! once, here, from a handful of constants, and both `format` and `load`
//! hold the image to it. There is no runtime geometry negotiation.

use serde::{Deserialize, Serialize};

/// Bytes per block.
pub const BLOCK_SIZE: usize = 512;
/// Total blocks in the image.
pub const BLOCK_COUNT: u32 = 1024;

/// Byte size of one on-disk inode slot; the record itself is smaller, the
/// remainder of the slot is reserved padding for a fixed 64-byte stride.
pub const INODE_SIZE: u32 = 64;
/// Blocks given to the inode table.
pub const INODE_BLOCKS: u32 = 16;
/// Total inode slots (`INODE_BLOCKS * BLOCK_SIZE / INODE_SIZE`).
pub const INODE_NUM: u32 = INODE_BLOCKS * (BLOCK_SIZE as u32 / INODE_SIZE);

/// Blocks given to the inode bitmap.
pub const INODE_BITMAP_BLOCKS: u32 = 1;
/// Blocks given to the data bitmap.
pub const DATA_BITMAP_BLOCKS: u32 = 1;

/// Block 0 is always the superblock.
pub const SUPERBLOCK_BLOCK: u32 = 0;
pub const INODE_BITMAP_START: u32 = SUPERBLOCK_BLOCK + 1;
pub const DATA_BITMAP_START: u32 = INODE_BITMAP_START + INODE_BITMAP_BLOCKS;
pub const INODE_START: u32 = DATA_BITMAP_START + DATA_BITMAP_BLOCKS;
pub const DATA_START: u32 = INODE_START + INODE_BLOCKS;
pub const DATA_BLOCKS_NUM: u32 = BLOCK_COUNT - DATA_START;

/// Direct block pointers per inode; there are no indirect blocks.
pub const DIRECT_POINTERS: usize = 8;
/// Maximum file size in bytes.
pub const MAX_FILE_SIZE: u32 = (DIRECT_POINTERS as u32) * BLOCK_SIZE as u32;

/// Max bytes in a directory-entry name, including the null terminator.
pub const DIRSIZ: usize = 28;

/// The root directory always lives at inode 1. Inode 0 is reserved and
/// never allocated.
pub const ROOT_INUM: u32 = 1;

/// Depth of the open-file-descriptor table.
pub const MAX_OPEN_FILES: usize = 16;

/// Block 0's contents, written verbatim by `format` and re-validated on
/// every `load`. Every field must equal the value implied by the
/// build-time layout above; any mismatch is treated as corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub total_blocks: u32,
    pub total_inodes: u32,
    pub total_data_blocks: u32,
    pub inode_region_start: u32,
    pub data_region_start: u32,
    pub inode_bitmap_start: u32,
    pub data_bitmap_start: u32,
}

impl SuperBlock {
    /// The single superblock value a freshly formatted image carries.
    pub const fn expected() -> Self {
        Self {
            total_blocks: BLOCK_COUNT,
            total_inodes: INODE_NUM,
            total_data_blocks: DATA_BLOCKS_NUM,
            inode_region_start: INODE_START,
            data_region_start: DATA_START,
            inode_bitmap_start: INODE_BITMAP_START,
            data_bitmap_start: DATA_BITMAP_START,
        }
    }

    pub fn matches_layout(&self) -> bool {
        *self == Self::expected()
    }
}
