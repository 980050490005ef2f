//! The `FileSystem` value: one `Image`, the two bitmap regions over it, the
//! descriptor table, and the credentials table. Every operation in this
//! crate is a method on this struct, threaded explicitly by the caller --
//! there is no process-global state.

use std::path::Path;

use log::info;

use crate::bitmap::BitmapRegion;
use crate::descriptor::Descriptor;
use crate::error::{FsError, FsResult};
use crate::image::Image;
use crate::inode::{decode_inode, encode_inode, Inode, InodeType};
use crate::layout::{
    BLOCK_SIZE, DATA_BITMAP_START, DATA_BLOCKS_NUM, DATA_START, INODE_BITMAP_START, INODE_NUM,
    INODE_SIZE, INODE_START, MAX_OPEN_FILES, ROOT_INUM,
};
use crate::users::UserManager;

pub struct FileSystem {
    pub(crate) image: Image,
    pub(crate) inode_bitmap: BitmapRegion,
    pub(crate) data_bitmap: BitmapRegion,
    pub(crate) descriptors: [Option<Descriptor>; MAX_OPEN_FILES],
    pub(crate) users: UserManager,
    pub(crate) legacy_zero_offset_reads: bool,
}

impl FileSystem {
    /// Builds an unformatted instance over a freshly zeroed image. Callers
    /// almost always want [`FileSystem::formatted`] instead.
    fn new_raw() -> Self {
        Self {
            image: Image::new_zeroed(),
            inode_bitmap: BitmapRegion::new(INODE_BITMAP_START),
            data_bitmap: BitmapRegion::new(DATA_BITMAP_START),
            descriptors: std::array::from_fn(|_| None),
            users: UserManager::new(),
            legacy_zero_offset_reads: true,
        }
    }

    /// A new, formatted instance -- the common entry point.
    pub fn formatted() -> Self {
        let mut fs = Self::new_raw();
        fs.format(false);
        fs
    }

    /// Same as [`FileSystem::formatted`], but `read` honors the
    /// descriptor's position instead of always starting at offset 0.
    pub fn with_seeked_reads() -> Self {
        let mut fs = Self::new_raw();
        fs.legacy_zero_offset_reads = false;
        fs.format(false);
        fs
    }

    /// Writes the superblock, zeroes both bitmaps, frees every inode slot,
    /// allocates the root directory at inode 1, and, if `preserve_users`
    /// is set, reinstates the credentials table that was in effect before
    /// the call.
    pub fn format(&mut self, preserve_users: bool) {
        let saved_users = preserve_users.then(|| self.users.serialize());

        self.image = Image::new_zeroed();
        self.descriptors = std::array::from_fn(|_| None);

        let sb = crate::layout::SuperBlock::expected();
        let mut sb_block = [0u8; BLOCK_SIZE];
        let config = bincode::config::standard().with_fixed_int_encoding();
        bincode::serde::encode_into_slice(&sb, &mut sb_block, config)
            .expect("superblock fits in block 0");
        self.image.write_block(crate::layout::SUPERBLOCK_BLOCK, &sb_block);

        for inum in 0..INODE_NUM {
            self.put_inode_raw(inum, &Inode::free());
        }

        // Root directory: inode 1, link_count 2 ("." and the entry a
        // future child's ".." would add), single data block holding "."
        // and "..", both pointing at the root itself.
        let root_inum = self.ialloc(InodeType::Directory).expect("root inode");
        debug_assert_eq!(root_inum, ROOT_INUM);
        let root_block = self.balloc().expect("root data block");

        let mut root = self.get_inode(root_inum).expect("just allocated");
        root.size_bytes = 2 * crate::dirent::DIRENT_SIZE as u32;
        root.link_count = 2;
        root.addrs[0] = root_block;
        self.put_inode(root_inum, &root).expect("root inum valid");

        let entries = [
            crate::dirent::DirEntry::new(root_inum, "."),
            crate::dirent::DirEntry::new(root_inum, ".."),
        ];
        let mut block = [0u8; BLOCK_SIZE];
        crate::dirent::write_entries(&mut block, &entries);
        self.image.write_block(root_block, &block);

        self.users = UserManager::new();
        if let Some(data) = saved_users {
            self.users.load_from_str(&data);
        }

        info!("formatted image: {} blocks, {} inodes", crate::layout::BLOCK_COUNT, INODE_NUM);
    }

    /// Flushes the credentials table to `/etc/passwd` inside the image,
    /// then writes the whole image to `path`. This is the only point at
    /// which the in-memory credentials table is persisted into the image
    /// itself; `format` leaves the root directory untouched ("." and ".."
    /// only) and keeps the table purely in memory.
    pub fn save(&mut self, path: &Path) -> FsResult<()> {
        self.save_passwd()?;
        self.image.save(path)
    }

    /// Loads an image from `path` and rebuilds the credentials table from
    /// its `/etc/passwd`.
    pub fn load(path: &Path) -> FsResult<Self> {
        let image = Image::load(path)?;
        let mut sb_block = [0u8; BLOCK_SIZE];
        image.read_block(crate::layout::SUPERBLOCK_BLOCK, &mut sb_block);
        let config = bincode::config::standard().with_fixed_int_encoding();
        let (sb, _): (crate::layout::SuperBlock, usize) =
            bincode::serde::decode_from_slice(&sb_block, config)
                .map_err(|e| FsError::CorruptImage(format!("superblock decode failed: {e}")))?;
        if !sb.matches_layout() {
            return Err(FsError::CorruptImage(
                "superblock does not match build-time layout".into(),
            ));
        }

        let mut fs = Self {
            image,
            inode_bitmap: BitmapRegion::new(INODE_BITMAP_START),
            data_bitmap: BitmapRegion::new(DATA_BITMAP_START),
            descriptors: std::array::from_fn(|_| None),
            users: UserManager::new(),
            legacy_zero_offset_reads: true,
        };
        fs.load_passwd();
        Ok(fs)
    }

    // --- inode & block manager ---

    fn inode_block_and_offset(inum: u32) -> (u32, usize) {
        let block = INODE_START + (inum * INODE_SIZE) / BLOCK_SIZE as u32;
        let offset = (inum * INODE_SIZE) as usize % BLOCK_SIZE;
        (block, offset)
    }

    fn put_inode_raw(&mut self, inum: u32, inode: &Inode) {
        let (block, offset) = Self::inode_block_and_offset(inum);
        let mut buf = [0u8; BLOCK_SIZE];
        self.image.read_block(block, &mut buf);
        buf[offset..offset + INODE_SIZE as usize].copy_from_slice(&encode_inode(inode));
        self.image.write_block(block, &buf);
    }

    fn get_inode_raw(&self, inum: u32) -> Inode {
        let (block, offset) = Self::inode_block_and_offset(inum);
        let mut buf = [0u8; BLOCK_SIZE];
        self.image.read_block(block, &mut buf);
        decode_inode(&buf[offset..offset + INODE_SIZE as usize])
    }

    /// Finds a free inode bit (never inode 0), sets it, zeroes the slot,
    /// stores `kind`, and returns the inode number.
    pub fn ialloc(&mut self, kind: InodeType) -> FsResult<u32> {
        let inum = self
            .inode_bitmap
            .find_free(&self.image, INODE_NUM, 1)
            .ok_or(FsError::NoSpace)?;
        self.inode_bitmap.set(&mut self.image, inum);
        let mut inode = Inode::free();
        inode.kind = kind;
        self.put_inode_raw(inum, &inode);
        Ok(inum)
    }

    /// Marks the inode's type back to free and clears its bitmap bit.
    /// Does not touch `addrs`/`size_bytes`/`link_count`; callers must
    /// free data blocks themselves first.
    pub fn ifree(&mut self, inum: u32) {
        let mut inode = self.get_inode_raw(inum);
        inode.kind = InodeType::Free;
        self.put_inode_raw(inum, &inode);
        self.inode_bitmap.clear(&mut self.image, inum);
    }

    /// Finds a free data-block bit, sets it, zero-fills the block, and
    /// returns the absolute block number.
    pub fn balloc(&mut self) -> FsResult<u32> {
        let index = self
            .data_bitmap
            .find_free(&self.image, DATA_BLOCKS_NUM, 0)
            .ok_or(FsError::NoSpace)?;
        self.data_bitmap.set(&mut self.image, index);
        let abs = DATA_START + index;
        self.image.write_block(abs, &[0u8; BLOCK_SIZE]);
        Ok(abs)
    }

    /// Clears the bit for an absolute data-block number. Rejects numbers
    /// outside the data region.
    pub fn bfree(&mut self, abs_block: u32) -> FsResult<()> {
        if abs_block < DATA_START || abs_block >= crate::layout::BLOCK_COUNT {
            return Err(FsError::InvalidArgument(format!(
                "block {abs_block} is outside the data region"
            )));
        }
        self.data_bitmap.clear(&mut self.image, abs_block - DATA_START);
        Ok(())
    }

    /// Returns a copy of inode `n`'s record. Fails if `n` is out of range
    /// or the slot is free.
    pub fn get_inode(&self, n: u32) -> FsResult<Inode> {
        if n == 0 || n >= INODE_NUM {
            return Err(FsError::InvalidArgument(format!("inode {n} out of range")));
        }
        let inode = self.get_inode_raw(n);
        if inode.is_free() {
            return Err(FsError::NotFound);
        }
        Ok(inode)
    }

    pub fn put_inode(&mut self, n: u32, inode: &Inode) -> FsResult<()> {
        if n == 0 || n >= INODE_NUM {
            return Err(FsError::InvalidArgument(format!("inode {n} out of range")));
        }
        self.put_inode_raw(n, inode);
        Ok(())
    }

    pub(crate) fn read_block_buf(&self, block: u32) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        self.image.read_block(block, &mut buf);
        buf
    }

    pub(crate) fn write_block_buf(&mut self, block: u32, buf: &[u8; BLOCK_SIZE]) {
        self.image.write_block(block, buf);
    }
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::formatted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_creates_root_directory() {
        let fs = FileSystem::formatted();
        let root = fs.get_inode(ROOT_INUM).unwrap();
        assert_eq!(root.kind, InodeType::Directory);
        assert_eq!(root.link_count, 2);
        assert_ne!(root.addrs[0], 0);
    }

    #[test]
    fn ialloc_skips_reserved_inode_zero() {
        let mut fs = FileSystem::new_raw();
        let first = fs.ialloc(InodeType::File).unwrap();
        assert_eq!(first, 1);
    }

    #[test]
    fn ifree_then_ialloc_reuses_slot() {
        let mut fs = FileSystem::formatted();
        let inum = fs.ialloc(InodeType::File).unwrap();
        fs.ifree(inum);
        let reused = fs.ialloc(InodeType::File).unwrap();
        assert_eq!(reused, inum);
    }

    #[test]
    fn balloc_zero_fills_block() {
        let mut fs = FileSystem::formatted();
        let block = fs.balloc().unwrap();
        let buf = fs.read_block_buf(block);
        assert_eq!(buf, [0u8; BLOCK_SIZE]);
    }

    #[test]
    fn bfree_rejects_block_outside_data_region() {
        let mut fs = FileSystem::formatted();
        assert!(fs.bfree(0).is_err());
    }

    #[test]
    fn exhausting_inode_table_fails_with_no_space() {
        let mut fs = FileSystem::new_raw();
        for _ in 1..INODE_NUM {
            fs.ialloc(InodeType::File).unwrap();
        }
        assert!(matches!(fs.ialloc(InodeType::File), Err(FsError::NoSpace)));
    }
}
