//! MiniFS: a self-contained, block-addressed file system implemented
//! over a fixed-size byte image, with classical UNIX on-disk layout:
//! superblock, inode and data bitmaps, inode table, data region, plus
//! path resolution, directory maintenance, descriptor-table file I/O, and
//! an in-fs credentials file.
//!
//! The whole crate is single-threaded and cooperative: a [`FileSystem`]
//! value owns its image, its descriptor table, and its credentials table,
//! and every operation is a plain method call that runs to completion.
//! There is no process-global state and no concurrency story beyond "one
//! caller at a time".

mod bitmap;
mod descriptor;
mod dirent;
mod error;
mod fs;
mod image;
mod inode;
mod layout;
mod path;
mod users;

pub use descriptor::OpenFlags;
pub use dirent::DirEntry;
pub use error::{FsError, FsResult};
pub use fs::FileSystem;
pub use inode::{Inode, InodeType};
pub use layout::{
    BLOCK_COUNT, BLOCK_SIZE, DIRECT_POINTERS, DIRSIZ, INODE_NUM, MAX_FILE_SIZE, MAX_OPEN_FILES,
    ROOT_INUM, SuperBlock,
};
pub use users::User;
