//! The error taxonomy every public operation can fail with. Every public
//! operation returns `Result<T, FsError>`; nothing propagates past the
//! API as a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("not a file")]
    NotAFile,

    #[error("already exists")]
    Exists,

    #[error("directory not empty")]
    NotEmpty,

    #[error("resource busy")]
    Busy,

    #[error("no space left on device")]
    NoSpace,

    #[error("no free file descriptor")]
    NoDescriptor,

    #[error("permission denied")]
    Permission,

    #[error("corrupt image: {0}")]
    CorruptImage(String),

    #[error("host I/O error: {0}")]
    HostIo(#[from] std::io::Error),
}

pub type FsResult<T> = Result<T, FsError>;
