//! Path resolution: composing `lookup_in_dir` calls with `.`/`..` and
//! absolute/relative roots.

use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::inode::InodeType;
use crate::layout::ROOT_INUM;

impl FileSystem {
    /// Resolves `path` to an inode number, starting from `base` for
    /// relative paths and from the root for absolute ones.
    pub fn resolve(&self, path: &str, base: u32) -> FsResult<u32> {
        let trimmed = strip_trailing_slashes(path);

        if trimmed.is_empty() {
            return if path.starts_with('/') {
                Ok(ROOT_INUM)
            } else if path.is_empty() {
                Ok(base)
            } else {
                Ok(ROOT_INUM)
            };
        }
        if trimmed == "/" {
            return Ok(ROOT_INUM);
        }

        let mut current = if trimmed.starts_with('/') { ROOT_INUM } else { base };

        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            let inode = self.get_inode(current)?;
            if inode.kind != InodeType::Directory {
                return Err(FsError::NotADirectory);
            }
            current = match segment {
                "." => current,
                ".." => self.lookup_in_dir(current, "..")?,
                name => self.lookup_in_dir(current, name)?,
            };
        }

        // The final component must name something still allocated.
        self.get_inode(current).map(|_| current)
    }
}

fn strip_trailing_slashes(path: &str) -> &str {
    if path == "/" {
        return path;
    }
    path.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_root() {
        let fs = FileSystem::formatted();
        assert_eq!(fs.resolve("/", 1).unwrap(), 1);
        assert_eq!(fs.resolve("", 1).unwrap(), 1);
    }

    #[test]
    fn resolve_nested_path_and_dotdot() {
        let mut fs = FileSystem::formatted();
        let a = fs.mkdir(1, "a").unwrap();
        let b = fs.mkdir(a, "b").unwrap();
        assert_eq!(fs.resolve("/a/b", 1).unwrap(), b);
        assert_eq!(fs.resolve("/a/b/../..", 1).unwrap(), 1);
    }

    #[test]
    fn resolve_collapses_duplicate_slashes() {
        let mut fs = FileSystem::formatted();
        let a = fs.mkdir(1, "a").unwrap();
        let b = fs.mkdir(a, "b").unwrap();
        assert_eq!(fs.resolve("/a//b", 1).unwrap(), b);
    }

    #[test]
    fn resolve_through_non_directory_fails() {
        let mut fs = FileSystem::formatted();
        fs.create(1, "f").unwrap();
        assert!(matches!(
            fs.resolve("/f/x", 1),
            Err(FsError::NotADirectory)
        ));
    }
}
