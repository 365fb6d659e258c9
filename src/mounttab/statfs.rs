use std::io;
use std::path::Path;

/// Block counts of a mounted filesystem, as reported by `statvfs(3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsCapacity {
    /// Total number of blocks (`f_blocks`).
    pub blocks: u64,
    /// Blocks available to unprivileged users (`f_bavail`).
    pub blocks_available: u64,
    /// Block size in bytes (`f_bsize`).
    pub block_size: u64,
}

/// Queries capacity statistics for a mount point.
pub trait FsStatProvider {
    /// # Errors
    ///
    /// Returns the underlying I/O error if the filesystem cannot be queried.
    fn capacity(&self, mount_point: &Path) -> io::Result<FsCapacity>;
}

/// [`FsStatProvider`] backed by the `statvfs(3)` system call.
#[derive(Debug, Default, Clone, Copy)]
pub struct Statvfs;

impl FsStatProvider for Statvfs {
    fn capacity(&self, mount_point: &Path) -> io::Result<FsCapacity> {
        let stat = nix::sys::statvfs::statvfs(mount_point).map_err(io::Error::from)?;
        Ok(FsCapacity {
            blocks: u64::from(stat.blocks()),
            blocks_available: u64::from(stat.blocks_available()),
            block_size: u64::from(stat.block_size()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn test_statvfs_root() {
        let capacity = Statvfs.capacity(Path::new("/")).unwrap();
        assert!(capacity.block_size > 0);
        assert!(capacity.blocks_available <= capacity.blocks);
    }

    #[test]
    fn test_statvfs_missing_path() {
        let err = Statvfs
            .capacity(Path::new("/definitely/does/not/exist"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
