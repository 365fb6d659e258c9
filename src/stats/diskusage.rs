//! Per-mount disk capacity derived from the mount table and `statvfs(3)`.
//!
//! Pseudo and network filesystems listed in [`FS_DENYLIST`] are never queried.
//! For every other mount three attributes are published:
//!
//! - `size`: total capacity, `(blocks / 1024) * block_size`
//! - `avail`: capacity available to unprivileged users, `(bavail / 1024) * block_size`
//! - `usage`: percent used, `100 * (blocks - bavail) / blocks`
//!
//! `size` and `avail` therefore count whole 1024-block groups and read as
//! kilobytes when the block size is 1024.

use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::fsutil;
use crate::mounttab::{
    FsCapacity, FsStatProvider, Statvfs, is_ignorable_line, parse_mount_entry_line,
};

use super::parser::{AttributeTable, SnapshotParser, for_each_line};
use super::{LookupError, RefreshError};

/// Filesystem types excluded from disk usage reporting.
pub const FS_DENYLIST: [&str; 29] = [
    // kernel pseudo filesystems
    "sysfs",
    "rootfs",
    "bdev",
    "proc",
    "cgroup",
    "cpuset",
    "tmpfs",
    "binfmt_misc",
    "debugfs",
    "securityfs",
    "sockfs",
    "usbfs",
    "pipefs",
    "anon_inodefs",
    "futexfs",
    "inotifyfs",
    "devpts",
    "ramfs",
    "hugetlbfs",
    "mqueue",
    "fuse",
    "fusectl",
    "selinuxfs",
    "encryptfs",
    "rpc_pipefs",
    // network filesystems
    "nfs",
    "nfs4",
    "autofs",
    "nfsd",
];

static DENYLIST: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| FS_DENYLIST.into_iter().collect());

const BLOCK_GROUP: u64 = 1024;

/// Returns `true` if mounts of this filesystem type are skipped.
pub fn is_denied_fs_type(fs_type: &str) -> bool {
    DENYLIST.contains(fs_type)
}

/// Why a single mount was left out of a refresh.
#[derive(Debug, thiserror::Error)]
enum MountSkip {
    #[error("statvfs failed on `{path}`: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("filesystem at `{path}` reports zero blocks")]
    ZeroBlocks { path: String },
}

/// Keeps the latest capacity figures of every mounted, non-denylisted filesystem.
#[derive(Debug)]
pub struct MountUsageParser<S = Statvfs> {
    path: PathBuf,
    stats: S,
    mounts: BTreeMap<String, AttributeTable>,
}

impl MountUsageParser<Statvfs> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_stat_provider(path, Statvfs)
    }
}

impl<S: FsStatProvider> MountUsageParser<S> {
    pub fn with_stat_provider(path: impl Into<PathBuf>, stats: S) -> Self {
        Self {
            path: path.into(),
            stats,
            mounts: BTreeMap::new(),
        }
    }

    /// Mount points in the current snapshot, in sorted order.
    pub fn mount_paths(&self) -> Vec<String> {
        self.mounts.keys().cloned().collect()
    }

    /// Parses a mount table and replaces the snapshot with the mounts found in it.
    ///
    /// Unparsable lines and mounts whose capacity query fails are skipped with a
    /// log message. A skipped mount that was present in the previous snapshot
    /// keeps its previous attributes; mounts no longer listed are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::ReadLine`] if reading the mount table fails.
    pub fn refresh_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        origin: &Path,
    ) -> Result<(), RefreshError> {
        let mut mounts = BTreeMap::new();

        for_each_line(reader, origin, |lineno, line| {
            if is_ignorable_line(line) {
                return Ok(ControlFlow::Continue(()));
            }

            let entry = match parse_mount_entry_line(line) {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!(
                        "skipping line {} in `{}`: {}",
                        lineno,
                        origin.display(),
                        err
                    );
                    return Ok(ControlFlow::Continue(()));
                }
            };

            if entry.mount_point.is_empty() || is_denied_fs_type(entry.fs_type) {
                return Ok(ControlFlow::Continue(()));
            }

            let mount_point = entry.mount_point.into_owned();
            match self.query(&mount_point) {
                Ok(table) => {
                    mounts.insert(mount_point, table);
                }
                Err(err) => {
                    log::warn!("{err}");
                    if let Some(previous) = self.mounts.get(&mount_point) {
                        mounts.insert(mount_point, previous.clone());
                    }
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        self.mounts = mounts;
        Ok(())
    }

    fn query(&self, mount_point: &str) -> Result<AttributeTable, MountSkip> {
        let capacity = self
            .stats
            .capacity(Path::new(mount_point))
            .map_err(|source| MountSkip::Stat {
                path: mount_point.to_owned(),
                source,
            })?;

        usage_attributes(&capacity).ok_or_else(|| MountSkip::ZeroBlocks {
            path: mount_point.to_owned(),
        })
    }
}

/// Derives `size`, `avail` and `usage` from raw block counts.
///
/// Returns `None` for a filesystem that reports zero blocks.
fn usage_attributes(capacity: &FsCapacity) -> Option<AttributeTable> {
    if capacity.blocks == 0 {
        return None;
    }

    let size = (capacity.blocks / BLOCK_GROUP).saturating_mul(capacity.block_size);
    let avail = (capacity.blocks_available / BLOCK_GROUP).saturating_mul(capacity.block_size);
    let used = capacity.blocks.saturating_sub(capacity.blocks_available);
    let usage = 100.0 * used as f64 / capacity.blocks as f64;

    let mut table = AttributeTable::new();
    table.insert("size".to_owned(), size.to_string());
    table.insert("avail".to_owned(), avail.to_string());
    table.insert("usage".to_owned(), format!("{usage:.2}"));
    Some(table)
}

impl<S: FsStatProvider> SnapshotParser for MountUsageParser<S> {
    type Entity = String;

    fn refresh(&mut self) -> Result<(), RefreshError> {
        let reader = fsutil::open_file_reader(&self.path)?;
        let path = self.path.clone();
        self.refresh_from_reader(reader, &path)
    }

    fn entities(&self) -> Vec<String> {
        self.mount_paths()
    }

    fn report(&self, mount_point: &String) -> Result<&AttributeTable, LookupError> {
        self.mounts
            .get(mount_point)
            .ok_or_else(|| LookupError::UnknownMount(mount_point.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{self, Write};

    use super::*;

    /// Capacity provider backed by a fixed table; unknown paths fail with `NotFound`.
    #[derive(Default)]
    struct FakeStats {
        capacities: RefCell<HashMap<String, FsCapacity>>,
        queried: RefCell<Vec<String>>,
    }

    impl FakeStats {
        fn with(self, path: &str, blocks: u64, blocks_available: u64, block_size: u64) -> Self {
            self.set(path, blocks, blocks_available, block_size);
            self
        }

        fn set(&self, path: &str, blocks: u64, blocks_available: u64, block_size: u64) {
            self.capacities.borrow_mut().insert(
                path.to_owned(),
                FsCapacity {
                    blocks,
                    blocks_available,
                    block_size,
                },
            );
        }

        fn remove(&self, path: &str) {
            self.capacities.borrow_mut().remove(path);
        }
    }

    impl FsStatProvider for FakeStats {
        fn capacity(&self, mount_point: &Path) -> io::Result<FsCapacity> {
            let key = mount_point.to_string_lossy().into_owned();
            self.queried.borrow_mut().push(key.clone());
            self.capacities
                .borrow()
                .get(&key)
                .copied()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    const MTAB: &str = "\
/dev/sda1 / ext4 rw,relatime,errors=remount-ro 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,noexec,relatime,size=1632464k,mode=755 0 0
/dev/sda2 /home ext4 rw,relatime 0 0
server:/export /mnt/nfs nfs4 rw,relatime 0 0
";

    fn fake_stats() -> FakeStats {
        FakeStats::default()
            .with("/", 2_048_000, 1_024_000, 4096)
            .with("/home", 4096, 1024, 4096)
    }

    fn refresh(parser: &mut MountUsageParser<FakeStats>, data: &str) {
        parser
            .refresh_from_reader(data.as_bytes(), Path::new("/dummy"))
            .unwrap();
    }

    #[test]
    fn test_denylisted_types_are_excluded() {
        let mut parser = MountUsageParser::with_stat_provider("/dummy", fake_stats());
        refresh(&mut parser, MTAB);

        assert_eq!(parser.mount_paths(), vec!["/".to_owned(), "/home".to_owned()]);
        assert_eq!(
            parser.report(&"/run".to_owned()).unwrap_err(),
            LookupError::UnknownMount("/run".to_owned())
        );
        assert_eq!(*parser.stats.queried.borrow(), vec!["/", "/home"]);
    }

    #[test]
    fn test_usage_attributes() {
        let mut parser = MountUsageParser::with_stat_provider("/dummy", fake_stats());
        refresh(&mut parser, MTAB);

        let root = parser.report(&"/".to_owned()).unwrap();
        assert_eq!(root["size"], (2000u64 * 4096).to_string());
        assert_eq!(root["avail"], (1000u64 * 4096).to_string());
        assert_eq!(root["usage"], "50.00");

        let home = parser.report(&"/home".to_owned()).unwrap();
        assert_eq!(home["size"], "16384");
        assert_eq!(home["avail"], "4096");
        assert_eq!(home["usage"], "75.00");
        assert_eq!(home.len(), 3);
    }

    #[test]
    fn test_zero_blocks_is_skipped() {
        let stats = FakeStats::default().with("/", 0, 0, 4096);
        let mut parser = MountUsageParser::with_stat_provider("/dummy", stats);
        refresh(&mut parser, "/dev/sda1 / ext4 rw 0 0\n");
        assert!(parser.mount_paths().is_empty());
    }

    #[test]
    fn test_stat_failure_keeps_previous_entry() {
        let mut parser = MountUsageParser::with_stat_provider("/dummy", fake_stats());
        refresh(&mut parser, MTAB);

        parser.stats.remove("/home");
        parser.stats.set("/", 2_048_000, 2_048_000, 4096);
        refresh(&mut parser, MTAB);

        assert_eq!(parser.mount_paths(), vec!["/".to_owned(), "/home".to_owned()]);
        assert_eq!(parser.report(&"/".to_owned()).unwrap()["usage"], "0.00");
        assert_eq!(parser.report(&"/home".to_owned()).unwrap()["usage"], "75.00");
    }

    #[test]
    fn test_stat_failure_without_previous_entry_is_absent() {
        let stats = FakeStats::default().with("/", 2048, 1024, 4096);
        let mut parser = MountUsageParser::with_stat_provider("/dummy", stats);
        refresh(&mut parser, MTAB);
        assert_eq!(parser.mount_paths(), vec!["/".to_owned()]);
    }

    #[test]
    fn test_unmounted_path_is_dropped() {
        let mut parser = MountUsageParser::with_stat_provider("/dummy", fake_stats());
        refresh(&mut parser, MTAB);
        refresh(&mut parser, "/dev/sda1 / ext4 rw 0 0\n");
        assert_eq!(parser.mount_paths(), vec!["/".to_owned()]);
    }

    #[test]
    fn test_malformed_and_comment_lines_are_skipped() {
        let data = "\
# comment
/dev/sda1 /
/dev/sda2 /home ext4 rw 0 0
";
        let mut parser = MountUsageParser::with_stat_provider("/dummy", fake_stats());
        refresh(&mut parser, data);
        assert_eq!(parser.mount_paths(), vec!["/home".to_owned()]);
    }

    #[test]
    fn test_non_utf8_mount_point_is_skipped() {
        let data: &[u8] = b"/dev/sda1 / ext4 rw 0 0
/dev/sdc1 /media/caf\xE9 vfat rw 0 0
/dev/sda2 /home ext4 rw 0 0
";
        let mut parser = MountUsageParser::with_stat_provider("/dummy", fake_stats());
        parser
            .refresh_from_reader(data, Path::new("/dummy"))
            .unwrap();

        assert_eq!(parser.mount_paths(), vec!["/".to_owned(), "/home".to_owned()]);
    }

    #[test]
    fn test_escaped_mount_point() {
        let stats = FakeStats::default().with("/media/usb stick", 1024, 512, 1024);
        let mut parser = MountUsageParser::with_stat_provider("/dummy", stats);
        refresh(&mut parser, "/dev/sdb1 /media/usb\\040stick vfat rw 0 0\n");

        let usb = parser.report(&"/media/usb stick".to_owned()).unwrap();
        assert_eq!(usb["size"], "1024");
        assert_eq!(usb["usage"], "50.00");
    }

    #[test]
    fn test_unreadable_mount_table_keeps_previous_snapshot() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{MTAB}").unwrap();

        let mut parser = MountUsageParser::with_stat_provider(tmp.path(), fake_stats());
        parser.refresh().unwrap();
        assert_eq!(parser.entities().len(), 2);
        drop(tmp);

        assert!(matches!(
            parser.refresh().unwrap_err(),
            RefreshError::SourceUnavailable(_)
        ));
        assert_eq!(parser.entities().len(), 2);
        assert_eq!(parser.report(&"/".to_owned()).unwrap()["usage"], "50.00");
    }

    #[test]
    fn test_denylist_lookup() {
        assert!(is_denied_fs_type("tmpfs"));
        assert!(is_denied_fs_type("nfs4"));
        assert!(!is_denied_fs_type("ext4"));
        assert!(!is_denied_fs_type("xfs"));
    }
}
