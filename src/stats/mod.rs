//! Snapshot parsers for the kernel sources the probe reports on.
//!
//! Each parser owns the latest snapshot of exactly one source and implements
//! [`SnapshotParser`]:
//!
//! - [`ProcessorInfoParser`]: `/proc/cpuinfo`, one attribute table per processor.
//! - [`ProcessorTimeParser`]: the `cpu` lines of `/proc/stat`, aggregate and per processor.
//! - [`MountUsageParser`]: mount table plus `statvfs(3)`, one table per mount point.
//! - [`LoadAverageParser`]: `/proc/loadavg`, a single table.
//! - [`MemoryInfoParser`]: `/proc/meminfo`, a single table.
//!
//! Processor indices of [`ProcessorInfoParser`] and [`ProcessorTimeParser`] come
//! from different files and are not guaranteed to line up.

mod cpuinfo;
mod cputime;
mod diskusage;
mod error;
mod loadavg;
mod meminfo;
mod parser;

pub use cpuinfo::ProcessorInfoParser;
pub use cputime::{CPU_TIME_FIELDS, CpuSlot, ProcessorTimeParser};
pub use diskusage::{FS_DENYLIST, MountUsageParser, is_denied_fs_type};
pub use error::{LookupError, RefreshError};
pub use loadavg::{LOAD_AVERAGE_FIELDS, LoadAverageParser};
pub use meminfo::MemoryInfoParser;
pub use parser::{AttributeTable, SnapshotParser};
