//! Mount table access: the line parser for `/etc/mtab`-style files and the
//! capacity query used for each mount point.
mod parser;
mod statfs;

pub use parser::{MountEntry, MountField, ParseError, is_ignorable_line, parse_mount_entry_line};
pub use statfs::{FsCapacity, FsStatProvider, Statvfs};
