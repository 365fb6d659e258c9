//! Runtime configuration, read from environment variables.
//!
//! | variable               | default     |
//! |------------------------|-------------|
//! | `SYSMON_PROC_ROOT`     | `/proc`     |
//! | `SYSMON_MOUNT_TABLE`   | `/etc/mtab` |
//! | `SYSMON_INTERVAL_SECS` | `1`         |
//! | `SYSMON_HARDWARE_ID`   | host name   |
//! | `SYSMON_MEMINFO_KEYS`  | all keys    |

use std::ffi::OsString;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fsutil;

pub const PROC_ROOT_VAR: &str = "SYSMON_PROC_ROOT";
pub const MOUNT_TABLE_VAR: &str = "SYSMON_MOUNT_TABLE";
pub const INTERVAL_VAR: &str = "SYSMON_INTERVAL_SECS";
pub const HARDWARE_ID_VAR: &str = "SYSMON_HARDWARE_ID";
pub const MEMINFO_KEYS_VAR: &str = "SYSMON_MEMINFO_KEYS";

const DEFAULT_PROC_ROOT: &str = "/proc";
const DEFAULT_MOUNT_TABLE: &str = "/etc/mtab";
const DEFAULT_INTERVAL_SECS: u64 = 1;
const ETC_HOSTNAME: &str = "/etc/hostname";
const UNKNOWN_HARDWARE_ID: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `{name}` is not valid unicode")]
    NotUnicode { name: &'static str },
    #[error("invalid value for `{name}`: '{value}': {source}")]
    InvalidInterval {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("`{name}` must be greater than zero")]
    ZeroInterval { name: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the procfs sources (`cpuinfo`, `stat`, `loadavg`, `meminfo`).
    pub proc_root: PathBuf,
    /// Mount table listing the filesystems to report disk usage for.
    pub mount_table: PathBuf,
    /// Time between two collection ticks.
    pub interval: Duration,
    /// Explicit hardware id; the host name is used when unset.
    pub hardware_id: Option<String>,
    /// Keys of `/proc/meminfo` to report; empty means all.
    pub meminfo_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            mount_table: PathBuf::from(DEFAULT_MOUNT_TABLE),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            hardware_id: None,
            meminfo_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::NotUnicode`] if a string-valued variable is not valid unicode.
    /// - [`Error::InvalidInterval`] if the interval is not an integer.
    /// - [`Error::ZeroInterval`] if the interval is `0`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let var = |name: &'static str| lookup(name).filter(|value| !value.is_empty());
        let string_var = |name: &'static str| {
            var(name)
                .map(|value| value.into_string().map_err(|_| Error::NotUnicode { name }))
                .transpose()
        };

        let mut config = Self::default();

        if let Some(proc_root) = var(PROC_ROOT_VAR) {
            config.proc_root = PathBuf::from(proc_root);
        }
        if let Some(mount_table) = var(MOUNT_TABLE_VAR) {
            config.mount_table = PathBuf::from(mount_table);
        }
        if let Some(value) = string_var(INTERVAL_VAR)? {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|source| Error::InvalidInterval {
                    name: INTERVAL_VAR,
                    value: value.clone(),
                    source,
                })?;
            if secs == 0 {
                return Err(Error::ZeroInterval { name: INTERVAL_VAR });
            }
            config.interval = Duration::from_secs(secs);
        }
        config.hardware_id = string_var(HARDWARE_ID_VAR)?
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());
        if let Some(keys) = string_var(MEMINFO_KEYS_VAR)? {
            config.meminfo_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned)
                .collect();
        }

        Ok(config)
    }

    pub fn cpuinfo_path(&self) -> PathBuf {
        self.proc_root.join("cpuinfo")
    }

    pub fn stat_path(&self) -> PathBuf {
        self.proc_root.join("stat")
    }

    pub fn loadavg_path(&self) -> PathBuf {
        self.proc_root.join("loadavg")
    }

    pub fn meminfo_path(&self) -> PathBuf {
        self.proc_root.join("meminfo")
    }

    /// Returns the hardware id stamped on every report.
    ///
    /// Falls back to `gethostname(2)`, then the kernel host name file, then
    /// `/etc/hostname`, then `unknown`.
    pub fn resolve_hardware_id(&self) -> String {
        if let Some(id) = &self.hardware_id {
            return id.clone();
        }

        system_hostname().unwrap_or_else(|| {
            let kernel_hostname = self.proc_root.join("sys/kernel/hostname");
            hostname_from_files(&[kernel_hostname.as_path(), Path::new(ETC_HOSTNAME)])
        })
    }
}

fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name
            .into_string()
            .ok()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty()),
        Err(err) => {
            log::debug!("gethostname failed: {err}");
            None
        }
    }
}

fn hostname_from_files(candidates: &[&Path]) -> String {
    candidates
        .iter()
        .find_map(|path| fsutil::read_first_line(path))
        .unwrap_or_else(|| {
            log::warn!("could not determine host name, using `{UNKNOWN_HARDWARE_ID}`");
            UNKNOWN_HARDWARE_ID.to_owned()
        })
}
