//! The collector facade: one instance of every snapshot parser behind a single
//! entity-addressed status interface.
//!
//! A status request first refreshes the parser that owns the entity and then
//! looks the entity up in the fresh snapshot:
//!
//! | refresh | lookup | level   | message                    | values        |
//! |---------|--------|---------|----------------------------|---------------|
//! | ok      | ok     | `OK`    | `OK`                       | current       |
//! | ok      | failed | `ERROR` | lookup error               | none          |
//! | failed  | ok     | `ERROR` | `update failed: <error>`   | last good     |
//! | failed  | failed | `ERROR` | `update failed: <error>`   | none          |

use std::fmt;
use std::path::PathBuf;

use crate::config::Config;
use crate::mounttab::{FsStatProvider, Statvfs};
use crate::report::{Severity, StatusReport};
use crate::stats::{
    CpuSlot, LoadAverageParser, MemoryInfoParser, MountUsageParser, ProcessorInfoParser,
    ProcessorTimeParser, RefreshError, SnapshotParser,
};

const LOG_TARGET: &str = "collector";

/// Addresses one monitored entity across all parsers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Processor(usize),
    CpuTime(CpuSlot),
    Mount(String),
    LoadAverage,
    Memory,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Processor(index) => write!(f, "Processor {index}"),
            EntityId::CpuTime(CpuSlot::Aggregate) => write!(f, "CPU Time total"),
            EntityId::CpuTime(CpuSlot::Processor(index)) => write!(f, "CPU Time {index}"),
            EntityId::Mount(path) => write!(f, "Disk {path}"),
            EntityId::LoadAverage => write!(f, "Load Average"),
            EntityId::Memory => write!(f, "Memory"),
        }
    }
}

/// Owns one instance of every parser and renders their snapshots as status reports.
#[derive(Debug)]
pub struct Collector<S = Statvfs> {
    hardware_id: String,
    cpuinfo: ProcessorInfoParser,
    cputime: ProcessorTimeParser,
    diskusage: MountUsageParser<S>,
    loadavg: LoadAverageParser,
    meminfo: MemoryInfoParser,
}

impl Collector<Statvfs> {
    /// Creates a collector reading from the sources named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = CollectorBuilder::new(config.resolve_hardware_id());
        builder
            .set_cpuinfo_file(config.cpuinfo_path())
            .set_stat_file(config.stat_path())
            .set_mount_table(&config.mount_table)
            .set_loadavg_file(config.loadavg_path())
            .set_meminfo_file(config.meminfo_path())
            .set_meminfo_keys(config.meminfo_keys.iter().cloned());
        builder.build()
    }
}

impl<S: FsStatProvider> Collector<S> {
    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    /// Lists every entity present in the current snapshots.
    ///
    /// The singletons (load average, memory) are always listed.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities: Vec<EntityId> = self
            .cpuinfo
            .entities()
            .into_iter()
            .map(EntityId::Processor)
            .collect();
        entities.extend(self.cputime.entities().into_iter().map(EntityId::CpuTime));
        entities.extend(self.diskusage.entities().into_iter().map(EntityId::Mount));
        entities.push(EntityId::LoadAverage);
        entities.push(EntityId::Memory);
        entities
    }

    /// Refreshes the parser that owns `id` and reports the entity's status.
    pub fn status(&mut self, id: &EntityId) -> StatusReport {
        let name = id.to_string();
        let hardware_id = self.hardware_id.as_str();
        match id {
            EntityId::Processor(index) => {
                let refreshed = refresh_logged(&mut self.cpuinfo, "cpuinfo");
                render(name, hardware_id, &self.cpuinfo, index, &refreshed)
            }
            EntityId::CpuTime(slot) => {
                let refreshed = refresh_logged(&mut self.cputime, "cputime");
                render(name, hardware_id, &self.cputime, slot, &refreshed)
            }
            EntityId::Mount(path) => {
                let refreshed = refresh_logged(&mut self.diskusage, "diskusage");
                render(name, hardware_id, &self.diskusage, path, &refreshed)
            }
            EntityId::LoadAverage => {
                let refreshed = refresh_logged(&mut self.loadavg, "loadavg");
                render(name, hardware_id, &self.loadavg, &(), &refreshed)
            }
            EntityId::Memory => {
                let refreshed = refresh_logged(&mut self.meminfo, "meminfo");
                render(name, hardware_id, &self.meminfo, &(), &refreshed)
            }
        }
    }

    /// Refreshes every parser once and reports every entity.
    pub fn collect(&mut self) -> Vec<StatusReport> {
        let cpuinfo = refresh_logged(&mut self.cpuinfo, "cpuinfo");
        let cputime = refresh_logged(&mut self.cputime, "cputime");
        let diskusage = refresh_logged(&mut self.diskusage, "diskusage");
        let loadavg = refresh_logged(&mut self.loadavg, "loadavg");
        let meminfo = refresh_logged(&mut self.meminfo, "meminfo");

        let hardware_id = self.hardware_id.as_str();
        self.entities()
            .into_iter()
            .map(|id| {
                let name = id.to_string();
                match &id {
                    EntityId::Processor(index) => {
                        render(name, hardware_id, &self.cpuinfo, index, &cpuinfo)
                    }
                    EntityId::CpuTime(slot) => {
                        render(name, hardware_id, &self.cputime, slot, &cputime)
                    }
                    EntityId::Mount(path) => {
                        render(name, hardware_id, &self.diskusage, path, &diskusage)
                    }
                    EntityId::LoadAverage => {
                        render(name, hardware_id, &self.loadavg, &(), &loadavg)
                    }
                    EntityId::Memory => render(name, hardware_id, &self.meminfo, &(), &meminfo),
                }
            })
            .collect()
    }
}

fn refresh_logged<P: SnapshotParser>(parser: &mut P, source: &str) -> Result<(), RefreshError> {
    let result = parser.refresh();
    if let Err(err) = &result {
        log::error!(target: LOG_TARGET, "failed to refresh {source}: {err}");
    }
    result
}

fn render<P: SnapshotParser>(
    name: String,
    hardware_id: &str,
    parser: &P,
    entity: &P::Entity,
    refreshed: &Result<(), RefreshError>,
) -> StatusReport {
    let mut report = StatusReport::new(name, hardware_id);
    match (refreshed, parser.report(entity)) {
        (Ok(()), Ok(table)) => {
            report.summary(Severity::Ok, "OK").add_all(table);
        }
        (Ok(()), Err(err)) => {
            report.summary(Severity::Error, err.to_string());
        }
        (Err(err), Ok(table)) => {
            report
                .summary(Severity::Error, format!("update failed: {err}"))
                .add_all(table);
        }
        (Err(err), Err(_)) => {
            report.summary(Severity::Error, format!("update failed: {err}"));
        }
    }
    report
}

/// Assembles a [`Collector`] from individual source paths.
#[derive(Debug)]
pub struct CollectorBuilder<S = Statvfs> {
    hardware_id: String,
    cpuinfo_file: PathBuf,
    stat_file: PathBuf,
    mount_table: PathBuf,
    loadavg_file: PathBuf,
    meminfo_file: PathBuf,
    meminfo_keys: Vec<String>,
    stats: S,
}

impl CollectorBuilder<Statvfs> {
    /// Starts a builder with the default `/proc` and `/etc/mtab` sources.
    pub fn new(hardware_id: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            hardware_id: hardware_id.into(),
            cpuinfo_file: defaults.cpuinfo_path(),
            stat_file: defaults.stat_path(),
            mount_table: defaults.mount_table.clone(),
            loadavg_file: defaults.loadavg_path(),
            meminfo_file: defaults.meminfo_path(),
            meminfo_keys: defaults.meminfo_keys,
            stats: Statvfs,
        }
    }
}

impl<S: FsStatProvider> CollectorBuilder<S> {
    pub fn set_cpuinfo_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.cpuinfo_file = path.into();
        self
    }

    pub fn set_stat_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.stat_file = path.into();
        self
    }

    pub fn set_mount_table(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.mount_table = path.into();
        self
    }

    pub fn set_loadavg_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.loadavg_file = path.into();
        self
    }

    pub fn set_meminfo_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.meminfo_file = path.into();
        self
    }

    /// Restricts the memory report to these `/proc/meminfo` keys.
    pub fn set_meminfo_keys(&mut self, keys: impl IntoIterator<Item = String>) -> &mut Self {
        self.meminfo_keys = keys.into_iter().collect();
        self
    }

    /// Replaces the capacity provider used for mount points.
    pub fn with_stat_provider<T: FsStatProvider>(self, stats: T) -> CollectorBuilder<T> {
        CollectorBuilder {
            hardware_id: self.hardware_id,
            cpuinfo_file: self.cpuinfo_file,
            stat_file: self.stat_file,
            mount_table: self.mount_table,
            loadavg_file: self.loadavg_file,
            meminfo_file: self.meminfo_file,
            meminfo_keys: self.meminfo_keys,
            stats,
        }
    }

    /// Builds the collector. No source is read until the first refresh.
    pub fn build(self) -> Collector<S> {
        Collector {
            hardware_id: self.hardware_id,
            cpuinfo: ProcessorInfoParser::new(self.cpuinfo_file),
            cputime: ProcessorTimeParser::new(self.stat_file),
            diskusage: MountUsageParser::with_stat_provider(self.mount_table, self.stats),
            loadavg: LoadAverageParser::new(self.loadavg_file),
            meminfo: MemoryInfoParser::new(self.meminfo_file).with_allowlist(self.meminfo_keys),
        }
    }
}
