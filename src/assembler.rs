use crate::collectors::{finite_cores, ProbeError, RawProcess, SystemProbe};
use crate::snapshot::{
    CpuReading, DiskReading, MemoryReading, ProcessReading, StorageQuantity, SystemSnapshot,
};
use crate::units::{average, round3};
use std::path::PathBuf;
use tracing::warn;

/// Builds `SystemSnapshot`s from a probe that it owns for its whole lifetime.
pub struct Assembler<P> {
    probe: P,
    disk_mount: PathBuf,
    include_processes: bool,
}

impl<P: SystemProbe> Assembler<P> {
    pub fn new(probe: P, disk_mount: impl Into<PathBuf>, include_processes: bool) -> Self {
        Self {
            probe,
            disk_mount: disk_mount.into(),
            include_processes,
        }
    }

    /// Memory, CPU, disk and the process enumeration are all-or-nothing;
    /// unreadable attributes of a single process are not.
    pub fn assemble(&mut self) -> Result<SystemSnapshot, ProbeError> {
        let mem = self.probe.virtual_memory()?;
        let cpu_info = self.probe.cpu_info()?;
        let model_name = cpu_info
            .into_iter()
            .next()
            .map(|c| c.model_name)
            .ok_or_else(|| ProbeError::Unavailable {
                what: "сведения о процессоре",
                reason: "список процессоров пуст".to_string(),
            })?;
        let cores: Vec<f64> = finite_cores(self.probe.cpu_percent_per_core()?)?
            .into_iter()
            .map(round3)
            .collect();
        let disk = self.probe.disk_usage(&self.disk_mount)?;

        let processes = if self.include_processes {
            self.probe
                .processes()?
                .into_iter()
                .map(process_reading)
                .collect()
        } else {
            Vec::new()
        };

        Ok(SystemSnapshot {
            memory: MemoryReading {
                capacity: StorageQuantity::from_bytes(mem.total_bytes),
                usage: StorageQuantity::from_bytes(mem.used_bytes),
                availability: StorageQuantity::from_bytes(mem.free_bytes),
                used_percent: round3(mem.used_percent),
            },
            cpu: CpuReading {
                model_name,
                used_percent: average(&cores),
                cores,
            },
            disk: DiskReading {
                capacity: StorageQuantity::from_bytes(disk.total_bytes),
                usage: StorageQuantity::from_bytes(disk.used_bytes),
                availability: StorageQuantity::from_bytes(disk.free_bytes),
                used_percent: round3(disk.used_percent),
            },
            processes,
        })
    }
}

fn process_reading(raw: RawProcess) -> ProcessReading {
    let pid = raw.pid;
    ProcessReading {
        pid,
        name: value_or_default(raw.name, pid, "name"),
        cpu_percent: round3(value_or_default(raw.cpu_percent, pid, "cpuPercent")),
        memory_usage: StorageQuantity::from_bytes(value_or_default(
            raw.resident_bytes,
            pid,
            "memoryUsage",
        )),
    }
}

fn value_or_default<T: Default>(attr: Result<T, ProbeError>, pid: u32, field: &str) -> T {
    attr.unwrap_or_else(|err| {
        warn!(pid, field, error = %err, "не удалось прочитать атрибут процесса");
        T::default()
    })
}
