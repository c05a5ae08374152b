use crate::collectors::{
    finite_cores, percent_of, CpuInfo, DiskUsage, ProbeError, RawProcess, SystemProbe, VirtualMemory,
};
use std::path::Path;
use sysinfo::{CpuExt, DiskExt, PidExt, ProcessExt, System, SystemExt};
use tracing::debug;

/// `SystemProbe` over a long-lived `sysinfo::System`.
pub struct SysinfoProbe {
    system: System,
    disks_listed: bool,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // Baseline for the first utilization delta.
        system.refresh_cpu();
        system.refresh_processes();
        Self {
            system,
            disks_listed: false,
        }
    }
}

impl SystemProbe for SysinfoProbe {
    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(ProbeError::Unavailable {
                what: "память",
                reason: "система сообщила нулевой объём памяти".to_string(),
            });
        }
        let used_bytes = self.system.used_memory();
        Ok(VirtualMemory {
            total_bytes,
            used_bytes,
            free_bytes: self.system.free_memory(),
            used_percent: percent_of(used_bytes, total_bytes),
        })
    }

    fn cpu_info(&mut self) -> Result<Vec<CpuInfo>, ProbeError> {
        let cpus: Vec<CpuInfo> = self
            .system
            .cpus()
            .iter()
            .map(|c| CpuInfo {
                model_name: c.brand().trim().to_string(),
            })
            .collect();
        if cpus.is_empty() {
            return Err(ProbeError::Unavailable {
                what: "сведения о процессоре",
                reason: "список процессоров пуст".to_string(),
            });
        }
        Ok(cpus)
    }

    fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>, ProbeError> {
        self.system.refresh_cpu();
        let cores: Vec<f64> = self
            .system
            .cpus()
            .iter()
            .map(|c| c.cpu_usage() as f64)
            .collect();
        if cores.is_empty() {
            return Err(ProbeError::Unavailable {
                what: "загрузка ядер",
                reason: "список процессоров пуст".to_string(),
            });
        }
        finite_cores(cores)
    }

    fn disk_usage(&mut self, mount: &Path) -> Result<DiskUsage, ProbeError> {
        if self.disks_listed {
            self.system.refresh_disks();
        } else {
            self.system.refresh_disks_list();
            self.disks_listed = true;
        }

        let disk = self
            .system
            .disks()
            .iter()
            .find(|d| d.mount_point() == mount)
            .ok_or_else(|| ProbeError::MountNotFound(mount.display().to_string()))?;

        // Only total and available space are exposed; reserved blocks count as used.
        let total_bytes = disk.total_space();
        let free_bytes = disk.available_space();
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        Ok(DiskUsage {
            total_bytes,
            used_bytes,
            free_bytes,
            used_percent: percent_of(used_bytes, total_bytes),
        })
    }

    fn processes(&mut self) -> Result<Vec<RawProcess>, ProbeError> {
        self.system.refresh_processes();

        let mut out: Vec<RawProcess> = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                let name = process.name();
                let cpu = process.cpu_usage() as f64;
                RawProcess {
                    pid,
                    name: if name.is_empty() {
                        Err(ProbeError::ProcessField { pid, field: "name" })
                    } else {
                        Ok(name.to_string())
                    },
                    cpu_percent: if cpu.is_finite() {
                        Ok(cpu)
                    } else {
                        Err(ProbeError::ProcessField {
                            pid,
                            field: "cpuPercent",
                        })
                    },
                    resident_bytes: Ok(process.memory()),
                }
            })
            .collect();
        // sysinfo keeps processes in a map; restore /proc listing order.
        out.sort_by_key(|p| p.pid);
        debug!(count = out.len(), "таблица процессов прочитана");
        Ok(out)
    }
}
