use crate::collectors::{
    CpuInfo, DiskUsage, ProbeError, RawProcess, SystemProbe, VirtualMemory,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted probe for tests. Each process is `(pid, name)`; a `None` name
/// simulates an unreadable attribute.
pub struct FakeProbe {
    pub memory_fails: bool,
    pub cpu_info: Vec<CpuInfo>,
    pub cores: Vec<f64>,
    pub processes: Vec<(u32, Option<&'static str>)>,
    pub disk_mount: &'static str,
    calls: Arc<AtomicUsize>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self {
            memory_fails: false,
            cpu_info: vec![CpuInfo {
                model_name: "Fake CPU @ 3.00GHz".to_string(),
            }],
            cores: vec![10.0, 20.0, 30.0],
            processes: vec![(1, Some("init")), (42, Some("worker"))],
            disk_mount: "/",
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_memory() -> Self {
        Self {
            memory_fails: true,
            ..Self::new()
        }
    }

    /// Number of `virtual_memory` calls, i.e. assembly attempts.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl SystemProbe for FakeProbe {
    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.memory_fails {
            return Err(ProbeError::Unavailable {
                what: "память",
                reason: "сбой имитации".to_string(),
            });
        }
        Ok(VirtualMemory {
            total_bytes: 8 * 1024 * 1024 * 1024,
            used_bytes: 2 * 1024 * 1024 * 1024,
            free_bytes: 5 * 1024 * 1024 * 1024,
            used_percent: 25.0,
        })
    }

    fn cpu_info(&mut self) -> Result<Vec<CpuInfo>, ProbeError> {
        Ok(self.cpu_info.clone())
    }

    fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>, ProbeError> {
        Ok(self.cores.clone())
    }

    fn disk_usage(&mut self, mount: &Path) -> Result<DiskUsage, ProbeError> {
        if mount != Path::new(self.disk_mount) {
            return Err(ProbeError::MountNotFound(mount.display().to_string()));
        }
        Ok(DiskUsage {
            total_bytes: 100 * 1024 * 1024 * 1024,
            used_bytes: 40 * 1024 * 1024 * 1024,
            free_bytes: 60 * 1024 * 1024 * 1024,
            used_percent: 40.0,
        })
    }

    fn processes(&mut self) -> Result<Vec<RawProcess>, ProbeError> {
        Ok(self
            .processes
            .iter()
            .map(|(pid, name)| RawProcess {
                pid: *pid,
                name: name
                    .map(str::to_string)
                    .ok_or(ProbeError::ProcessField {
                        pid: *pid,
                        field: "name",
                    }),
                cpu_percent: Ok(1.23456),
                resident_bytes: Ok(4 * 1024 * 1024),
            })
            .collect())
    }
}
