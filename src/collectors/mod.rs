#[cfg(test)]
pub mod fake;
pub mod system;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("не удалось получить {what}: {reason}")]
    Unavailable { what: &'static str, reason: String },
    #[error("точка монтирования {0} не найдена")]
    MountNotFound(String),
    #[error("процесс {pid}: не удалось прочитать поле {field}")]
    ProcessField { pid: u32, field: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMemory {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuInfo {
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
}

/// A process table entry. Each attribute is read independently and can fail
/// on its own.
#[derive(Debug)]
pub struct RawProcess {
    pub pid: u32,
    pub name: Result<String, ProbeError>,
    pub cpu_percent: Result<f64, ProbeError>,
    pub resident_bytes: Result<u64, ProbeError>,
}

/// Source of raw host readings.
///
/// Methods take `&mut self` because utilization figures are deltas against
/// the state left by the previous call; keep one probe alive per consumer.
pub trait SystemProbe {
    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError>;
    fn cpu_info(&mut self) -> Result<Vec<CpuInfo>, ProbeError>;
    /// Non-blocking: utilization since the previous call, in probe core order.
    fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>, ProbeError>;
    fn disk_usage(&mut self, mount: &Path) -> Result<DiskUsage, ProbeError>;
    fn processes(&mut self) -> Result<Vec<RawProcess>, ProbeError>;
}

impl<P: SystemProbe + ?Sized> SystemProbe for Box<P> {
    fn virtual_memory(&mut self) -> Result<VirtualMemory, ProbeError> {
        (**self).virtual_memory()
    }

    fn cpu_info(&mut self) -> Result<Vec<CpuInfo>, ProbeError> {
        (**self).cpu_info()
    }

    fn cpu_percent_per_core(&mut self) -> Result<Vec<f64>, ProbeError> {
        (**self).cpu_percent_per_core()
    }

    fn disk_usage(&mut self, mount: &Path) -> Result<DiskUsage, ProbeError> {
        (**self).disk_usage(mount)
    }

    fn processes(&mut self) -> Result<Vec<RawProcess>, ProbeError> {
        (**self).processes()
    }
}

/// Rejects a utilization sample containing NaN or infinite core values.
pub(crate) fn finite_cores(cores: Vec<f64>) -> Result<Vec<f64>, ProbeError> {
    match cores.iter().position(|c| !c.is_finite()) {
        Some(idx) => Err(ProbeError::Unavailable {
            what: "загрузка ядер",
            reason: format!("ядро {idx} вернуло нечисловое значение {}", cores[idx]),
        }),
        None => Ok(cores),
    }
}

pub(crate) fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}
