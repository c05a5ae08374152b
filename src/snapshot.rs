use crate::units::{convert, GIB, KIB, MIB};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageQuantity {
    pub bytes: u64,
    #[serde(rename = "KiB")]
    pub kib: f64,
    #[serde(rename = "MiB")]
    pub mib: f64,
    #[serde(rename = "GiB")]
    pub gib: f64,
}

impl StorageQuantity {
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            bytes,
            kib: convert(bytes, KIB),
            mib: convert(bytes, MIB),
            gib: convert(bytes, GIB),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReading {
    pub capacity: StorageQuantity,
    pub usage: StorageQuantity,
    pub availability: StorageQuantity,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskReading {
    pub capacity: StorageQuantity,
    pub usage: StorageQuantity,
    pub availability: StorageQuantity,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuReading {
    pub model_name: String,
    pub cores: Vec<f64>,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReading {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_usage: StorageQuantity,
}

/// One tick worth of readings, serialized as the `sysInfo` event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub memory: MemoryReading,
    pub cpu: CpuReading,
    pub disk: DiskReading,
    pub processes: Vec<ProcessReading>,
}
