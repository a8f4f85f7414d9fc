//! Computing resources offered for rental.
//!
//! CPU and GPU units are the closed `Hardware` variant set; the shared
//! fields live on `Resource` itself. A resource is `InUse` exactly while
//! one active rental record references it.

use crate::credits::Credits;
use cirrus_common::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource families known to the billing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cpu,
    Gpu,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Cpu => write!(f, "cpu"),
            ResourceKind::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ResourceKind::Cpu),
            "gpu" => Ok(ResourceKind::Gpu),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Idle,
    InUse,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Idle => write!(f, "idle"),
            ResourceStatus::InUse => write!(f, "in use"),
        }
    }
}

/// Variant-specific hardware attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Hardware {
    Cpu { cores: u32, clock_ghz: f64 },
    Gpu { parallel_cores: u32, vram_gb: u32 },
}

impl Hardware {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Hardware::Cpu { .. } => ResourceKind::Cpu,
            Hardware::Gpu { .. } => ResourceKind::Gpu,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Hardware::Cpu { cores, clock_ghz } => format!("{cores} cores @ {clock_ghz} GHz"),
            Hardware::Gpu {
                parallel_cores,
                vram_gb,
            } => format!("{parallel_cores} cores, {vram_gb} GB VRAM"),
        }
    }
}

/// A rentable computing unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub status: ResourceStatus,
    /// Per-unit hourly rate; a zero rate delegates to the kind-level
    /// billing rule.
    pub hourly_rate: Credits,
    pub storage_gb: u32,
    pub hardware: Hardware,
}

impl Resource {
    pub fn new(
        id: ResourceId,
        name: impl Into<String>,
        hourly_rate: Credits,
        storage_gb: u32,
        hardware: Hardware,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            status: ResourceStatus::Idle,
            hourly_rate,
            storage_gb,
            hardware,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.hardware.kind()
    }

    pub fn is_available(&self) -> bool {
        self.status == ResourceStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu() -> Resource {
        Resource::new(
            ResourceId::new("CPU001"),
            "Intel Xeon Platinum 8380",
            Credits::from_f64(4.0).unwrap(),
            512,
            Hardware::Cpu {
                cores: 40,
                clock_ghz: 2.3,
            },
        )
    }

    #[test]
    fn new_resources_start_idle() {
        let resource = cpu();
        assert_eq!(resource.status, ResourceStatus::Idle);
        assert!(resource.is_available());
        assert_eq!(resource.kind(), ResourceKind::Cpu);
    }

    #[test]
    fn availability_follows_status() {
        let mut resource = cpu();
        resource.status = ResourceStatus::InUse;
        assert!(!resource.is_available());
    }

    #[test]
    fn kind_parses_both_cases() {
        assert_eq!("GPU".parse::<ResourceKind>().unwrap(), ResourceKind::Gpu);
        assert!("tpu".parse::<ResourceKind>().is_err());
    }
}
