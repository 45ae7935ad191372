#[cfg(target_os = "macos")]
mod mach;
pub mod probes;
pub mod system;

use crate::calculators::CoreTicks;
use crate::command::CommandError;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("ошибка чтения {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать {what}: {detail}")]
    Parse { what: &'static str, detail: String },
    #[error("{0} недоступно на этой платформе")]
    Unavailable(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MemorySample {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl MemorySample {
    pub fn usage_percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some(self.used_bytes as f64 / self.total_bytes as f64 * 100.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatteryState {
    pub percentage: Option<u8>,
    pub is_charging: bool,
    pub is_present: bool,
}

impl BatteryState {
    pub const ABSENT: Self = Self {
        percentage: None,
        is_charging: false,
        is_present: false,
    };

    pub fn display_text(&self) -> String {
        if !self.is_present {
            return crate::format::PLACEHOLDER.to_string();
        }
        let base = match self.percentage {
            Some(p) => p.to_string(),
            None => crate::format::PLACEHOLDER.to_string(),
        };
        if self.is_charging {
            format!("{base}⚡")
        } else {
            base
        }
    }
}

/// Raw OS counters. Every call is a one-shot read; implementations keep no derived state.
pub trait TelemetrySource: Send {
    fn network_bytes(&mut self) -> Result<(u64, u64), SampleError>;
    fn cpu_ticks(&mut self) -> Result<Vec<CoreTicks>, SampleError>;
    fn memory(&mut self) -> Result<MemorySample, SampleError>;
    fn battery(&mut self) -> Result<BatteryState, SampleError>;
}

#[derive(Debug, Clone, Default)]
pub struct HostSnapshot {
    pub network_bytes: Option<(u64, u64)>,
    pub cpu_ticks: Option<Vec<CoreTicks>>,
    pub memory: Option<MemorySample>,
    pub battery: Option<BatteryState>,
    pub failed: Vec<&'static str>,
}

pub fn collect_host(source: &mut dyn TelemetrySource) -> HostSnapshot {
    let mut snapshot = HostSnapshot::default();
    snapshot.network_bytes = keep("network", source.network_bytes(), &mut snapshot.failed);
    snapshot.cpu_ticks = keep("cpu", source.cpu_ticks(), &mut snapshot.failed);
    snapshot.memory = keep("memory", source.memory(), &mut snapshot.failed);
    snapshot.battery = keep("battery", source.battery(), &mut snapshot.failed);
    snapshot
}

fn keep<T>(
    collector: &'static str,
    result: Result<T, SampleError>,
    failed: &mut Vec<&'static str>,
) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(err) => {
            debug!(collector, error = %err, "сбор метрики не удался");
            failed.push(collector);
            None
        }
    }
}
