use super::{BatteryState, MemorySample, SampleError, TelemetrySource};
use crate::calculators::CoreTicks;
use crate::config::SamplingConfig;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;
use sysinfo::{NetworkExt, NetworksExt, System, SystemExt};
use tracing::debug;

pub struct HostSource {
    system: System,
    interface_prefixes: Vec<String>,
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    command_timeout: Duration,
}

impl HostSource {
    pub fn new(cfg: &SamplingConfig) -> Self {
        Self {
            system: System::new(),
            interface_prefixes: cfg.interface_prefixes.clone(),
            command_timeout: Duration::from_millis(cfg.command_timeout_ms),
        }
    }
}

impl TelemetrySource for HostSource {
    fn network_bytes(&mut self) -> Result<(u64, u64), SampleError> {
        self.system.refresh_networks_list();
        self.system.refresh_networks();

        let mut rx = 0_u64;
        let mut tx = 0_u64;
        let mut matched = 0_usize;
        for (iface, data) in self.system.networks().iter() {
            if !matches_prefix(iface, &self.interface_prefixes) {
                continue;
            }
            matched += 1;
            rx = rx.saturating_add(data.total_received());
            tx = tx.saturating_add(data.total_transmitted());
            debug!(
                iface = %iface,
                rx = data.total_received(),
                tx = data.total_transmitted(),
                "счётчики интерфейса"
            );
        }
        if matched == 0 {
            return Err(SampleError::Unavailable("сетевые интерфейсы"));
        }
        debug!(rx, tx, interfaces = matched, "суммарные счётчики сети");
        Ok((rx, tx))
    }

    fn cpu_ticks(&mut self) -> Result<Vec<CoreTicks>, SampleError> {
        read_cpu_ticks()
    }

    fn memory(&mut self) -> Result<MemorySample, SampleError> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(SampleError::Unavailable("память"));
        }
        let used_bytes = self.native_used_memory().unwrap_or_else(|| self.system.used_memory());
        Ok(MemorySample {
            total_bytes,
            used_bytes,
        })
    }

    fn battery(&mut self) -> Result<BatteryState, SampleError> {
        self.read_battery()
    }
}

impl HostSource {
    #[cfg(target_os = "macos")]
    fn native_used_memory(&self) -> Option<u64> {
        let text = crate::command::run_command("vm_stat", &[], self.command_timeout)
            .map_err(|err| debug!(error = %err, "vm_stat недоступен"))
            .ok()?;
        super::probes::parse_vm_stat(&text)
            .map_err(|err| debug!(error = %err, "vm_stat не разобран"))
            .ok()
    }

    #[cfg(not(target_os = "macos"))]
    fn native_used_memory(&self) -> Option<u64> {
        None
    }

    #[cfg(target_os = "macos")]
    fn read_battery(&self) -> Result<BatteryState, SampleError> {
        let text = crate::command::run_command("pmset", &["-g", "batt"], self.command_timeout)?;
        Ok(super::probes::parse_pmset_batt(&text))
    }

    #[cfg(target_os = "linux")]
    fn read_battery(&self) -> Result<BatteryState, SampleError> {
        let root = "/sys/class/power_supply";
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(_) => return Ok(BatteryState::ABSENT),
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("BAT") {
                continue;
            }
            let dir = entry.path();
            let capacity = fs::read_to_string(dir.join("capacity")).unwrap_or_default();
            let status = fs::read_to_string(dir.join("status")).unwrap_or_default();
            let state = super::probes::parse_power_supply(&capacity, &status);
            if state.is_present {
                return Ok(state);
            }
        }
        Ok(BatteryState::ABSENT)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn read_battery(&self) -> Result<BatteryState, SampleError> {
        Ok(BatteryState::ABSENT)
    }
}

#[cfg(target_os = "macos")]
fn read_cpu_ticks() -> Result<Vec<CoreTicks>, SampleError> {
    super::mach::host_cpu_ticks()
}

#[cfg(target_os = "linux")]
fn read_cpu_ticks() -> Result<Vec<CoreTicks>, SampleError> {
    let path = "/proc/stat";
    let text = fs::read_to_string(path).map_err(|source| SampleError::Io {
        path: path.to_string(),
        source,
    })?;
    super::probes::parse_proc_stat(&text)
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn read_cpu_ticks() -> Result<Vec<CoreTicks>, SampleError> {
    Err(SampleError::Unavailable("счётчики тактов CPU"))
}

fn matches_prefix(iface: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| iface.starts_with(p.as_str()))
}
