pub mod heuristic;
pub mod interfaces;
pub mod wifi;

use crate::collectors::SampleError;
use crate::state::now_unix;
use heuristic::{assess, SwitchDecision, TopologyReport};
use interfaces::{active_interfaces, InterfaceSource, NetworkInterfaceInfo};
use serde::Serialize;
use tracing::{error, info, warn};
use wifi::{PowerState, ToggleOutcome, WifiToggler};

#[derive(Debug, Clone, Serialize)]
pub struct NetworkCheck {
    pub checked_at_unix: i64,
    pub wifi_device: Option<String>,
    pub interfaces: Vec<NetworkInterfaceInfo>,
    pub report: TopologyReport,
    pub action: Option<PowerState>,
    pub outcome: Option<ToggleOutcome>,
}

pub struct NetworkSwitcher {
    interfaces: Box<dyn InterfaceSource>,
    toggler: WifiToggler,
}

impl NetworkSwitcher {
    pub fn new(interfaces: Box<dyn InterfaceSource>, toggler: WifiToggler) -> Self {
        Self {
            interfaces,
            toggler,
        }
    }

    fn inspect(&self) -> Result<(Option<String>, Vec<NetworkInterfaceInfo>, TopologyReport), SampleError> {
        let wifi_device = self.interfaces.wifi_device();
        let raw = self.interfaces.raw_interfaces()?;
        let active = active_interfaces(&raw, wifi_device.as_deref());
        let report = assess(&active);
        Ok((wifi_device, active, report))
    }

    /// Blocking: runs OS commands. Call from a worker thread.
    pub fn check_and_switch(&self) -> Result<NetworkCheck, SampleError> {
        let (wifi_device, interfaces, report) = self.inspect()?;
        info!(
            interfaces = interfaces.len(),
            ethernet = report.has_ethernet,
            wifi = report.has_wifi,
            ethernet_subnet = report.ethernet_subnet.as_deref().unwrap_or("-"),
            wifi_subnet = report.wifi_subnet.as_deref().unwrap_or("-"),
            "проверка сети"
        );
        if report.has_ethernet && report.ethernet_subnet.is_none() {
            warn!("проводная сеть подключена, но подсеть не определена");
        }
        if report.has_wifi && report.wifi_subnet.is_none() {
            warn!("Wi-Fi подключён, но подсеть не определена");
        }

        let action = match report.decision {
            SwitchDecision::DisableWifi => {
                info!("проводная сеть в той же подсети, что и Wi-Fi: отключаем Wi-Fi");
                Some(PowerState::Off)
            }
            SwitchDecision::EnableWifi => {
                info!("нет активных подключений: включаем Wi-Fi");
                Some(PowerState::On)
            }
            SwitchDecision::NoChange => None,
        };

        let outcome = action.map(|state| {
            let outcome = self.toggler.set_power(wifi_device.as_deref(), state);
            match &outcome {
                ToggleOutcome::Failed {
                    primary_error,
                    fallback_error,
                } => error!(
                    %state,
                    primary = %primary_error,
                    fallback = %fallback_error,
                    "не удалось переключить Wi-Fi"
                ),
                ToggleOutcome::FallbackApplied { primary_error } => warn!(
                    %state,
                    primary = %primary_error,
                    "Wi-Fi переключён запасным способом"
                ),
                ToggleOutcome::Applied => info!(%state, "Wi-Fi переключён"),
            }
            outcome
        });

        Ok(NetworkCheck {
            checked_at_unix: now_unix(),
            wifi_device,
            interfaces,
            report,
            action,
            outcome,
        })
    }
}

#[cfg(test)]
pub mod fake {
    use super::interfaces::{InterfaceSource, RawInterface};
    use crate::collectors::SampleError;

    pub struct FakeInterfaces {
        pub wifi_device: Option<String>,
        pub raw: Result<Vec<RawInterface>, &'static str>,
    }

    impl FakeInterfaces {
        pub fn up(name: &str, ip: &str, mask: &str) -> RawInterface {
            RawInterface {
                name: name.to_string(),
                up: true,
                loopback: false,
                ipv4_address: Some(ip.to_string()),
                netmask: Some(mask.to_string()),
            }
        }
    }

    impl InterfaceSource for FakeInterfaces {
        fn wifi_device(&self) -> Option<String> {
            self.wifi_device.clone()
        }

        fn raw_interfaces(&self) -> Result<Vec<RawInterface>, SampleError> {
            self.raw.clone().map_err(SampleError::Unavailable)
        }
    }
}
