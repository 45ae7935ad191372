use crate::collectors::SampleError;
use crate::command::run_command;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Wifi,
    Other,
}

impl InterfaceKind {
    pub fn from_interface_name(name: &str) -> Self {
        if name.starts_with("en") {
            Self::Ethernet
        } else if name.starts_with("wi") || name.starts_with("wlan") {
            Self::Wifi
        } else {
            Self::Other
        }
    }

    pub fn classify(name: &str, wifi_device: Option<&str>) -> Self {
        if wifi_device == Some(name) {
            return Self::Wifi;
        }
        Self::from_interface_name(name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethernet => "ethernet",
            Self::Wifi => "wifi",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterfaceInfo {
    pub name: String,
    pub kind: InterfaceKind,
    pub ipv4_address: Option<String>,
    pub subnet_mask: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInterface {
    pub name: String,
    pub up: bool,
    pub loopback: bool,
    pub ipv4_address: Option<String>,
    pub netmask: Option<String>,
}

pub trait InterfaceSource: Send + Sync {
    fn wifi_device(&self) -> Option<String>;
    fn raw_interfaces(&self) -> Result<Vec<RawInterface>, SampleError>;
}

pub fn active_interfaces(raw: &[RawInterface], wifi_device: Option<&str>) -> Vec<NetworkInterfaceInfo> {
    let mut out = Vec::new();
    for entry in raw {
        if !entry.up || entry.loopback {
            continue;
        }
        let kind = InterfaceKind::classify(&entry.name, wifi_device);
        if kind == InterfaceKind::Other {
            continue;
        }
        let Some(ip) = entry.ipv4_address.as_deref() else {
            continue;
        };
        if parse_ipv4(ip).is_none() {
            continue;
        }
        debug!(
            iface = %entry.name,
            kind = kind.as_str(),
            ip,
            mask = entry.netmask.as_deref().unwrap_or("-"),
            "найден активный интерфейс"
        );
        out.push(NetworkInterfaceInfo {
            name: entry.name.clone(),
            kind,
            ipv4_address: Some(ip.to_string()),
            subnet_mask: entry.netmask.clone(),
        });
    }
    out
}

pub fn parse_ipv4(text: &str) -> Option<[u8; 4]> {
    let mut octets = [0_u8; 4];
    let mut parts = text.split('.');
    for slot in &mut octets {
        *slot = parts.next()?.parse::<u8>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

pub fn parse_ifconfig(text: &str) -> Vec<RawInterface> {
    let mut out: Vec<RawInterface> = Vec::new();
    let mut current: Option<RawInterface> = None;
    let mut current_has_inet = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indented = line.starts_with(|c: char| c.is_whitespace());
        if !indented {
            if let Some(iface) = current.take() {
                if !current_has_inet {
                    out.push(iface);
                }
            }
            current_has_inet = false;
            let Some((name, rest)) = line.split_once(':') else {
                continue;
            };
            let flags = rest
                .split_once('<')
                .and_then(|(_, tail)| tail.split_once('>'))
                .map(|(inner, _)| inner)
                .unwrap_or("");
            let has = |flag: &str| flags.split(',').any(|f| f == flag);
            current = Some(RawInterface {
                name: name.trim().to_string(),
                up: has("UP"),
                loopback: has("LOOPBACK"),
                ipv4_address: None,
                netmask: None,
            });
            continue;
        }

        let Some(iface) = current.as_ref() else {
            continue;
        };
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("inet") {
            continue;
        }
        let address = tokens.next().map(|a| a.trim_start_matches("addr:").to_string());
        let mut netmask = None;
        while let Some(token) = tokens.next() {
            if token == "netmask" {
                netmask = tokens.next().and_then(normalize_netmask);
            }
        }
        current_has_inet = true;
        out.push(RawInterface {
            ipv4_address: address,
            netmask,
            ..iface.clone()
        });
    }
    if let Some(iface) = current {
        if !current_has_inet {
            out.push(iface);
        }
    }
    out
}

/// `0xffffff00` and `255.255.255.0` both become dotted-decimal.
pub fn normalize_netmask(raw: &str) -> Option<String> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        let bits = u32::from_str_radix(hex, 16).ok()?;
        return Some(Ipv4Addr::from(bits).to_string());
    }
    parse_ipv4(raw).map(|o| Ipv4Addr::from(o).to_string())
}

pub fn parse_hardware_ports(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if !(line.contains("Wi-Fi") || line.contains("AirPort")) {
            continue;
        }
        let Some(next) = lines.get(i + 1) else {
            continue;
        };
        if !next.contains("Device:") {
            continue;
        }
        if let Some((_, device)) = next.split_once(':') {
            let device = device.trim();
            if !device.is_empty() {
                return Some(device.to_string());
            }
        }
    }
    None
}

pub struct HostInterfaceSource {
    command_timeout: Duration,
}

impl HostInterfaceSource {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

impl InterfaceSource for HostInterfaceSource {
    #[cfg(target_os = "macos")]
    fn wifi_device(&self) -> Option<String> {
        match run_command(
            "/usr/sbin/networksetup",
            &["-listallhardwareports"],
            self.command_timeout,
        ) {
            Ok(text) => parse_hardware_ports(&text),
            Err(err) => {
                tracing::error!(error = %err, "не удалось определить Wi-Fi интерфейс");
                None
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn wifi_device(&self) -> Option<String> {
        let entries = std::fs::read_dir("/sys/class/net").ok()?;
        entries
            .flatten()
            .find(|e| e.path().join("wireless").exists())
            .map(|e| e.file_name().to_string_lossy().to_string())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn wifi_device(&self) -> Option<String> {
        None
    }

    fn raw_interfaces(&self) -> Result<Vec<RawInterface>, SampleError> {
        let text = run_command("ifconfig", &[], self.command_timeout)?;
        Ok(parse_ifconfig(&text))
    }
}
