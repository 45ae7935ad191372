use super::interfaces::{parse_ipv4, InterfaceKind, NetworkInterfaceInfo};
use serde::Serialize;

pub fn subnet(ip: &str, mask: &str) -> Option<String> {
    let ip = parse_ipv4(ip)?;
    let mask = parse_ipv4(mask)?;
    let net: Vec<String> = ip
        .iter()
        .zip(mask.iter())
        .map(|(a, m)| (a & m).to_string())
        .collect();
    Some(net.join("."))
}

fn first_of(interfaces: &[NetworkInterfaceInfo], kind: InterfaceKind) -> Option<&NetworkInterfaceInfo> {
    interfaces.iter().find(|i| i.kind == kind)
}

fn subnet_of(iface: Option<&NetworkInterfaceInfo>) -> Option<String> {
    let iface = iface?;
    subnet(iface.ipv4_address.as_deref()?, iface.subnet_mask.as_deref()?)
}

pub fn should_disable_wifi(interfaces: &[NetworkInterfaceInfo]) -> bool {
    let ethernet = subnet_of(first_of(interfaces, InterfaceKind::Ethernet));
    let wifi = subnet_of(first_of(interfaces, InterfaceKind::Wifi));
    matches!((ethernet, wifi), (Some(e), Some(w)) if e == w)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchDecision {
    DisableWifi,
    EnableWifi,
    NoChange,
}

pub fn decide(interfaces: &[NetworkInterfaceInfo]) -> SwitchDecision {
    let has_ethernet = first_of(interfaces, InterfaceKind::Ethernet).is_some();
    let has_wifi = first_of(interfaces, InterfaceKind::Wifi).is_some();
    if should_disable_wifi(interfaces) {
        SwitchDecision::DisableWifi
    } else if !has_ethernet && !has_wifi {
        SwitchDecision::EnableWifi
    } else {
        SwitchDecision::NoChange
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyReport {
    pub has_ethernet: bool,
    pub has_wifi: bool,
    pub ethernet_subnet: Option<String>,
    pub wifi_subnet: Option<String>,
    pub same_subnet: bool,
    pub decision: SwitchDecision,
    pub advice: String,
}

pub fn assess(interfaces: &[NetworkInterfaceInfo]) -> TopologyReport {
    let ethernet = first_of(interfaces, InterfaceKind::Ethernet);
    let wifi = first_of(interfaces, InterfaceKind::Wifi);
    let ethernet_subnet = subnet_of(ethernet);
    let wifi_subnet = subnet_of(wifi);
    let same_subnet = should_disable_wifi(interfaces);
    let has_ethernet = ethernet.is_some();
    let has_wifi = wifi.is_some();

    let advice = match (has_ethernet, has_wifi) {
        (true, true) if same_subnet => "отключить Wi-Fi и использовать проводную сеть",
        (true, true) => "оставить текущее состояние",
        (true, false) => "использовать проводную сеть",
        (false, true) => "использовать Wi-Fi",
        (false, false) => "подключиться к сети",
    };

    TopologyReport {
        has_ethernet,
        has_wifi,
        ethernet_subnet,
        wifi_subnet,
        same_subnet,
        decision: decide(interfaces),
        advice: advice.to_string(),
    }
}

impl TopologyReport {
    pub fn status_text(&self) -> String {
        let connected = |v: bool| if v { "подключено" } else { "не подключено" };
        let mut out = String::from("Состояние сети:\n");
        out.push_str(&format!("Проводная сеть: {}\n", connected(self.has_ethernet)));
        out.push_str(&format!("Wi-Fi: {}\n", connected(self.has_wifi)));
        if self.has_ethernet && self.has_wifi {
            let same = if self.same_subnet { "да" } else { "нет" };
            out.push_str(&format!("Одна подсеть: {same}\n"));
        }
        out.push_str(&format!("Рекомендация: {}", self.advice));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, kind: InterfaceKind, ip: &str, mask: &str) -> NetworkInterfaceInfo {
        NetworkInterfaceInfo {
            name: name.to_string(),
            kind,
            ipv4_address: Some(ip.to_string()),
            subnet_mask: Some(mask.to_string()),
        }
    }

    #[test]
    fn subnet_masks_octets() {
        assert_eq!(
            subnet("192.168.1.100", "255.255.255.0").as_deref(),
            Some("192.168.1.0")
        );
        assert_eq!(subnet("10.0.0.50", "255.0.0.0").as_deref(), Some("10.0.0.0"));
        assert_eq!(
            subnet("172.16.5.9", "255.255.240.0").as_deref(),
            Some("172.16.0.0")
        );
        assert_eq!(subnet("192.168.1", "255.255.255.0"), None);
        assert_eq!(subnet("192.168.1.1", "255.255.255.256"), None);
    }

    #[test]
    fn same_subnet_disables_wifi() {
        let list = vec![
            iface("en5", InterfaceKind::Ethernet, "192.168.1.40", "255.255.255.0"),
            iface("en0", InterfaceKind::Wifi, "192.168.1.23", "255.255.255.0"),
        ];
        assert!(should_disable_wifi(&list));
        assert_eq!(decide(&list), SwitchDecision::DisableWifi);
    }

    #[test]
    fn different_subnets_keep_wifi() {
        let list = vec![
            iface("en5", InterfaceKind::Ethernet, "10.0.0.5", "255.255.255.0"),
            iface("en0", InterfaceKind::Wifi, "192.168.1.23", "255.255.255.0"),
        ];
        assert!(!should_disable_wifi(&list));
        assert_eq!(decide(&list), SwitchDecision::NoChange);
    }

    #[test]
    fn single_class_never_disables() {
        let wired = vec![iface("en5", InterfaceKind::Ethernet, "10.0.0.5", "255.0.0.0")];
        assert!(!should_disable_wifi(&wired));
        assert_eq!(decide(&wired), SwitchDecision::NoChange);

        let wireless = vec![iface("en0", InterfaceKind::Wifi, "10.0.0.6", "255.0.0.0")];
        assert_eq!(decide(&wireless), SwitchDecision::NoChange);
    }

    #[test]
    fn nothing_connected_enables_wifi() {
        assert_eq!(decide(&[]), SwitchDecision::EnableWifi);
        let other = vec![iface("utun0", InterfaceKind::Other, "10.8.0.2", "255.255.255.0")];
        assert_eq!(decide(&other), SwitchDecision::EnableWifi);
    }

    #[test]
    fn only_first_interface_of_each_kind_counts() {
        let list = vec![
            iface("en5", InterfaceKind::Ethernet, "10.0.0.5", "255.255.255.0"),
            iface("en6", InterfaceKind::Ethernet, "192.168.1.50", "255.255.255.0"),
            iface("en0", InterfaceKind::Wifi, "192.168.1.23", "255.255.255.0"),
        ];
        assert!(!should_disable_wifi(&list));
    }

    #[test]
    fn missing_mask_never_matches() {
        let mut wifi = iface("en0", InterfaceKind::Wifi, "192.168.1.23", "255.255.255.0");
        wifi.subnet_mask = None;
        let list = vec![
            iface("en5", InterfaceKind::Ethernet, "192.168.1.40", "255.255.255.0"),
            wifi,
        ];
        assert!(!should_disable_wifi(&list));
    }

    #[test]
    fn report_carries_subnets_and_advice() {
        let list = vec![
            iface("en5", InterfaceKind::Ethernet, "192.168.1.40", "255.255.255.0"),
            iface("en0", InterfaceKind::Wifi, "192.168.1.23", "255.255.255.0"),
        ];
        let report = assess(&list);
        assert!(report.has_ethernet && report.has_wifi && report.same_subnet);
        assert_eq!(report.ethernet_subnet.as_deref(), Some("192.168.1.0"));
        assert_eq!(report.decision, SwitchDecision::DisableWifi);
        let text = report.status_text();
        assert!(text.contains("Одна подсеть: да"));
        assert!(text.contains("отключить Wi-Fi"));

        let empty = assess(&[]);
        assert_eq!(empty.advice, "подключиться к сети");
        assert!(!empty.status_text().contains("Одна подсеть"));
    }
}
