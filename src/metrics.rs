use crate::network::wifi::{PowerState, ToggleOutcome};
use crate::state::{now_unix, State};
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub netspeed_download_bytes_per_sec: Gauge,
    pub netspeed_upload_bytes_per_sec: Gauge,
    pub netspeed_rx_bytes_total: Gauge,
    pub netspeed_tx_bytes_total: Gauge,
    pub netspeed_cpu_usage_percent: Gauge,
    pub netspeed_memory_used_bytes: Gauge,
    pub netspeed_memory_total_bytes: Gauge,
    pub netspeed_memory_usage_percent: Gauge,
    pub netspeed_battery_percent: Gauge,
    pub netspeed_battery_charging: Gauge,
    pub netspeed_battery_present: Gauge,
    pub netspeed_keep_awake_enabled: Gauge,
    pub netspeed_update_interval_seconds: Gauge,
    pub netspeed_ethernet_active: Gauge,
    pub netspeed_wifi_active: Gauge,
    pub netspeed_uptime_seconds: Gauge,
    pub netspeed_last_collect_timestamp_seconds: Gauge,
    pub netspeed_scrape_count_total: Counter,
    pub netspeed_collect_errors_total: CounterVec,
    pub netspeed_wifi_switch_total: CounterVec,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let netspeed_download_bytes_per_sec = Gauge::with_opts(opts!(
            "netspeed_download_bytes_per_sec",
            "Download throughput over monitored interfaces in bytes per second"
        ))?;
        let netspeed_upload_bytes_per_sec = Gauge::with_opts(opts!(
            "netspeed_upload_bytes_per_sec",
            "Upload throughput over monitored interfaces in bytes per second"
        ))?;
        let netspeed_rx_bytes_total = Gauge::with_opts(opts!(
            "netspeed_rx_bytes_total",
            "Cumulative received bytes at the last rate sample"
        ))?;
        let netspeed_tx_bytes_total = Gauge::with_opts(opts!(
            "netspeed_tx_bytes_total",
            "Cumulative transmitted bytes at the last rate sample"
        ))?;
        let netspeed_cpu_usage_percent = Gauge::with_opts(opts!(
            "netspeed_cpu_usage_percent",
            "CPU usage across all cores in percent (0..100)"
        ))?;
        let netspeed_memory_used_bytes =
            Gauge::with_opts(opts!("netspeed_memory_used_bytes", "Used memory in bytes"))?;
        let netspeed_memory_total_bytes =
            Gauge::with_opts(opts!("netspeed_memory_total_bytes", "Total memory in bytes"))?;
        let netspeed_memory_usage_percent = Gauge::with_opts(opts!(
            "netspeed_memory_usage_percent",
            "Memory usage in percent"
        ))?;
        let netspeed_battery_percent =
            Gauge::with_opts(opts!("netspeed_battery_percent", "Battery charge in percent"))?;
        let netspeed_battery_charging = Gauge::with_opts(opts!(
            "netspeed_battery_charging",
            "1 when running on AC power"
        ))?;
        let netspeed_battery_present = Gauge::with_opts(opts!(
            "netspeed_battery_present",
            "1 when an internal battery is present"
        ))?;
        let netspeed_keep_awake_enabled = Gauge::with_opts(opts!(
            "netspeed_keep_awake_enabled",
            "1 while idle sleep is being prevented"
        ))?;
        let netspeed_update_interval_seconds = Gauge::with_opts(opts!(
            "netspeed_update_interval_seconds",
            "Current sampling interval from preferences"
        ))?;
        let netspeed_ethernet_active = Gauge::with_opts(opts!(
            "netspeed_ethernet_active",
            "1 when an ethernet interface has an IPv4 address"
        ))?;
        let netspeed_wifi_active = Gauge::with_opts(opts!(
            "netspeed_wifi_active",
            "1 when the Wi-Fi interface has an IPv4 address"
        ))?;
        let netspeed_uptime_seconds =
            Gauge::with_opts(opts!("netspeed_uptime_seconds", "Daemon uptime in seconds"))?;
        let netspeed_last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "netspeed_last_collect_timestamp_seconds",
            "Unix timestamp of the last sampler tick"
        ))?;
        let netspeed_scrape_count_total = Counter::with_opts(opts!(
            "netspeed_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let netspeed_collect_errors_total = CounterVec::new(
            opts!(
                "netspeed_collect_errors_total",
                "Failed collector reads by collector"
            ),
            &["collector"],
        )?;
        let netspeed_wifi_switch_total = CounterVec::new(
            opts!(
                "netspeed_wifi_switch_total",
                "Wi-Fi power changes by requested state and outcome"
            ),
            &["action", "outcome"],
        )?;

        register(&registry, &netspeed_download_bytes_per_sec)?;
        register(&registry, &netspeed_upload_bytes_per_sec)?;
        register(&registry, &netspeed_rx_bytes_total)?;
        register(&registry, &netspeed_tx_bytes_total)?;
        register(&registry, &netspeed_cpu_usage_percent)?;
        register(&registry, &netspeed_memory_used_bytes)?;
        register(&registry, &netspeed_memory_total_bytes)?;
        register(&registry, &netspeed_memory_usage_percent)?;
        register(&registry, &netspeed_battery_percent)?;
        register(&registry, &netspeed_battery_charging)?;
        register(&registry, &netspeed_battery_present)?;
        register(&registry, &netspeed_keep_awake_enabled)?;
        register(&registry, &netspeed_update_interval_seconds)?;
        register(&registry, &netspeed_ethernet_active)?;
        register(&registry, &netspeed_wifi_active)?;
        register(&registry, &netspeed_uptime_seconds)?;
        register(&registry, &netspeed_last_collect_timestamp_seconds)?;
        register(&registry, &netspeed_scrape_count_total)?;
        register(&registry, &netspeed_collect_errors_total)?;
        register(&registry, &netspeed_wifi_switch_total)?;

        Ok(Arc::new(Self {
            registry,
            netspeed_download_bytes_per_sec,
            netspeed_upload_bytes_per_sec,
            netspeed_rx_bytes_total,
            netspeed_tx_bytes_total,
            netspeed_cpu_usage_percent,
            netspeed_memory_used_bytes,
            netspeed_memory_total_bytes,
            netspeed_memory_usage_percent,
            netspeed_battery_percent,
            netspeed_battery_charging,
            netspeed_battery_present,
            netspeed_keep_awake_enabled,
            netspeed_update_interval_seconds,
            netspeed_ethernet_active,
            netspeed_wifi_active,
            netspeed_uptime_seconds,
            netspeed_last_collect_timestamp_seconds,
            netspeed_scrape_count_total,
            netspeed_collect_errors_total,
            netspeed_wifi_switch_total,
        }))
    }

    /// Missing readings are exported as NaN rather than a stale value.
    pub fn update_from_state(&self, state: &State) {
        let r = &state.readings;
        self.netspeed_download_bytes_per_sec
            .set(r.rate.download_bytes_per_sec.unwrap_or(f64::NAN));
        self.netspeed_upload_bytes_per_sec
            .set(r.rate.upload_bytes_per_sec.unwrap_or(f64::NAN));
        self.netspeed_cpu_usage_percent
            .set(r.cpu_usage_percent.unwrap_or(f64::NAN));

        match r.memory {
            Some(m) => {
                self.netspeed_memory_used_bytes.set(m.used_bytes as f64);
                self.netspeed_memory_total_bytes.set(m.total_bytes as f64);
                self.netspeed_memory_usage_percent
                    .set(m.usage_percent().unwrap_or(f64::NAN));
            }
            None => {
                self.netspeed_memory_used_bytes.set(f64::NAN);
                self.netspeed_memory_usage_percent.set(f64::NAN);
            }
        }

        let battery = r.battery.unwrap_or_default();
        self.netspeed_battery_present.set(flag(battery.is_present));
        self.netspeed_battery_charging.set(flag(battery.is_charging));
        self.netspeed_battery_percent.set(
            battery
                .percentage
                .map(|p| p as f64)
                .unwrap_or(f64::NAN),
        );

        self.netspeed_keep_awake_enabled.set(flag(state.keep_awake));
        if let Some(check) = &state.network {
            self.netspeed_ethernet_active
                .set(flag(check.report.has_ethernet));
            self.netspeed_wifi_active.set(flag(check.report.has_wifi));
        }

        self.netspeed_last_collect_timestamp_seconds
            .set(state.last_collect_timestamp_seconds as f64);
        let uptime = now_unix().saturating_sub(state.started_at_unix) as f64;
        self.netspeed_uptime_seconds.set(uptime);
    }

    pub fn set_counters(&self, received_bytes: u64, transmitted_bytes: u64) {
        self.netspeed_rx_bytes_total.set(received_bytes as f64);
        self.netspeed_tx_bytes_total.set(transmitted_bytes as f64);
    }

    pub fn set_update_interval(&self, secs: f64) {
        self.netspeed_update_interval_seconds.set(secs);
    }

    pub fn inc_scrape_count(&self) {
        self.netspeed_scrape_count_total.inc();
    }

    pub fn inc_collect_error(&self, collector: &str) {
        self.netspeed_collect_errors_total
            .with_label_values(&[collector])
            .inc();
    }

    pub fn record_wifi_switch(&self, action: PowerState, outcome: &ToggleOutcome) {
        self.netspeed_wifi_switch_total
            .with_label_values(&[action.as_arg(), outcome.label()])
            .inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn flag(v: bool) -> f64 {
    if v {
        1.0
    } else {
        0.0
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_counters_show_up_in_output() {
        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.inc_collect_error("battery");
        metrics.inc_collect_error("battery");
        metrics.record_wifi_switch(PowerState::Off, &ToggleOutcome::Applied);

        let text = String::from_utf8(metrics.encode_metrics().expect("кодирование"))
            .expect("utf-8");
        assert!(text.contains("netspeed_collect_errors_total{collector=\"battery\"} 2"));
        assert!(text.contains("netspeed_wifi_switch_total{action=\"off\",outcome=\"applied\"} 1"));
    }

    #[test]
    fn state_values_are_exported() {
        let metrics = Metrics::new().expect("инициализация метрик");
        let mut state = State::new(0);
        state.readings.cpu_usage_percent = Some(12.5);
        state.keep_awake = true;
        metrics.update_from_state(&state);
        metrics.set_update_interval(3.0);

        assert_eq!(metrics.netspeed_cpu_usage_percent.get(), 12.5);
        assert_eq!(metrics.netspeed_keep_awake_enabled.get(), 1.0);
        assert!(metrics.netspeed_download_bytes_per_sec.get().is_nan());
        assert_eq!(metrics.netspeed_battery_present.get(), 0.0);
        assert_eq!(metrics.netspeed_update_interval_seconds.get(), 3.0);
    }
}
