use crate::calculators::RateResult;
use crate::collectors::{BatteryState, MemorySample};
use crate::format::{format_optional_speed, format_percentage, format_used_memory, PLACEHOLDER};
use crate::network::NetworkCheck;
use crate::preferences::{ColorTheme, Preferences, Rgba};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
pub struct State {
    pub started_at_unix: i64,
    pub last_collect_timestamp_seconds: i64,
    pub readings: Readings,
    pub panel: PanelView,
    pub keep_awake: bool,
    pub failed_collectors: Vec<&'static str>,
    pub network: Option<NetworkCheck>,
    pub network_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Readings {
    pub rate: RateResult,
    pub cpu_usage_percent: Option<f64>,
    pub memory: Option<MemorySample>,
    pub battery: Option<BatteryState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<String>,
    pub keep_awake: bool,
    pub appearance: PanelAppearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanelAppearance {
    pub theme: ColorTheme,
    pub theme_name: &'static str,
    pub color: Rgba,
    pub background_alpha: f64,
    pub always_on_top: bool,
}

impl Default for PanelAppearance {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default())
    }
}

impl PanelAppearance {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        let theme = prefs.appearance.color_theme;
        Self {
            theme,
            theme_name: theme.display_name(),
            color: theme.primary_color(),
            background_alpha: prefs.appearance.background_alpha,
            always_on_top: prefs.window_always_on_top,
        }
    }
}

impl PanelView {
    pub fn render(readings: &Readings, prefs: &Preferences, keep_awake: bool, clock: &str) -> Self {
        let enabled = &prefs.enabled_metrics;
        let show = |on: bool, text: String| on.then_some(text);
        Self {
            time: show(enabled.time_display, clock.to_string()),
            download: show(
                enabled.network_speed,
                format_optional_speed(readings.rate.download_bytes_per_sec),
            ),
            upload: show(
                enabled.network_speed,
                format_optional_speed(readings.rate.upload_bytes_per_sec),
            ),
            cpu: show(enabled.cpu_usage, format_percentage(readings.cpu_usage_percent)),
            memory: show(
                enabled.memory_usage,
                format_used_memory(readings.memory.map(|m| m.used_bytes)),
            ),
            battery: show(
                enabled.battery_level,
                readings
                    .battery
                    .map(|b| b.display_text())
                    .unwrap_or_else(|| PLACEHOLDER.to_string()),
            ),
            keep_awake,
            appearance: PanelAppearance::from_preferences(prefs),
        }
    }
}

impl State {
    pub fn new(started_at_unix: i64) -> Self {
        Self {
            started_at_unix,
            ..Self::default()
        }
    }

    pub fn update_collected(
        &mut self,
        now_unix: i64,
        readings: Readings,
        panel: PanelView,
        failed_collectors: Vec<&'static str>,
    ) {
        self.last_collect_timestamp_seconds = now_unix;
        self.readings = readings;
        self.keep_awake = panel.keep_awake;
        self.panel = panel;
        self.failed_collectors = failed_collectors;
    }

    pub fn update_network(&mut self, result: Result<NetworkCheck, String>) {
        match result {
            Ok(check) => {
                self.network = Some(check);
                self.network_error = None;
            }
            Err(err) => self.network_error = Some(err),
        }
    }

    pub fn set_keep_awake(&mut self, enabled: bool) {
        self.keep_awake = enabled;
        self.panel.keep_awake = enabled;
    }
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
