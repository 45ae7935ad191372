use crate::calculators::{CpuUsageCalculator, RateCalculator, RateResult};
use crate::collectors::{collect_host, TelemetrySource};
use crate::keep_awake::{KeepAwake, KeepAwakeError};
use crate::metrics::Metrics;
use crate::preferences::PreferencesStore;
use crate::state::{now_unix, PanelView, Readings, State};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub struct Monitor {
    source: Mutex<Box<dyn TelemetrySource>>,
    rate: Mutex<RateCalculator>,
    cpu: Mutex<CpuUsageCalculator>,
    state: Arc<RwLock<State>>,
    metrics: Arc<Metrics>,
    prefs: Arc<PreferencesStore>,
    keep_awake: Arc<KeepAwake>,
}

impl Monitor {
    pub fn new(
        source: Box<dyn TelemetrySource>,
        state: Arc<RwLock<State>>,
        metrics: Arc<Metrics>,
        prefs: Arc<PreferencesStore>,
        keep_awake: Arc<KeepAwake>,
    ) -> Self {
        Self {
            source: Mutex::new(source),
            rate: Mutex::new(RateCalculator::new()),
            cpu: Mutex::new(CpuUsageCalculator::new()),
            state,
            metrics,
            prefs,
            keep_awake,
        }
    }

    pub async fn poll(&self) -> PanelView {
        let snapshot = {
            let mut source = self.source.lock().await;
            collect_host(source.as_mut())
        };
        for collector in &snapshot.failed {
            self.metrics.inc_collect_error(collector);
        }

        let rate = match snapshot.network_bytes {
            Some((rx, tx)) => {
                self.metrics.set_counters(rx, tx);
                let now = tokio::time::Instant::now().into_std();
                self.rate.lock().await.update(rx, tx, now)
            }
            None => RateResult::NONE,
        };
        if !rate.is_valid() {
            debug!("скорость сети на этом тике не определена");
        }
        let cpu_usage_percent = {
            let mut cpu = self.cpu.lock().await;
            match snapshot.cpu_ticks {
                Some(ticks) => cpu.update(ticks),
                // A gap in the tick series must not be averaged over.
                None => {
                    cpu.reset();
                    None
                }
            }
        };

        let readings = Readings {
            rate,
            cpu_usage_percent,
            memory: snapshot.memory,
            battery: snapshot.battery,
        };
        let prefs = self.prefs.current();
        let clock = chrono::Local::now().format("%H:%M").to_string();
        let panel = PanelView::render(&readings, &prefs, self.keep_awake.is_enabled(), &clock);
        debug!(
            download = panel.download.as_deref().unwrap_or("-"),
            upload = panel.upload.as_deref().unwrap_or("-"),
            cpu = panel.cpu.as_deref().unwrap_or("-"),
            memory = panel.memory.as_deref().unwrap_or("-"),
            battery = panel.battery.as_deref().unwrap_or("-"),
            "панель обновлена"
        );

        let state_snapshot = {
            let mut guard = self.state.write().await;
            guard.update_collected(now_unix(), readings, panel.clone(), snapshot.failed);
            guard.clone()
        };
        self.metrics.update_from_state(&state_snapshot);
        self.metrics.set_update_interval(prefs.update_interval_secs);
        panel
    }

    /// Forgets the last byte counters; the next tick renders no speed.
    pub async fn reset_speed(&self) {
        self.rate.lock().await.reset();
        info!("счётчики скорости сброшены");
    }

    pub async fn toggle_keep_awake(&self) -> Result<bool, KeepAwakeError> {
        let enabled = self.keep_awake.toggle()?;
        self.state.write().await.set_keep_awake(enabled);
        self.metrics.netspeed_keep_awake_enabled.set(if enabled { 1.0 } else { 0.0 });
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::CoreTicks;
    use crate::collectors::fake::FakeSource;
    use crate::collectors::{BatteryState, MemorySample};
    use std::time::Duration;
    use tempfile::TempDir;

    fn monitor_with(source: FakeSource, dir: &TempDir) -> (Monitor, Arc<RwLock<State>>) {
        let state = Arc::new(RwLock::new(State::new(0)));
        let monitor = Monitor::new(
            Box::new(source),
            state.clone(),
            Metrics::new().expect("инициализация метрик"),
            Arc::new(PreferencesStore::load(dir.path().join("prefs.yaml"))),
            Arc::new(KeepAwake::new(vec!["sleep".to_string(), "30".to_string()])),
        );
        (monitor, state)
    }

    fn core(user: u64, idle: u64) -> CoreTicks {
        CoreTicks {
            user,
            system: 0,
            nice: 0,
            idle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_tick_renders_speed_and_cpu() {
        let dir = TempDir::new().expect("tempdir");
        let source = FakeSource {
            network: [Ok((1024, 512)), Ok((2048 + 1024, 1024))].into_iter().collect(),
            cpu: [Ok(vec![core(100, 100)]), Ok(vec![core(150, 150)])]
                .into_iter()
                .collect(),
            memory: Some(MemorySample {
                total_bytes: 4 * 1_073_741_824,
                used_bytes: 1_073_741_824,
            }),
            battery: Some(BatteryState::ABSENT),
        };
        let (monitor, state) = monitor_with(source, &dir);

        let first = monitor.poll().await;
        assert_eq!(first.download.as_deref(), Some("--"));
        assert_eq!(first.cpu.as_deref(), Some("--"));
        assert_eq!(first.memory.as_deref(), Some("1.00 GB"));
        assert_eq!(first.battery.as_deref(), Some("--"));

        tokio::time::advance(Duration::from_secs(1)).await;
        let second = monitor.poll().await;
        assert_eq!(second.download.as_deref(), Some("2K"));
        assert_eq!(second.upload.as_deref(), Some("0"));
        assert_eq!(second.cpu.as_deref(), Some("50.0"));
        assert!(second.time.is_some());

        let guard = state.read().await;
        assert_eq!(guard.readings.rate.download_bytes_per_sec, Some(2048.0));
        assert!(guard.failed_collectors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_drops_rate_for_next_tick() {
        let dir = TempDir::new().expect("tempdir");
        let source = FakeSource {
            network: [Ok((1000, 1000)), Ok((5000, 5000)), Ok((9000, 9000))]
                .into_iter()
                .collect(),
            ..FakeSource::default()
        };
        let (monitor, _state) = monitor_with(source, &dir);

        monitor.poll().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        monitor.reset_speed().await;
        let after_reset = monitor.poll().await;
        assert_eq!(after_reset.download.as_deref(), Some("--"));

        tokio::time::advance(Duration::from_secs(1)).await;
        let recovered = monitor.poll().await;
        assert_eq!(recovered.download.as_deref(), Some("4K"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_collectors_render_placeholders_and_are_recorded() {
        let dir = TempDir::new().expect("tempdir");
        let source = FakeSource {
            network: [Err("счётчики недоступны")].into_iter().collect(),
            ..FakeSource::default()
        };
        let (monitor, state) = monitor_with(source, &dir);

        let panel = monitor.poll().await;
        assert_eq!(panel.download.as_deref(), Some("--"));
        assert_eq!(panel.cpu.as_deref(), Some("--"));
        assert_eq!(panel.memory.as_deref(), Some("--"));
        assert_eq!(
            state.read().await.failed_collectors,
            vec!["network", "cpu", "memory", "battery"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cpu_failure_restarts_usage_baseline() {
        let dir = TempDir::new().expect("tempdir");
        let source = FakeSource {
            cpu: [
                Ok(vec![core(100, 100)]),
                Err("тики недоступны"),
                Ok(vec![core(150, 150)]),
                Ok(vec![core(160, 190)]),
            ]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        let (monitor, _state) = monitor_with(source, &dir);

        monitor.poll().await;
        assert_eq!(monitor.poll().await.cpu.as_deref(), Some("--"));
        assert_eq!(monitor.poll().await.cpu.as_deref(), Some("--"));
        assert_eq!(monitor.poll().await.cpu.as_deref(), Some("20.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn counter_wrap_renders_placeholder() {
        let dir = TempDir::new().expect("tempdir");
        let source = FakeSource {
            network: [Ok((50_000, 50_000)), Ok((10, 10))].into_iter().collect(),
            ..FakeSource::default()
        };
        let (monitor, _state) = monitor_with(source, &dir);
        monitor.poll().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(monitor.poll().await.download.as_deref(), Some("--"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn keep_awake_toggle_updates_state() {
        let dir = TempDir::new().expect("tempdir");
        let (monitor, state) = monitor_with(FakeSource::default(), &dir);
        assert!(monitor.toggle_keep_awake().await.expect("включение"));
        assert!(state.read().await.panel.keep_awake);
        assert!(!monitor.toggle_keep_awake().await.expect("выключение"));
        assert!(!state.read().await.keep_awake);
    }
}
