use crate::preferences::Preferences;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct Scheduler {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Runs `job` right away, then once per period. Returns `false` if already running.
    pub fn start<F, Fut>(&mut self, mut prefs: watch::Receiver<Preferences>, mut job: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            warn!(scheduler = self.name, "планировщик уже запущен");
            return false;
        }

        let name = self.name;
        let mut period = prefs.borrow_and_update().update_interval();
        info!(scheduler = name, period_secs = period.as_secs_f64(), "планировщик запущен");

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = immediate_ticker(period);
            let mut prefs_open = true;
            loop {
                tokio::select! {
                    changed = prefs.changed(), if prefs_open => {
                        if changed.is_err() {
                            debug!(scheduler = name, "источник настроек закрыт, интервал зафиксирован");
                            prefs_open = false;
                            continue;
                        }
                        let next = prefs.borrow_and_update().update_interval();
                        if next != period {
                            info!(
                                scheduler = name,
                                from_secs = period.as_secs_f64(),
                                to_secs = next.as_secs_f64(),
                                "интервал изменён, таймер пересоздан"
                            );
                            period = next;
                            ticker = delayed_ticker(period);
                        }
                    }
                    _ = ticker.tick() => {
                        job().await;
                    }
                }
            }
        }));
        true
    }

    pub fn stop(&mut self) {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                info!(scheduler = self.name, "планировщик остановлен");
            }
            None => debug!(scheduler = self.name, "планировщик не запущен"),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn immediate_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn delayed_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::PreferencesStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::time::sleep;

    fn counting_job(counter: Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    fn store() -> (TempDir, PreferencesStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = PreferencesStore::load(dir.path().join("prefs.yaml"));
        (dir, store)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_periodic() {
        let (_dir, prefs) = store();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new("test");
        assert!(scheduler.start(prefs.subscribe(), counting_job(counter.clone())));

        sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let (_dir, prefs) = store();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new("test");
        assert!(scheduler.start(prefs.subscribe(), counting_job(counter.clone())));
        assert!(!scheduler.start(prefs.subscribe(), counting_job(counter.clone())));
        assert!(scheduler.is_running());

        sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticks_and_is_idempotent() {
        let (_dir, prefs) = store();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new("test");
        scheduler.stop();
        scheduler.start(prefs.subscribe(), counting_job(counter.clone()));
        sleep(Duration::from_millis(1)).await;
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(scheduler.start(prefs.subscribe(), counting_job(counter.clone())));
        sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_rebuilds_timer() {
        let (_dir, prefs) = store();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new("test");
        scheduler.start(prefs.subscribe(), counting_job(counter.clone()));
        sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        prefs.update_interval(1.0).expect("интервал");
        // Ticks now land at ~1.001s and ~2.001s instead of 3s.
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_job_never_overlaps() {
        let (_dir, prefs) = store();
        prefs.update_interval(1.0).expect("интервал");
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let job = {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            let runs = runs.clone();
            move || {
                let in_flight = in_flight.clone();
                let max_in_flight = max_in_flight.clone();
                let runs = runs.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_secs(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        let mut scheduler = Scheduler::new("slow");
        scheduler.start(prefs.subscribe(), job);
        sleep(Duration::from_secs(12)).await;
        scheduler.stop();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
