use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCounterSample {
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
    pub taken_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct RateResult {
    pub download_bytes_per_sec: Option<f64>,
    pub upload_bytes_per_sec: Option<f64>,
}

impl RateResult {
    pub const NONE: Self = Self {
        download_bytes_per_sec: None,
        upload_bytes_per_sec: None,
    };

    pub fn is_valid(&self) -> bool {
        self.download_bytes_per_sec.is_some() && self.upload_bytes_per_sec.is_some()
    }
}

#[derive(Debug, Default)]
pub struct RateCalculator {
    last: Option<ByteCounterSample>,
}

impl RateCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, received_bytes: u64, transmitted_bytes: u64, now: Instant) -> RateResult {
        let current = ByteCounterSample {
            received_bytes,
            transmitted_bytes,
            taken_at: now,
        };
        // The stored sample moves forward on every call, whatever the outcome.
        let prior = self.last.replace(current);
        let Some(prior) = prior else {
            return RateResult::NONE;
        };

        if prior.received_bytes == 0 && prior.transmitted_bytes == 0 {
            return RateResult::NONE;
        }
        if received_bytes < prior.received_bytes || transmitted_bytes < prior.transmitted_bytes {
            debug!(
                prior_rx = prior.received_bytes,
                prior_tx = prior.transmitted_bytes,
                rx = received_bytes,
                tx = transmitted_bytes,
                "счётчики байт уменьшились, пропускаем расчёт скорости"
            );
            return RateResult::NONE;
        }

        let elapsed = match now.checked_duration_since(prior.taken_at) {
            Some(d) => d.as_secs_f64(),
            None => return RateResult::NONE,
        };
        if elapsed <= 0.0 {
            return RateResult::NONE;
        }

        let download = (received_bytes - prior.received_bytes) as f64 / elapsed;
        let upload = (transmitted_bytes - prior.transmitted_bytes) as f64 / elapsed;
        debug!(download, upload, elapsed, "скорость сети рассчитана");

        RateResult {
            download_bytes_per_sec: Some(download),
            upload_bytes_per_sec: Some(upload),
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    #[cfg(test)]
    pub fn last_sample(&self) -> Option<ByteCounterSample> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn approx(actual: Option<f64>, expected: f64) {
        let v = actual.expect("ожидалось значение скорости");
        assert!((v - expected).abs() < 1e-6, "{v} != {expected}");
    }

    #[test]
    fn first_call_is_baseline() {
        let mut calc = RateCalculator::new();
        let result = calc.update(1024, 512, Instant::now());
        assert_eq!(result, RateResult::NONE);
        assert!(!result.is_valid());
    }

    #[test]
    fn rate_is_delta_over_elapsed() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now();
        calc.update(1024, 512, t0);

        let result = calc.update(2048, 1024, t0 + Duration::from_millis(100));
        approx(result.download_bytes_per_sec, 10_240.0);
        approx(result.upload_bytes_per_sec, 5_120.0);
        assert!(result.is_valid());
    }

    #[test]
    fn monotonic_sequence_matches_deltas() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now();
        let samples = [(100_u64, 50_u64, 0_u64), (1_100, 250, 2), (1_100, 250, 3), (9_100, 4_250, 7)];
        calc.update(samples[0].0, samples[0].1, t0);
        for pair in samples.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            let dt = (cur.2 - prev.2) as f64;
            let result = calc.update(cur.0, cur.1, t0 + Duration::from_secs(cur.2));
            approx(result.download_bytes_per_sec, (cur.0 - prev.0) as f64 / dt);
            approx(result.upload_bytes_per_sec, (cur.1 - prev.1) as f64 / dt);
        }
    }

    #[test]
    fn decrease_yields_none_and_advances_state() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now();
        calc.update(2048, 1024, t0);

        let result = calc.update(1024, 512, t0 + Duration::from_secs(1));
        assert_eq!(result, RateResult::NONE);

        // Measured from the decreased point, not the earlier baseline.
        let result = calc.update(3072, 1536, t0 + Duration::from_secs(2));
        approx(result.download_bytes_per_sec, 2048.0);
        approx(result.upload_bytes_per_sec, 1024.0);
    }

    #[test]
    fn only_one_counter_decreasing_is_a_discontinuity() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now();
        calc.update(2048, 1024, t0);
        let result = calc.update(4096, 10, t0 + Duration::from_secs(1));
        assert_eq!(result, RateResult::NONE);
    }

    #[test]
    fn zero_baseline_is_not_a_valid_prior() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now();
        calc.update(0, 0, t0);
        let result = calc.update(4096, 2048, t0 + Duration::from_secs(1));
        assert_eq!(result, RateResult::NONE);

        let result = calc.update(8192, 4096, t0 + Duration::from_secs(2));
        approx(result.download_bytes_per_sec, 4096.0);
    }

    #[test]
    fn non_positive_elapsed_yields_none() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now() + Duration::from_secs(10);
        calc.update(1024, 1024, t0);
        assert_eq!(calc.update(2048, 2048, t0), RateResult::NONE);
        assert_eq!(
            calc.update(4096, 4096, t0 - Duration::from_secs(1)),
            RateResult::NONE
        );
        assert_eq!(calc.last_sample().map(|s| s.received_bytes), Some(4096));
    }

    #[test]
    fn reset_behaves_like_fresh_calculator() {
        let mut calc = RateCalculator::new();
        let t0 = Instant::now();
        calc.update(1024, 512, t0);
        calc.update(2048, 1024, t0 + Duration::from_secs(1));

        calc.reset();
        assert!(calc.last_sample().is_none());
        let result = calc.update(4096, 2048, t0 + Duration::from_secs(2));
        assert_eq!(result, RateResult::NONE);
    }
}
