use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    pub user: u64,
    pub system: u64,
    pub nice: u64,
    pub idle: u64,
}

#[derive(Debug, Default)]
pub struct CpuUsageCalculator {
    last: Option<Vec<CoreTicks>>,
}

impl CpuUsageCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, ticks: Vec<CoreTicks>) -> Option<f64> {
        let prior = self.last.replace(ticks);
        let (Some(prior), Some(current)) = (prior, self.last.as_ref()) else {
            return None;
        };
        if prior.len() != current.len() {
            debug!(
                prior_cores = prior.len(),
                cores = current.len(),
                "число ядер изменилось, начинаем замер заново"
            );
            return None;
        }

        let mut used = 0_u64;
        let mut idle = 0_u64;
        for (before, after) in prior.iter().zip(current) {
            used = used
                .saturating_add(after.user.saturating_sub(before.user))
                .saturating_add(after.system.saturating_sub(before.system))
                .saturating_add(after.nice.saturating_sub(before.nice));
            idle = idle.saturating_add(after.idle.saturating_sub(before.idle));
        }

        let total = used.saturating_add(idle);
        if total == 0 {
            return None;
        }
        let usage = used as f64 / total as f64 * 100.0;
        debug!(usage, "загрузка CPU рассчитана");
        Some(usage)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
