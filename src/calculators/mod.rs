pub mod cpu;
pub mod rate;

pub use cpu::{CoreTicks, CpuUsageCalculator};
pub use rate::{RateCalculator, RateResult};
