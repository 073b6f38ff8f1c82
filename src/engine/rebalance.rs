//! Adaptive consumer pool sizing.
//!
//! Compares rolling CPU and memory averages against their thresholds and
//! nudges the pool by one consumer at a time, at most once per interval.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Averages within this many percentage points of both thresholds leave the
/// pool alone.
pub const TOLERANCE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Memory average is above its threshold.
    ShrinkForMemory,
    /// CPU average is above its threshold.
    ShrinkForCpu,
    /// Both averages are below their thresholds.
    Grow,
    Hold,
}

pub fn decide(
    avg_cpu: f64,
    avg_memory: f64,
    cpu_threshold: f64,
    memory_threshold: f64,
) -> Decision {
    let cpu_diff = cpu_threshold - avg_cpu;
    let memory_diff = memory_threshold - avg_memory;

    if cpu_diff.abs() <= TOLERANCE && memory_diff.abs() <= TOLERANCE {
        return Decision::Hold;
    }
    if memory_diff < 0.0 {
        Decision::ShrinkForMemory
    } else if cpu_diff < 0.0 {
        Decision::ShrinkForCpu
    } else {
        Decision::Grow
    }
}

/// What a rebalance pass actually did to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAdjustment {
    Added { size: usize },
    Removed { size: usize },
}

/// Cooldown gate between rebalance passes.
#[derive(Debug)]
pub(crate) struct Cooldown {
    interval: Duration,
    last: Mutex<Instant>,
}

impl Cooldown {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(Instant::now()),
        }
    }

    /// True at most once per interval; claiming the slot restarts the clock.
    pub(crate) fn try_claim(&self) -> bool {
        let mut last = self.last.lock();
        if last.elapsed() < self.interval {
            return false;
        }
        *last = Instant::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_tolerance_holds() {
        assert_eq!(decide(72.0, 83.0, 75.0, 80.0), Decision::Hold);
    }

    #[test]
    fn memory_pressure_wins_over_cpu_headroom() {
        assert_eq!(decide(10.0, 95.0, 75.0, 80.0), Decision::ShrinkForMemory);
    }

    #[test]
    fn cpu_pressure_shrinks() {
        assert_eq!(decide(90.0, 50.0, 75.0, 80.0), Decision::ShrinkForCpu);
    }

    #[test]
    fn headroom_on_both_grows() {
        assert_eq!(decide(20.0, 30.0, 75.0, 80.0), Decision::Grow);
    }

    #[test]
    fn one_metric_out_of_band_is_enough() {
        // CPU sits near its threshold, memory has plenty of room.
        assert_eq!(decide(74.0, 40.0, 75.0, 80.0), Decision::Grow);
        // Memory headroom triggers the pass, but CPU over threshold shrinks.
        assert_eq!(decide(78.0, 40.0, 75.0, 80.0), Decision::ShrinkForCpu);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_allows_one_pass_per_interval() {
        let cooldown = Cooldown::new(Duration::from_secs(60));
        assert!(!cooldown.try_claim());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cooldown.try_claim());
        assert!(!cooldown.try_claim());
    }
}
