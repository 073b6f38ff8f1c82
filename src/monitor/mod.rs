//! Rolling CPU and memory pressure.
//!
//! A background task samples the host every [`SAMPLE_INTERVAL`] into two
//! windows of [`WINDOW_CAPACITY`] readings. The rebalancer reads the window
//! means.

pub mod sampler;
pub mod window;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use sampler::{ResourceSampler, SysinfoSampler};
pub use window::SlidingWindow;

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
pub const WINDOW_CAPACITY: usize = 600;

pub struct ResourceMonitor {
    sampler: Mutex<Box<dyn ResourceSampler>>,
    cpu: Mutex<SlidingWindow>,
    memory: Mutex<SlidingWindow>,
}

impl ResourceMonitor {
    pub fn new(sampler: impl ResourceSampler + 'static) -> Self {
        Self {
            sampler: Mutex::new(Box::new(sampler)),
            cpu: Mutex::new(SlidingWindow::new(WINDOW_CAPACITY)),
            memory: Mutex::new(SlidingWindow::new(WINDOW_CAPACITY)),
        }
    }

    /// Monitor for the current host.
    pub fn system() -> Self {
        Self::new(SysinfoSampler::new())
    }

    /// Take one CPU and one memory reading.
    pub fn sample(&self) {
        let (cpu, memory) = {
            let mut sampler = self.sampler.lock();
            (sampler.cpu_load(), sampler.memory_used_percent())
        };
        self.cpu.lock().push(cpu);
        self.memory.lock().push(memory);
        debug!(cpu, memory, "resource sample");
    }

    /// Mean CPU load over the window; 0 before the first sample.
    pub fn average_cpu(&self) -> f64 {
        self.cpu.lock().mean().unwrap_or(0.0)
    }

    /// Mean memory usage over the window. Takes a reading first if the
    /// window is still empty.
    pub fn average_memory(&self) -> f64 {
        if let Some(mean) = self.memory.lock().mean() {
            return mean;
        }
        let reading = self.sampler.lock().memory_used_percent();
        let mut memory = self.memory.lock();
        memory.push(reading);
        memory.mean().unwrap_or(reading)
    }

    /// Sample on a fixed cadence until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => monitor.sample(),
                }
            }
            debug!("resource sampler stopped");
        })
    }
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("samples", &self.cpu.lock().len())
            .finish()
    }
}
