//! Integration tests for resource sampling and window averages.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use batchq::monitor::{ResourceMonitor, ResourceSampler, SAMPLE_INTERVAL, WINDOW_CAPACITY};
use tokio_util::sync::CancellationToken;

/// Reports 1, 2, 3, ... for CPU and a constant for memory.
struct CountingSampler {
    cpu_calls: Arc<AtomicUsize>,
    memory: f64,
}

impl ResourceSampler for CountingSampler {
    fn cpu_load(&mut self) -> f64 {
        (self.cpu_calls.fetch_add(1, Ordering::SeqCst) + 1) as f64
    }

    fn memory_used_percent(&mut self) -> f64 {
        self.memory
    }
}

fn counting(memory: f64) -> (ResourceMonitor, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let monitor = ResourceMonitor::new(CountingSampler {
        cpu_calls: calls.clone(),
        memory,
    });
    (monitor, calls)
}

#[test]
fn averages_before_any_sample() {
    let (monitor, calls) = counting(42.0);

    assert_eq!(monitor.average_cpu(), 0.0);
    // Memory takes a reading on demand rather than reporting zero.
    assert_eq!(monitor.average_memory(), 42.0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn averages_cover_only_the_latest_window() {
    let (monitor, _) = counting(50.0);

    for _ in 0..WINDOW_CAPACITY + 100 {
        monitor.sample();
    }

    // Readings 101..=700 remain.
    let expected = (101..=700).sum::<usize>() as f64 / WINDOW_CAPACITY as f64;
    assert!((monitor.average_cpu() - expected).abs() < 1e-9);
    assert_eq!(monitor.average_memory(), 50.0);
}

#[tokio::test(start_paused = true)]
async fn background_sampler_ticks_every_interval() {
    let (monitor, calls) = counting(10.0);
    let monitor = Arc::new(monitor);
    let cancel = CancellationToken::new();
    let handle = monitor.spawn(cancel.clone());

    tokio::time::sleep(SAMPLE_INTERVAL * 5 + Duration::from_secs(1)).await;
    let taken = calls.load(Ordering::SeqCst);
    assert!((5..=6).contains(&taken), "took {taken} samples");

    cancel.cancel();
    handle.await.unwrap();

    tokio::time::sleep(SAMPLE_INTERVAL * 3).await;
    assert_eq!(calls.load(Ordering::SeqCst), taken);
}

#[test]
fn system_sampler_reports_percentages() {
    let monitor = ResourceMonitor::system();
    monitor.sample();

    let cpu = monitor.average_cpu();
    let memory = monitor.average_memory();
    assert!((0.0..=100.0).contains(&cpu), "cpu {cpu}");
    assert!((0.0..=100.0).contains(&memory), "memory {memory}");
}
