use std::path::PathBuf;
use std::time::Duration;

use batchq::config::{Config, EngineConfig, REBALANCE_INTERVAL};
use batchq::error::Error;

const VARS: [&str; 8] = [
    "BATCHQ_RETRY_COUNT",
    "BATCHQ_CONCURRENT_PROCESSES",
    "BATCHQ_CPU_THRESHOLD",
    "BATCHQ_MEMORY_THRESHOLD",
    "BATCHQ_SCALE_UP",
    "BATCHQ_COMPONENTS",
    "OTEL_ENDPOINT",
    "LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn engine_config_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.retry_count, 3);
    assert_eq!(config.cpu_threshold, 75.0);
    assert_eq!(config.memory_threshold, 80.0);
    assert_eq!(config.rebalance_interval, REBALANCE_INTERVAL);
    assert_eq!(REBALANCE_INTERVAL, Duration::from_secs(60));
}

#[test]
fn linux_defaults_to_a_single_consumer_without_scale_up() {
    let config = EngineConfig::default();
    if cfg!(target_os = "linux") {
        assert_eq!(config.concurrent_processes, 1);
        assert!(!config.allow_scale_up);
    } else {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        assert_eq!(config.concurrent_processes, cores);
        assert!(config.allow_scale_up);
    }
}

// Environment variables are process-wide, so every env scenario runs in
// this one test.
#[test]
fn config_from_env() {
    clear_env();

    let config = Config::from_env().unwrap();
    let defaults = EngineConfig::default();
    assert_eq!(config.engine.retry_count, 3);
    assert_eq!(
        config.engine.concurrent_processes,
        defaults.concurrent_processes
    );
    assert_eq!(config.engine.allow_scale_up, defaults.allow_scale_up);
    assert!(config.components.is_none());
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.log_level, "info");

    unsafe {
        std::env::set_var("BATCHQ_RETRY_COUNT", "5");
        std::env::set_var("BATCHQ_CONCURRENT_PROCESSES", "2");
        std::env::set_var("BATCHQ_CPU_THRESHOLD", "60");
        std::env::set_var("BATCHQ_MEMORY_THRESHOLD", " 90.5 ");
        std::env::set_var("BATCHQ_SCALE_UP", "false");
        std::env::set_var("BATCHQ_COMPONENTS", "/etc/batchq/components.toml");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        std::env::set_var("LOG_LEVEL", "debug");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.retry_count, 5);
    assert_eq!(config.engine.concurrent_processes, 2);
    assert_eq!(config.engine.cpu_threshold, 60.0);
    assert_eq!(config.engine.memory_threshold, 90.5);
    assert!(!config.engine.allow_scale_up);
    assert_eq!(
        config.components,
        Some(PathBuf::from("/etc/batchq/components.toml"))
    );
    assert_eq!(
        config.otel_endpoint.as_deref(),
        Some("http://localhost:4317")
    );
    assert_eq!(config.log_level, "debug");

    for (var, value) in [
        ("BATCHQ_RETRY_COUNT", "three"),
        ("BATCHQ_CONCURRENT_PROCESSES", "0"),
        ("BATCHQ_CPU_THRESHOLD", "150"),
        ("BATCHQ_MEMORY_THRESHOLD", "-1"),
        ("BATCHQ_SCALE_UP", "maybe"),
    ] {
        clear_env();
        unsafe {
            std::env::set_var(var, value);
        }
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{var}={value} gave {err}");
    }

    // Overrides win over the platform defaults in both directions.
    clear_env();
    unsafe {
        std::env::set_var("BATCHQ_SCALE_UP", "true");
        std::env::set_var("BATCHQ_CONCURRENT_PROCESSES", "4");
    }
    let config = Config::from_env().unwrap();
    assert!(config.engine.allow_scale_up);
    assert_eq!(config.engine.concurrent_processes, 4);

    clear_env();
}
