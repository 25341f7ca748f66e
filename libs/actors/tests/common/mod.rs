//! Shared helpers for the runtime scenario tests

#![allow(dead_code)]

use actor_core::Context;
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fresh context sized for tests that park many workers
pub fn test_context() -> Context {
    init_tracing();
    Context::builder()
        .core_threads(2)
        .max_threads(256)
        .keep_alive(Duration::from_secs(5))
        .build()
        .expect("context should build")
}

/// Poll `condition` until it holds or `timeout` passes
pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
