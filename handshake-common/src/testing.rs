//! Test logging shared by unit and integration tests.
//!
//! ```ignore
//! #[ctor::ctor]
//! fn setup() {
//!     handshake_common::testing::init_global_test_logging();
//! }
//! ```

use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

static GLOBAL_LOGGING_INIT: Once = Once::new();

/// Install a subscriber that writes compact lines to the test harness and
/// JSONL to `target/test-logs/handshake_tests.jsonl`.
///
/// Safe to call from every test; only the first call does anything.
///
/// - `HANDSHAKE_TEST_LOG_FILE` overrides the JSONL path.
/// - `HANDSHAKE_TEST_LOG_LEVEL` sets the filter level (default `info`).
pub fn init_global_test_logging() {
    GLOBAL_LOGGING_INIT.call_once(|| {
        let file_layer = create_log_file().map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
        });

        let console_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .compact();

        let level =
            std::env::var("HANDSHAKE_TEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter = tracing_subscriber::EnvFilter::try_new(format!(
            "handshake_common={level},handshaked={level}"
        ))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer);
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

fn create_log_file() -> Option<std::fs::File> {
    if let Ok(custom) = std::env::var("HANDSHAKE_TEST_LOG_FILE") {
        let path = PathBuf::from(custom);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        return std::fs::File::create(&path).ok();
    }

    let dir = find_target_dir().join("test-logs");
    let _ = std::fs::create_dir_all(&dir);
    std::fs::File::create(dir.join("handshake_tests.jsonl")).ok()
}

fn find_target_dir() -> PathBuf {
    if let Ok(target_dir) = std::env::var("CARGO_TARGET_DIR") {
        return PathBuf::from(target_dir);
    }

    let mut cwd = std::env::current_dir().unwrap_or_default();
    loop {
        let target = cwd.join("target");
        if target.is_dir() {
            return target;
        }
        if !cwd.pop() {
            return PathBuf::from("target");
        }
    }
}
