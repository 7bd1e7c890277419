//! Shared test helpers

#![allow(dead_code)]

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use taskpool::{LogSink, Severity};

/// Upper bound for any condition a test polls for
pub const DEADLINE: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds, panicking after [`DEADLINE`].
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < DEADLINE, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Log sink that keeps every message for later assertions
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(String, Severity)>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<(String, Severity)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(message, s)| *s == severity && message.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, message: &str, severity: Severity) {
        self.entries.lock().unwrap().push((message.to_string(), severity));
    }
}
