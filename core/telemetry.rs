use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::policy::DropReason;

#[derive(Debug, Default)]
pub struct Telemetry {
    lines: AtomicU64,
    parsed: AtomicU64,
    parse_failures: AtomicU64,
    unknown_schemes: AtomicU64,
    policy_drops: AtomicU64,
    probe_failures: AtomicU64,
    accepted: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parsed(&self) {
        self.parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_scheme(&self) {
        self.unknown_schemes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self, message: String) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(message);
        }
    }

    pub fn record_policy_drop(&self, reason: DropReason) {
        self.policy_drops.fetch_add(1, Ordering::Relaxed);
        if reason == DropReason::Unreachable {
            self.probe_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let last_error = self.last_error.lock().ok().and_then(|guard| guard.clone());
        TelemetrySnapshot {
            lines: self.lines.load(Ordering::Relaxed),
            parsed: self.parsed.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            unknown_schemes: self.unknown_schemes.load(Ordering::Relaxed),
            policy_drops: self.policy_drops.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TelemetrySnapshot {
    pub lines: u64,
    pub parsed: u64,
    pub parse_failures: u64,
    pub unknown_schemes: u64,
    pub policy_drops: u64,
    pub probe_failures: u64,
    pub accepted: u64,
    pub last_error: Option<String>,
}
