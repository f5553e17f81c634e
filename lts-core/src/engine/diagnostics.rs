//! Render counters, readable from any thread while the engine runs.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Default)]
pub struct EngineDiagnostics {
    pub samples_rendered: AtomicUsize,
    pub refills: AtomicUsize,
    pub inference_errors: AtomicUsize,
    pub live_samples_captured: AtomicUsize,
    /// Refills whose wall time exceeded the real-time budget of one hop.
    pub slow_refills: AtomicUsize,
    pub max_refill_micros: AtomicU64,
}

impl EngineDiagnostics {
    pub fn reset(&self) {
        self.samples_rendered.store(0, Ordering::Relaxed);
        self.refills.store(0, Ordering::Relaxed);
        self.inference_errors.store(0, Ordering::Relaxed);
        self.live_samples_captured.store(0, Ordering::Relaxed);
        self.slow_refills.store(0, Ordering::Relaxed);
        self.max_refill_micros.store(0, Ordering::Relaxed);
    }

    /// Record one refill that took `micros`, against a budget of `budget_micros`.
    #[inline]
    pub fn record_refill(&self, micros: u64, budget_micros: u64) {
        self.refills.fetch_add(1, Ordering::Relaxed);
        if micros > budget_micros {
            self.slow_refills.fetch_add(1, Ordering::Relaxed);
        }
        self.max_refill_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_rendered: self.samples_rendered.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            live_samples_captured: self.live_samples_captured.load(Ordering::Relaxed),
            slow_refills: self.slow_refills.load(Ordering::Relaxed),
            max_refill_micros: self.max_refill_micros.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub samples_rendered: usize,
    pub refills: usize,
    pub inference_errors: usize,
    pub live_samples_captured: usize,
    pub slow_refills: usize,
    pub max_refill_micros: u64,
}
