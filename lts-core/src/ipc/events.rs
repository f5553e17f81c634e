//! Event types published by the audio host.
//!
//! | Event | Sent when |
//! |-------|-----------|
//! | `EngineStatusEvent` | the host changes state (loading, running, stopped, error) |
//! | `RenderStatsEvent` | periodically while running, and once at teardown |
//!
//! All events serialize as camelCase JSON so the app can log or forward them
//! unchanged.

use serde::{Deserialize, Serialize};

use crate::engine::DiagnosticsSnapshot;

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the audio host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Created, no stream open.
    Idle,
    /// Opening devices and building streams.
    Loading,
    /// Output stream is playing.
    Running,
    /// Streams dropped; the host may be started again with a new engine.
    Stopped,
    /// A stream reported an unrecoverable error.
    Error,
}

// ---------------------------------------------------------------------------
// Render statistics
// ---------------------------------------------------------------------------

/// Counters plus derived figures for one host session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatsEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub samples_rendered: usize,
    pub refills: usize,
    pub inference_errors: usize,
    pub slow_refills: usize,
    pub max_refill_micros: u64,
    /// Real-time budget of one hop, in microseconds.
    pub hop_budget_micros: u64,
}

impl RenderStatsEvent {
    pub fn from_snapshot(seq: u64, snapshot: &DiagnosticsSnapshot, hop_budget_micros: u64) -> Self {
        Self {
            seq,
            samples_rendered: snapshot.samples_rendered,
            refills: snapshot.refills,
            inference_errors: snapshot.inference_errors,
            slow_refills: snapshot.slow_refills,
            max_refill_micros: snapshot.max_refill_micros,
            hop_budget_micros,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Loading,
            detail: Some("opening output device".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "loading");
        assert_eq!(json["detail"], "opening output device");

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Loading);
        assert_eq!(round_trip.detail.as_deref(), Some("opening output device"));
    }

    #[test]
    fn engine_status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<EngineStatus>(r#""Running""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn render_stats_use_camel_case_fields() {
        let snapshot = DiagnosticsSnapshot {
            samples_rendered: 48_000,
            refills: 94,
            inference_errors: 1,
            live_samples_captured: 0,
            slow_refills: 2,
            max_refill_micros: 15_000,
        };
        let event = RenderStatsEvent::from_snapshot(4, &snapshot, 10_666);

        let json = serde_json::to_value(&event).expect("serialize stats event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["samplesRendered"], 48_000);
        assert_eq!(json["inferenceErrors"], 1);
        assert_eq!(json["slowRefills"], 2);
        assert_eq!(json["maxRefillMicros"], 15_000);
        assert_eq!(json["hopBudgetMicros"], 10_666);
    }
}
