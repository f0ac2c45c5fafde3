//! Pipeline events: the run log.
//!
//! RULE: stages report what they did ONLY through events.
//! Payloads carry no wall-clock data, so the same inputs always
//! produce the same event log.

use crate::{
    analysis::Hypothesis,
    types::{IncidentId, RunId},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during a run.
/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    // ── Engine events ──────────────────────────────
    RunStarted {
        run_id: RunId,
        ticket_count: usize,
    },
    RunCompleted {
        run_id: RunId,
        incident_count: usize,
    },

    // ── Clustering events ──────────────────────────
    IncidentOpened {
        incident_id: IncidentId,
        issue_type: String,
        first_seen: String,
    },
    ClusteringCompleted {
        ticket_count: usize,
        incident_count: usize,
        window_minutes: i64,
    },

    // ── Analysis events ────────────────────────────
    IncidentAnalyzed {
        incident_id: IncidentId,
        hypothesis: Hypothesis,
        confidence: f64,
    },
    AnalysisCompleted {
        analyzed: usize,
        unknown: usize,
    },
}

impl PipelineEvent {
    /// Stable name stored in the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. }          => "run_started",
            Self::RunCompleted { .. }        => "run_completed",
            Self::IncidentOpened { .. }      => "incident_opened",
            Self::ClusteringCompleted { .. } => "clustering_completed",
            Self::IncidentAnalyzed { .. }    => "incident_analyzed",
            Self::AnalysisCompleted { .. }   => "analysis_completed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub seq: u64,
    pub stage: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized PipelineEvent
}
