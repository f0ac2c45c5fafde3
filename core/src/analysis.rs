//! Root-cause analyzer: rule-based hypothesis per incident.
//!
//! For each incident:
//!   1. Tally merchant configuration patterns over affected merchants
//!   2. Collect platform error metrics for the issue type's service
//!   3. Walk HYPOTHESIS_RULES top to bottom; the first rule that fires wins
//!
//! The rules are a cascade of specificity, not a scoring contest: a
//! version mismatch outranks missing webhooks even when both hold.
//! The known-issue catalog is NOT consulted here.

use crate::{
    clustering::Incident,
    config::AnalysisConfig,
    error::OpsResult,
    event::PipelineEvent,
    reference::{ErrorMetric, ReferenceData},
    stage::{PipelineStage, RunState},
    types::{IncidentId, MerchantId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FRONTEND_BACKEND_MISMATCH: &str = "frontendBackendMismatch";
pub const MISSING_WEBHOOKS: &str = "missingWebhooks";
pub const INVALID_API_KEY: &str = "invalidApiKey";

pub fn migration_stage_key(stage: &str) -> String {
    format!("migrationStage_{stage}")
}

// ── Hypotheses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hypothesis {
    FrontendBackendVersionMismatch,
    MerchantWebhookMisconfiguration,
    PlatformServiceDegradation,
    Unknown,
}

impl Hypothesis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontendBackendVersionMismatch  => "frontendBackendVersionMismatch",
            Self::MerchantWebhookMisconfiguration => "merchantWebhookMisconfiguration",
            Self::PlatformServiceDegradation      => "platformServiceDegradation",
            Self::Unknown                         => "unknown",
        }
    }

    /// Root cause label used by the known-issue catalog, where one exists.
    pub fn known_root_cause(&self) -> Option<&'static str> {
        match self {
            Self::FrontendBackendVersionMismatch  => Some("versionMismatch"),
            Self::MerchantWebhookMisconfiguration => Some("merchantConfigError"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Pattern tally ────────────────────────────────────────────────────────────

/// Named counters over an incident's merchants. Only counters that were
/// incremented appear; serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternTally(BTreeMap<String, u32>);

impl PatternTally {
    pub fn bump(&mut self, pattern: impl Into<String>) {
        *self.0.entry(pattern.into()).or_insert(0) += 1;
    }

    pub fn get(&self, pattern: &str) -> u32 {
        self.0.get(pattern).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ── Output record ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAnalysis {
    pub incident_id: IncidentId,
    pub issue_type: String,
    pub hypothesis: Hypothesis,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub uncertainties: Vec<String>,
    pub merchant_pattern_summary: PatternTally,
}

// ── Rule cascade ─────────────────────────────────────────────────────────────

/// What the rules get to look at for one incident.
pub struct Signals<'a> {
    pub patterns: &'a PatternTally,
    pub related_errors: &'a [&'a ErrorMetric],
}

struct HypothesisRule {
    hypothesis: Hypothesis,
    confidence: f64,
    evidence: &'static str,
    uncertainty: &'static str,
    fires: fn(&Signals<'_>, &AnalysisConfig) -> bool,
}

const HYPOTHESIS_RULES: &[HypothesisRule] = &[
    HypothesisRule {
        hypothesis: Hypothesis::FrontendBackendVersionMismatch,
        confidence: 0.75,
        evidence: "Multiple merchants have frontend v2 with backend v1",
        uncertainty: "Backend logs do not explicitly confirm mismatch",
        fires: |s, cfg| s.patterns.get(FRONTEND_BACKEND_MISMATCH) >= cfg.mismatch_min_merchants,
    },
    HypothesisRule {
        hypothesis: Hypothesis::MerchantWebhookMisconfiguration,
        confidence: 0.70,
        evidence: "Webhooks not configured for affected merchants",
        uncertainty: "Some merchants report intermittent success",
        fires: |s, cfg| s.patterns.get(MISSING_WEBHOOKS) >= cfg.missing_webhook_min_merchants,
    },
    HypothesisRule {
        hypothesis: Hypothesis::PlatformServiceDegradation,
        confidence: 0.80,
        evidence: "High error rate detected in platform service",
        uncertainty: "No recent deployment data available",
        fires: |s, cfg| {
            s.related_errors
                .first()
                .is_some_and(|m| m.count_last_15_min > cfg.degradation_error_threshold)
        },
    },
];

const FALLBACK_CONFIDENCE: f64 = 0.30;
const FALLBACK_UNCERTAINTY: &str = "Insufficient evidence for a strong hypothesis";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

pub struct RootCauseAnalyzer<'a> {
    reference: &'a ReferenceData,
    config: &'a AnalysisConfig,
}

impl<'a> RootCauseAnalyzer<'a> {
    pub fn new(reference: &'a ReferenceData, config: &'a AnalysisConfig) -> Self {
        Self { reference, config }
    }

    /// Count configuration patterns over `merchants`. Unknown merchants
    /// contribute nothing.
    pub fn tally_patterns<'m>(
        &self,
        merchants: impl IntoIterator<Item = &'m MerchantId>,
    ) -> PatternTally {
        let mut tally = PatternTally::default();

        for merchant_id in merchants {
            let Some(state) = self.reference.merchant(merchant_id) else {
                log::warn!("merchant {merchant_id} has no migration state, skipped");
                continue;
            };

            if state.frontend_version == "v2" && state.backend_version == "v1" {
                tally.bump(FRONTEND_BACKEND_MISMATCH);
            }
            if !state.webhooks_configured {
                tally.bump(MISSING_WEBHOOKS);
            }
            if !state.api_key_valid {
                tally.bump(INVALID_API_KEY);
            }
            tally.bump(migration_stage_key(state.migration_stage.as_str()));
        }

        tally
    }

    /// Error metrics for the service behind `issue_type`, in input order.
    pub fn related_errors(&self, issue_type: &str) -> Vec<&'a ErrorMetric> {
        let Some(service) = self.config.service_for(issue_type) else {
            log::debug!("issue type {issue_type} maps to no platform service");
            return Vec::new();
        };
        self.reference.metrics_for_service(service).collect()
    }

    pub fn analyze(&self, incident: &Incident) -> IncidentAnalysis {
        let patterns = self.tally_patterns(&incident.affected_merchants);
        let related = self.related_errors(&incident.issue_type);
        let signals = Signals { patterns: &patterns, related_errors: &related };

        let (hypothesis, confidence, evidence, uncertainties) = match HYPOTHESIS_RULES
            .iter()
            .find(|rule| (rule.fires)(&signals, self.config))
        {
            Some(rule) => (
                rule.hypothesis,
                rule.confidence,
                vec![rule.evidence.to_string()],
                vec![rule.uncertainty.to_string()],
            ),
            None => (
                Hypothesis::Unknown,
                FALLBACK_CONFIDENCE,
                Vec::new(),
                vec![FALLBACK_UNCERTAINTY.to_string()],
            ),
        };

        log::debug!(
            "{}: {} (confidence {:.2}) from {} merchants, {} related metrics",
            incident.incident_id,
            hypothesis,
            confidence,
            incident.affected_merchants.len(),
            related.len()
        );

        IncidentAnalysis {
            incident_id: incident.incident_id.clone(),
            issue_type: incident.issue_type.clone(),
            hypothesis,
            confidence: round2(confidence),
            evidence,
            uncertainties,
            merchant_pattern_summary: patterns,
        }
    }

    /// One analysis per incident, in incident order.
    pub fn analyze_all(&self, incidents: &[Incident]) -> Vec<IncidentAnalysis> {
        let analyses: Vec<_> = incidents.iter().map(|inc| self.analyze(inc)).collect();
        log::info!("analyzed {} incidents", analyses.len());
        analyses
    }
}

// ── Stage ────────────────────────────────────────────────────────────────────

/// Owns the reference data for the run; analyses are rebuilt from scratch
/// every time the stage runs.
pub struct AnalysisStage {
    reference: ReferenceData,
    config: AnalysisConfig,
}

impl AnalysisStage {
    pub fn new(reference: ReferenceData, config: AnalysisConfig) -> Self {
        Self { reference, config }
    }
}

impl PipelineStage for AnalysisStage {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn run(
        &mut self,
        state: &mut RunState,
        _events_in: &[PipelineEvent],
    ) -> OpsResult<Vec<PipelineEvent>> {
        let analyzer = RootCauseAnalyzer::new(&self.reference, &self.config);
        state.analyses = analyzer.analyze_all(&state.incidents);

        let mut events: Vec<PipelineEvent> = state
            .analyses
            .iter()
            .map(|a| PipelineEvent::IncidentAnalyzed {
                incident_id: a.incident_id.clone(),
                hypothesis: a.hypothesis,
                confidence: a.confidence,
            })
            .collect();

        let unknown = state
            .analyses
            .iter()
            .filter(|a| a.hypothesis == Hypothesis::Unknown)
            .count();
        events.push(PipelineEvent::AnalysisCompleted {
            analyzed: state.analyses.len(),
            unknown,
        });
        Ok(events)
    }
}
