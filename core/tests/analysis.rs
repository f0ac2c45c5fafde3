//! Root-cause analyzer tests.
//!
//! Tests cover: pattern tallies, the first-match hypothesis cascade,
//! service mapping for platform errors, and output shape.

use supportops_core::{
    analysis::{Hypothesis, RootCauseAnalyzer},
    clustering::{Incident, IncidentClusterer},
    config::AnalysisConfig,
    reference::{ErrorMetric, MerchantState, MigrationStage, ReferenceData},
    ticket::Ticket,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn merchant(
    id: &str,
    frontend: &str,
    backend: &str,
    webhooks: bool,
    api_key: bool,
    stage: MigrationStage,
) -> MerchantState {
    MerchantState {
        merchant_id: id.into(),
        migration_stage: stage,
        frontend_version: frontend.into(),
        backend_version: backend.into(),
        webhooks_configured: webhooks,
        api_key_valid: api_key,
    }
}

fn healthy(id: &str) -> MerchantState {
    merchant(id, "v2", "v2", true, true, MigrationStage::Post)
}

fn metric(service: &str, count: u32) -> ErrorMetric {
    ErrorMetric {
        service: service.into(),
        error_code: 500,
        count_last_15_min: count,
        merchants_affected: 4,
        timestamp: "2024-03-01T12:00:00".into(),
    }
}

/// One incident of `issue_type` containing one ticket per merchant.
fn incident(issue_type: &str, merchants: &[&str]) -> Incident {
    let tickets: Vec<Ticket> = merchants
        .iter()
        .enumerate()
        .map(|(i, m)| Ticket {
            ticket_id: format!("TCK-{}", 1000 + i),
            merchant_id: m.to_string(),
            issue_type: issue_type.into(),
            description: "test ticket".into(),
            timestamp: format!("2024-03-01T10:{:02}:00", i),
            channel: "chat".into(),
        })
        .collect();
    let mut incidents = IncidentClusterer::new(30).unwrap().cluster(&tickets).unwrap();
    assert_eq!(incidents.len(), 1, "fixture should form one incident");
    incidents.remove(0)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Two merchants on frontend v2 / backend v1 → version mismatch at 0.75.
#[test]
fn version_mismatch_from_two_merchants() {
    let reference = ReferenceData::new(
        vec![
            merchant("M1", "v2", "v1", true, true, MigrationStage::Mid),
            merchant("M2", "v2", "v1", true, true, MigrationStage::Mid),
        ],
        vec![],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    let analysis = analyzer.analyze(&incident("checkoutFailure", &["M1", "M2"]));

    assert_eq!(analysis.hypothesis, Hypothesis::FrontendBackendVersionMismatch);
    assert_eq!(analysis.confidence, 0.75);
    assert_eq!(analysis.merchant_pattern_summary.get("frontendBackendMismatch"), 2);
    assert_eq!(analysis.evidence, vec!["Multiple merchants have frontend v2 with backend v1"]);
    assert_eq!(analysis.uncertainties, vec!["Backend logs do not explicitly confirm mismatch"]);
}

/// When both the mismatch and missing-webhook rules hold, the mismatch wins.
#[test]
fn version_mismatch_outranks_missing_webhooks() {
    let reference = ReferenceData::new(
        vec![
            merchant("M1", "v2", "v1", false, true, MigrationStage::Mid),
            merchant("M2", "v2", "v1", false, true, MigrationStage::Pre),
        ],
        vec![metric("webhookService", 59)],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    let analysis = analyzer.analyze(&incident("webhookMissing", &["M1", "M2"]));

    assert_eq!(analysis.merchant_pattern_summary.get("missingWebhooks"), 2);
    assert_eq!(analysis.hypothesis, Hypothesis::FrontendBackendVersionMismatch);
}

/// Missing webhooks on two merchants outranks a hot platform service.
#[test]
fn missing_webhooks_outranks_platform_errors() {
    let reference = ReferenceData::new(
        vec![
            merchant("M1", "v1", "v1", false, true, MigrationStage::Pre),
            merchant("M2", "v2", "v2", false, true, MigrationStage::Post),
        ],
        vec![metric("webhookService", 55)],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    let analysis = analyzer.analyze(&incident("webhookMissing", &["M1", "M2"]));

    assert_eq!(analysis.hypothesis, Hypothesis::MerchantWebhookMisconfiguration);
    assert_eq!(analysis.confidence, 0.7);
    assert_eq!(analysis.evidence, vec!["Webhooks not configured for affected merchants"]);
}

/// A single mismatched merchant is not enough for the mismatch rule.
#[test]
fn one_mismatched_merchant_is_not_enough() {
    let reference = ReferenceData::new(
        vec![
            merchant("M1", "v2", "v1", true, true, MigrationStage::Mid),
            healthy("M2"),
        ],
        vec![],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    let analysis = analyzer.analyze(&incident("checkoutFailure", &["M1", "M2"]));

    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);
    assert_eq!(analysis.confidence, 0.3);
    assert!(analysis.evidence.is_empty());
    assert_eq!(analysis.uncertainties, vec!["Insufficient evidence for a strong hypothesis"]);
}

/// Degradation fires only when the FIRST metric for the mapped service
/// exceeds 30 (strictly).
#[test]
fn platform_degradation_uses_first_metric_strictly_above_threshold() {
    let config = AnalysisConfig::default();
    let inc = incident("apiError", &["M1"]);

    let hot = ReferenceData::new(
        vec![healthy("M1")],
        vec![metric("checkoutApi", 99), metric("authApi", 31), metric("authApi", 5)],
        vec![],
    );
    let analysis = RootCauseAnalyzer::new(&hot, &config).analyze(&inc);
    assert_eq!(analysis.hypothesis, Hypothesis::PlatformServiceDegradation);
    assert_eq!(analysis.confidence, 0.8);
    assert_eq!(analysis.uncertainties, vec!["No recent deployment data available"]);

    let at_threshold = ReferenceData::new(vec![healthy("M1")], vec![metric("authApi", 30)], vec![]);
    let analysis = RootCauseAnalyzer::new(&at_threshold, &config).analyze(&inc);
    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);

    let first_is_quiet = ReferenceData::new(
        vec![healthy("M1")],
        vec![metric("authApi", 10), metric("authApi", 60)],
        vec![],
    );
    let analysis = RootCauseAnalyzer::new(&first_is_quiet, &config).analyze(&inc);
    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);
}

/// Issue types without a mapped service never see platform errors.
#[test]
fn unmapped_issue_type_has_no_related_errors() {
    let reference = ReferenceData::new(
        vec![healthy("M1")],
        vec![metric("checkoutApi", 60), metric("authApi", 60), metric("webhookService", 60)],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    assert!(analyzer.related_errors("latencyIssue").is_empty());
    assert_eq!(analyzer.related_errors("checkoutFailure").len(), 1);

    let analysis = analyzer.analyze(&incident("latencyIssue", &["M1"]));
    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);
}

/// A mapped service with no metrics simply cannot trigger degradation.
#[test]
fn service_without_metrics_does_not_degrade() {
    let reference = ReferenceData::new(vec![healthy("M1")], vec![], vec![]);
    let config = AnalysisConfig::default();
    let analysis = RootCauseAnalyzer::new(&reference, &config).analyze(&incident("apiError", &["M1"]));
    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);
}

/// Unknown merchants contribute nothing to the tally.
#[test]
fn unknown_merchants_are_skipped() {
    let reference = ReferenceData::new(
        vec![merchant("M1", "v2", "v1", false, false, MigrationStage::Mid)],
        vec![],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    let analysis = analyzer.analyze(&incident("configError", &["M1", "M-GHOST", "M-404"]));

    let summary = &analysis.merchant_pattern_summary;
    assert_eq!(summary.get("frontendBackendMismatch"), 1);
    assert_eq!(summary.get("missingWebhooks"), 1);
    assert_eq!(summary.get("invalidApiKey"), 1);
    assert_eq!(summary.get("migrationStage_mid"), 1);
    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);
}

/// Only incremented counters appear in the summary.
#[test]
fn pattern_summary_omits_zero_counters() {
    let reference = ReferenceData::new(
        vec![healthy("M1"), healthy("M2"), merchant("M3", "v1", "v2", true, false, MigrationStage::Pre)],
        vec![],
        vec![],
    );
    let config = AnalysisConfig::default();
    let analysis =
        RootCauseAnalyzer::new(&reference, &config).analyze(&incident("apiError", &["M1", "M2", "M3"]));

    let json = serde_json::to_value(&analysis.merchant_pattern_summary).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "invalidApiKey": 1,
            "migrationStage_post": 2,
            "migrationStage_pre": 1,
        })
    );
}

/// An incident whose merchants are all unknown has an empty tally.
#[test]
fn all_unknown_merchants_give_empty_summary() {
    let reference = ReferenceData::default();
    let config = AnalysisConfig::default();
    let analysis = RootCauseAnalyzer::new(&reference, &config).analyze(&incident("apiError", &["X"]));
    assert!(analysis.merchant_pattern_summary.is_empty());
    assert_eq!(analysis.hypothesis, Hypothesis::Unknown);
}

/// Same incident + same reference data → identical analysis.
#[test]
fn analysis_is_deterministic() {
    let reference = ReferenceData::new(
        vec![
            merchant("M1", "v2", "v1", false, true, MigrationStage::Mid),
            merchant("M2", "v1", "v1", false, false, MigrationStage::Post),
            healthy("M3"),
        ],
        vec![metric("checkoutApi", 44)],
        vec![],
    );
    let config = AnalysisConfig::default();
    let inc = incident("checkoutFailure", &["M1", "M2", "M3"]);

    let a = RootCauseAnalyzer::new(&reference, &config).analyze(&inc);
    let b = RootCauseAnalyzer::new(&reference, &config).analyze(&inc);

    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

/// The wire record uses camelCase keys and string hypotheses.
#[test]
fn analysis_wire_shape() {
    let reference = ReferenceData::new(vec![healthy("M1")], vec![], vec![]);
    let config = AnalysisConfig::default();
    let analysis = RootCauseAnalyzer::new(&reference, &config).analyze(&incident("apiError", &["M1"]));

    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["incidentId"], "INC-001");
    assert_eq!(json["issueType"], "apiError");
    assert_eq!(json["hypothesis"], "unknown");
    assert_eq!(json["confidence"], 0.3);
    assert!(json["merchantPatternSummary"].is_object());
}

/// Thresholds come from configuration.
#[test]
fn thresholds_are_configurable() {
    let reference = ReferenceData::new(
        vec![merchant("M1", "v2", "v1", true, true, MigrationStage::Mid)],
        vec![],
        vec![],
    );
    let config = AnalysisConfig {
        mismatch_min_merchants: 1,
        ..AnalysisConfig::default()
    };
    let analysis = RootCauseAnalyzer::new(&reference, &config).analyze(&incident("apiError", &["M1"]));
    assert_eq!(analysis.hypothesis, Hypothesis::FrontendBackendVersionMismatch);
}

/// analyze_all keeps incident order and an empty list is fine.
#[test]
fn analyze_all_preserves_order() {
    let reference = ReferenceData::default();
    let config = AnalysisConfig::default();
    let analyzer = RootCauseAnalyzer::new(&reference, &config);

    assert!(analyzer.analyze_all(&[]).is_empty());

    let mut second = incident("apiError", &["M1"]);
    second.incident_id = "INC-002".into();
    let incidents = vec![incident("checkoutFailure", &["M1"]), second];
    let ids: Vec<_> = analyzer
        .analyze_all(&incidents)
        .into_iter()
        .map(|a| a.incident_id)
        .collect();
    assert_eq!(ids, vec!["INC-001", "INC-002"]);
}
