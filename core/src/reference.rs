//! Read-only reference data consulted during root-cause analysis.
//!
//! RULE: reference data is passed explicitly to whoever needs it.
//! Nothing in the pipeline reads it from ambient/global state.

use crate::{
    dataset,
    error::OpsResult,
    types::MerchantId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const MERCHANT_STATE_FILE: &str = "merchantMigrationState.json";
pub const ERROR_METRICS_FILE: &str = "errorMetrics.json";
pub const KNOWN_ISSUES_FILE: &str = "knownIssues.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStage {
    Pre,
    Mid,
    Post,
}

impl MigrationStage {
    pub const ALL: [MigrationStage; 3] = [Self::Pre, Self::Mid, Self::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre  => "pre",
            Self::Mid  => "mid",
            Self::Post => "post",
        }
    }
}

/// A merchant's position in the hosted → headless migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantState {
    pub merchant_id: MerchantId,
    pub migration_stage: MigrationStage,
    pub frontend_version: String,
    pub backend_version: String,
    pub webhooks_configured: bool,
    pub api_key_valid: bool,
}

/// Aggregated platform error signal for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetric {
    pub service: String,
    pub error_code: u16,
    pub count_last_15_min: u32,
    pub merchants_affected: u32,
    pub timestamp: String,
}

/// Historical knowledge: a configuration pattern and what it usually means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownIssue {
    pub known_issue_id: String,
    pub pattern: String,
    pub impact: String,
    pub root_cause: String,
    pub recommended_action: String,
}

/// The seed catalog shipped with every generated dataset.
pub fn seed_known_issues() -> Vec<KnownIssue> {
    vec![
        KnownIssue {
            known_issue_id: "KI-001".into(),
            pattern: "frontendV2 + backendV1".into(),
            impact: "checkoutFailure".into(),
            root_cause: "versionMismatch".into(),
            recommended_action: "delayFrontendRollout".into(),
        },
        KnownIssue {
            known_issue_id: "KI-002".into(),
            pattern: "webhooksConfigured=false".into(),
            impact: "orderEventsMissing".into(),
            root_cause: "merchantConfigError".into(),
            recommended_action: "guideWebhookSetup".into(),
        },
    ]
}

/// All reference inputs for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    merchants: HashMap<MerchantId, MerchantState>,
    error_metrics: Vec<ErrorMetric>,
    known_issues: Vec<KnownIssue>,
}

impl ReferenceData {
    pub fn new(
        merchants: Vec<MerchantState>,
        error_metrics: Vec<ErrorMetric>,
        known_issues: Vec<KnownIssue>,
    ) -> Self {
        let merchants = merchants
            .into_iter()
            .map(|m| (m.merchant_id.clone(), m))
            .collect();
        Self { merchants, error_metrics, known_issues }
    }

    /// Load from the data directory. Missing files count as empty inputs.
    pub fn load(data_dir: &Path) -> OpsResult<Self> {
        let merchants: Vec<MerchantState> =
            dataset::load_records(&data_dir.join(MERCHANT_STATE_FILE))?;
        let error_metrics: Vec<ErrorMetric> =
            dataset::load_records(&data_dir.join(ERROR_METRICS_FILE))?;
        let known_issues: Vec<KnownIssue> =
            dataset::load_records(&data_dir.join(KNOWN_ISSUES_FILE))?;

        log::info!(
            "reference data: {} merchants, {} error metrics, {} known issues",
            merchants.len(), error_metrics.len(), known_issues.len()
        );
        Ok(Self::new(merchants, error_metrics, known_issues))
    }

    pub fn merchant(&self, merchant_id: &str) -> Option<&MerchantState> {
        self.merchants.get(merchant_id)
    }

    pub fn merchant_count(&self) -> usize {
        self.merchants.len()
    }

    /// Error metrics reported by `service`, in input order.
    pub fn metrics_for_service<'a>(
        &'a self,
        service: &'a str,
    ) -> impl Iterator<Item = &'a ErrorMetric> + 'a {
        self.error_metrics.iter().filter(move |m| m.service == service)
    }

    pub fn error_metrics(&self) -> &[ErrorMetric] {
        &self.error_metrics
    }

    pub fn known_issues(&self) -> &[KnownIssue] {
        &self.known_issues
    }

    /// Catalog entry whose root cause label matches `root_cause`.
    pub fn known_issue_by_root_cause(&self, root_cause: &str) -> Option<&KnownIssue> {
        self.known_issues.iter().find(|k| k.root_cause == root_cause)
    }
}
