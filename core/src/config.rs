use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Clustering ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Maximum distance, in minutes, between an incident's first ticket
    /// and any ticket joining it.
    pub window_minutes: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self { window_minutes: 30 }
    }
}

// ── Root-cause analysis ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub service_map: Vec<(String, String)>, // ordered, not HashMap
    /// Merchants with frontend v2 on backend v1 needed to blame the mismatch.
    pub mismatch_min_merchants: u32,
    /// Merchants without webhooks needed to blame merchant configuration.
    pub missing_webhook_min_merchants: u32,
    /// Error count (last 15 min) the first service metric must exceed.
    pub degradation_error_threshold: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            service_map: vec![
                ("checkoutFailure".into(), "checkoutApi".into()),
                ("apiError".into(),        "authApi".into()),
                ("webhookMissing".into(),  "webhookService".into()),
            ],
            mismatch_min_merchants: 2,
            missing_webhook_min_merchants: 2,
            degradation_error_threshold: 30,
        }
    }
}

impl AnalysisConfig {
    /// Platform service responsible for an issue type, if any.
    pub fn service_for(&self, issue_type: &str) -> Option<&str> {
        self.service_map
            .iter()
            .find(|(issue, _)| issue == issue_type)
            .map(|(_, service)| service.as_str())
    }
}

// ── Synthetic data ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub merchant_count: u32,
    pub ticket_count: u32,
    /// Tickets are spread over this many hours before the anchor time.
    pub history_hours: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            merchant_count: 50,
            ticket_count: 120,
            history_hours: 6,
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub clustering: ClusteringConfig,
    pub analysis: AnalysisConfig,
    pub generator: GeneratorConfig,
}

impl OpsConfig {
    /// Load from a JSON file. Sections left out fall back to defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: OpsConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Config with a custom window, everything else default. Used in tests.
    pub fn with_window(window_minutes: i64) -> Self {
        Self {
            clustering: ClusteringConfig { window_minutes },
            ..Self::default()
        }
    }
}
