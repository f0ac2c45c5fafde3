//! Deterministic synthetic support-ops datasets.
//!
//! Produces merchant migration state, support tickets, platform error
//! metrics and the seed known-issue catalog. Tickets are deliberately
//! repetitive so clustering has something to find.
//!
//! Same seed + same anchor time = byte-identical datasets.

use crate::{
    config::GeneratorConfig,
    dataset::{self, TICKETS_FILE},
    error::OpsResult,
    reference::{
        seed_known_issues, ErrorMetric, KnownIssue, MerchantState, MigrationStage,
        ReferenceData, ERROR_METRICS_FILE, KNOWN_ISSUES_FILE, MERCHANT_STATE_FILE,
    },
    rng::{DatasetRng, DatasetSlot, RngBank},
    ticket::{Ticket, CHANNELS, ISSUE_TEMPLATES},
    timestamp::Timestamp,
};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

const VERSIONS: &[&str] = &["v1", "v2"];
const SERVICES: &[&str] = &["checkoutApi", "authApi", "webhookService"];
const ERROR_CODES: &[u16] = &[400, 401, 403, 500];
const FIRST_TICKET_NUMBER: u32 = 1000;
/// Ticket history is capped at one year.
pub const MAX_HISTORY_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub merchants: Vec<MerchantState>,
    pub tickets: Vec<Ticket>,
    pub error_metrics: Vec<ErrorMetric>,
    pub known_issues: Vec<KnownIssue>,
}

impl SyntheticDataset {
    /// Write every dataset file into `data_dir`.
    pub fn write(&self, data_dir: &Path) -> OpsResult<()> {
        dataset::write_records(&data_dir.join(MERCHANT_STATE_FILE), &self.merchants)?;
        dataset::write_records(&data_dir.join(TICKETS_FILE), &self.tickets)?;
        dataset::write_records(&data_dir.join(ERROR_METRICS_FILE), &self.error_metrics)?;
        dataset::write_records(&data_dir.join(KNOWN_ISSUES_FILE), &self.known_issues)?;
        log::info!("synthetic dataset written to {}", data_dir.display());
        Ok(())
    }

    pub fn reference(&self) -> ReferenceData {
        ReferenceData::new(
            self.merchants.clone(),
            self.error_metrics.clone(),
            self.known_issues.clone(),
        )
    }
}

pub struct DataGenerator {
    config: GeneratorConfig,
    anchor: DateTime<Utc>,
    bank: RngBank,
}

impl DataGenerator {
    /// `anchor` plays the role of "now": tickets fall in the
    /// `history_hours` before it and metrics are stamped with it.
    pub fn new(config: GeneratorConfig, anchor: DateTime<Utc>) -> Self {
        let bank = RngBank::new(config.seed);
        Self { config, anchor, bank }
    }

    pub fn generate(&self) -> SyntheticDataset {
        let merchants = self.merchants(&mut self.bank.for_dataset(DatasetSlot::Merchants));
        let tickets = self.tickets(&merchants, &mut self.bank.for_dataset(DatasetSlot::Tickets));
        let error_metrics = self.error_metrics(&mut self.bank.for_dataset(DatasetSlot::ErrorMetrics));

        log::info!(
            "generated {} merchants, {} tickets, {} error metrics (seed {})",
            merchants.len(), tickets.len(), error_metrics.len(), self.config.seed
        );

        SyntheticDataset {
            merchants,
            tickets,
            error_metrics,
            known_issues: seed_known_issues(),
        }
    }

    fn merchants(&self, rng: &mut DatasetRng) -> Vec<MerchantState> {
        (1..=self.config.merchant_count)
            .map(|i| MerchantState {
                merchant_id: format!("M-{i:03}"),
                frontend_version: rng.pick(VERSIONS).to_string(),
                backend_version: rng.pick(VERSIONS).to_string(),
                migration_stage: *rng.pick(&MigrationStage::ALL),
                webhooks_configured: rng.coin(),
                api_key_valid: rng.coin(),
            })
            .collect()
    }

    fn tickets(&self, merchants: &[MerchantState], rng: &mut DatasetRng) -> Vec<Ticket> {
        if merchants.is_empty() {
            return Vec::new();
        }
        let history_hours = self.config.history_hours.clamp(0, MAX_HISTORY_HOURS);
        let start = self.anchor - Duration::hours(history_hours);
        let span_minutes = (history_hours * 60).max(1) as u64;

        (0..self.config.ticket_count)
            .map(|i| {
                let merchant = rng.pick(merchants);
                let (issue_type, description) = *rng.pick(ISSUE_TEMPLATES);
                let offset = rng.range_inclusive(1, span_minutes) as i64;
                let at = Timestamp::from_instant(start + Duration::minutes(offset));

                Ticket {
                    ticket_id: format!("TCK-{}", FIRST_TICKET_NUMBER + i),
                    merchant_id: merchant.merchant_id.clone(),
                    issue_type: issue_type.to_string(),
                    description: description.to_string(),
                    timestamp: at.as_str().to_string(),
                    channel: rng.pick(CHANNELS).to_string(),
                }
            })
            .collect()
    }

    fn error_metrics(&self, rng: &mut DatasetRng) -> Vec<ErrorMetric> {
        let stamp = Timestamp::from_instant(self.anchor);
        SERVICES
            .iter()
            .map(|service| ErrorMetric {
                service: service.to_string(),
                error_code: *rng.pick(ERROR_CODES),
                count_last_15_min: rng.range_inclusive(5, 60) as u32,
                merchants_affected: rng.range_inclusive(3, 25) as u32,
                timestamp: stamp.as_str().to_string(),
            })
            .collect()
    }
}
