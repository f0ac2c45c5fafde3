//! Human approval gate and notification outbox.
//!
//! An operator records APPROVED / REJECTED decisions per incident in the
//! audit log. Approved incidents that have no queued or sent email yet are
//! pending notification. Delivery itself happens elsewhere; this module
//! only decides what should be sent and builds the outbox entry.
//!
//! Incident ids are compared trimmed and lower-cased, since operators and
//! older outbox entries are not consistent about either.

use crate::{
    analysis::IncidentAnalysis,
    clustering::Incident,
    reference::ReferenceData,
    timestamp::Timestamp,
    types::IncidentId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Rejected,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(alias = "incident_id")]
    pub incident_id: IncidentId,
    pub decision: Decision,
    #[serde(default)]
    pub notes: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Queued,
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEmail {
    /// Empty for records written by the legacy email composer.
    #[serde(default)]
    pub email_id: String,
    #[serde(default, alias = "incident_id")]
    pub incident_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub status: EmailStatus,
    #[serde(alias = "created_at")]
    pub created_at: Timestamp,
}

pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Append a decision to the audit log.
pub fn record_decision(
    audit: &mut Vec<AuditEntry>,
    incident_id: &str,
    decision: Decision,
    notes: &str,
    at: Timestamp,
) {
    log::info!("decision {decision:?} recorded for {incident_id}");
    audit.push(AuditEntry {
        incident_id: incident_id.to_string(),
        decision,
        notes: notes.to_string(),
        timestamp: at,
    });
}

// ── Gatekeeper ───────────────────────────────────────────────────────────────

pub struct ApprovalGatekeeper;

impl ApprovalGatekeeper {
    /// Normalized ids of every incident with an APPROVED entry.
    pub fn approved_ids(audit: &[AuditEntry]) -> HashSet<String> {
        audit
            .iter()
            .filter(|e| e.decision == Decision::Approved)
            .map(|e| normalize_id(&e.incident_id))
            .filter(|id| !id.is_empty())
            .collect()
    }
}

// ── Outbox ───────────────────────────────────────────────────────────────────

pub struct Outbox<'a> {
    emails: &'a [OutboxEmail],
}

impl<'a> Outbox<'a> {
    pub fn new(emails: &'a [OutboxEmail]) -> Self {
        Self { emails }
    }

    /// True if a queued or sent email already covers `incident_id`.
    pub fn is_processed(&self, incident_id: &str) -> bool {
        let target = normalize_id(incident_id);
        self.emails.iter().any(|email| {
            matches!(email.status, EmailStatus::Queued | EmailStatus::Sent)
                && email_incident_id(email).is_some_and(|id| id == target)
        })
    }
}

/// The incident an email is about: its id field, or failing that the
/// token following "incident" in the subject line.
fn email_incident_id(email: &OutboxEmail) -> Option<String> {
    let direct = normalize_id(&email.incident_id);
    if !direct.is_empty() {
        return Some(direct);
    }
    let mut words = email.subject.split_whitespace();
    while let Some(word) = words.next() {
        if word
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .eq_ignore_ascii_case("incident")
        {
            return words
                .next()
                .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
                .filter(|w| !w.is_empty())
                .map(normalize_id);
        }
    }
    None
}

/// Approved incidents with nothing queued or sent yet, in incident order.
pub fn pending_notifications<'i>(
    incidents: &'i [Incident],
    audit: &[AuditEntry],
    outbox: &[OutboxEmail],
) -> Vec<&'i Incident> {
    let approved = ApprovalGatekeeper::approved_ids(audit);
    let outbox = Outbox::new(outbox);
    incidents
        .iter()
        .filter(|inc| approved.contains(&normalize_id(&inc.incident_id)))
        .filter(|inc| !outbox.is_processed(&inc.incident_id))
        .collect()
}

/// Build a queued email for an approved incident.
pub fn queue_notification(
    incident: &Incident,
    analysis: Option<&IncidentAnalysis>,
    reference: &ReferenceData,
    at: Timestamp,
) -> OutboxEmail {
    let mut body = format!(
        "Incident {} ({}) affects {} merchants across {} tickets.\n\
         First seen {}, last updated {}.\n",
        incident.incident_id,
        incident.issue_type,
        incident.affected_merchants.len(),
        incident.ticket_count,
        incident.first_seen,
        incident.last_updated,
    );

    if let Some(analysis) = analysis {
        body.push_str(&format!(
            "Root-cause hypothesis: {} (confidence {:.2}).\n",
            analysis.hypothesis, analysis.confidence
        ));
        for line in &analysis.evidence {
            body.push_str(&format!("Evidence: {line}\n"));
        }
        for line in &analysis.uncertainties {
            body.push_str(&format!("Uncertainty: {line}\n"));
        }
        let known = analysis
            .hypothesis
            .known_root_cause()
            .and_then(|cause| reference.known_issue_by_root_cause(cause));
        if let Some(known) = known {
            body.push_str(&format!(
                "Matches known issue {}: recommended action {}.\n",
                known.known_issue_id, known.recommended_action
            ));
        }
    }

    OutboxEmail {
        email_id: uuid::Uuid::new_v4().to_string(),
        incident_id: incident.incident_id.clone(),
        to: None,
        subject: format!("Action approved for incident {}", incident.incident_id),
        body,
        status: EmailStatus::Queued,
        created_at: at,
    }
}
