//! Incident clusterer: groups tickets into incidents.
//!
//! Tickets are sorted by timestamp (stable: ties keep ingest order) and
//! fed one at a time. Each ticket joins the FIRST open incident, in
//! creation order, that shares its issue type and whose `first_seen`
//! lies within the window. Otherwise it founds a new incident.
//!
//! The window is anchored on `first_seen`, which never moves. An
//! incident's catchment is therefore fixed at creation: a ticket more
//! than W minutes after the founding ticket starts a new incident even
//! when it is close to the incident's most recent ticket. Whether a
//! sliding window (anchored on `last_updated`) was intended is an open
//! question; the fixed anchor is kept until that is decided.

use crate::{
    config::ClusteringConfig,
    error::{OpsError, OpsResult},
    event::PipelineEvent,
    stage::{PipelineStage, RunState},
    ticket::Ticket,
    timestamp::Timestamp,
    types::{IncidentId, MerchantId, TicketId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Closed,
}

/// A cluster of tickets sharing an issue type within a time window.
///
/// `affected_merchants` is a set internally and a sorted array on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub incident_id: IncidentId,
    pub issue_type: String,
    pub ticket_ids: Vec<TicketId>,
    pub affected_merchants: BTreeSet<MerchantId>,
    pub ticket_count: usize,
    pub first_seen: Timestamp,
    pub last_updated: Timestamp,
    pub status: IncidentStatus,
}

impl Incident {
    fn found(incident_id: IncidentId, ticket: &Ticket, at: Timestamp) -> Self {
        Self {
            incident_id,
            issue_type: ticket.issue_type.clone(),
            ticket_ids: vec![ticket.ticket_id.clone()],
            affected_merchants: BTreeSet::from([ticket.merchant_id.clone()]),
            ticket_count: 1,
            first_seen: at.clone(),
            last_updated: at,
            status: IncidentStatus::Open,
        }
    }

    fn absorb(&mut self, ticket: &Ticket, at: Timestamp) {
        self.ticket_ids.push(ticket.ticket_id.clone());
        self.affected_merchants.insert(ticket.merchant_id.clone());
        self.ticket_count += 1;
        self.last_updated = at;
    }

    /// Whether a ticket of `issue_type` at `at` may join this incident.
    pub fn accepts(&self, issue_type: &str, at: &Timestamp, window_secs: i64) -> bool {
        self.status == IncidentStatus::Open
            && self.issue_type == issue_type
            && self.first_seen.seconds_between(at) <= window_secs
    }

    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Open
    }

    /// Minutes between the first and the latest ticket.
    pub fn span_minutes(&self) -> i64 {
        self.first_seen.seconds_between(&self.last_updated) / 60
    }
}

pub fn incident_id(sequence: usize) -> IncidentId {
    format!("INC-{sequence:03}")
}

// ── Clusterer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IncidentClusterer {
    window_minutes: i64,
    window_secs: i64,
}

impl IncidentClusterer {
    /// Rejects negative windows and windows too wide to express in seconds.
    pub fn new(window_minutes: i64) -> OpsResult<Self> {
        let window_secs = window_minutes
            .checked_mul(60)
            .filter(|secs| *secs >= 0)
            .ok_or(OpsError::InvalidWindow { minutes: window_minutes })?;
        Ok(Self { window_minutes, window_secs })
    }

    pub fn from_config(config: &ClusteringConfig) -> OpsResult<Self> {
        Self::new(config.window_minutes)
    }

    pub fn window_minutes(&self) -> i64 {
        self.window_minutes
    }

    /// Partition `tickets` into incidents.
    ///
    /// Every timestamp is parsed before any incident is built, so a single
    /// malformed ticket fails the whole batch.
    pub fn cluster(&self, tickets: &[Ticket]) -> OpsResult<Vec<Incident>> {
        let mut ordered = parse_all(tickets)?;
        // Stable: equal timestamps keep ingest order.
        ordered.sort_by(|(a, _), (b, _)| a.cmp(b));

        let window_secs = self.window_secs;
        let mut incidents: Vec<Incident> = Vec::new();

        for (at, ticket) in ordered {
            let matched = incidents
                .iter()
                .position(|inc| inc.accepts(&ticket.issue_type, &at, window_secs));

            match matched {
                Some(idx) => {
                    let incident = &mut incidents[idx];
                    log::debug!(
                        "ticket {} joins {} ({})",
                        ticket.ticket_id, incident.incident_id, incident.issue_type
                    );
                    incident.absorb(ticket, at);
                }
                None => {
                    let id = incident_id(incidents.len() + 1);
                    log::debug!(
                        "ticket {} opens {} ({}) at {}",
                        ticket.ticket_id, id, ticket.issue_type, at
                    );
                    incidents.push(Incident::found(id, ticket, at));
                }
            }
        }

        log::info!(
            "clustered {} tickets into {} incidents (window {}m)",
            tickets.len(), incidents.len(), self.window_minutes
        );
        Ok(incidents)
    }
}

pub(crate) fn parse_all(tickets: &[Ticket]) -> OpsResult<Vec<(Timestamp, &Ticket)>> {
    tickets
        .iter()
        .map(|ticket| {
            Timestamp::parse(&ticket.timestamp)
                .map(|at| (at, ticket))
                .map_err(|e| OpsError::InvalidTimestamp {
                    ticket_id: ticket.ticket_id.clone(),
                    raw: ticket.timestamp.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

// ── Stage ────────────────────────────────────────────────────────────────────

pub struct ClusteringStage {
    clusterer: IncidentClusterer,
}

impl ClusteringStage {
    pub fn new(clusterer: IncidentClusterer) -> Self {
        Self { clusterer }
    }
}

impl PipelineStage for ClusteringStage {
    fn name(&self) -> &'static str {
        "clustering"
    }

    fn run(
        &mut self,
        state: &mut RunState,
        _events_in: &[PipelineEvent],
    ) -> OpsResult<Vec<PipelineEvent>> {
        state.incidents = self.clusterer.cluster(&state.tickets)?;

        let mut events: Vec<PipelineEvent> = state
            .incidents
            .iter()
            .map(|inc| PipelineEvent::IncidentOpened {
                incident_id: inc.incident_id.clone(),
                issue_type: inc.issue_type.clone(),
                first_seen: inc.first_seen.as_str().to_string(),
            })
            .collect();

        events.push(PipelineEvent::ClusteringCompleted {
            ticket_count: state.tickets.len(),
            incident_count: state.incidents.len(),
            window_minutes: self.clusterer.window_minutes(),
        });
        Ok(events)
    }
}
