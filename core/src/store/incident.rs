//! Incident and analysis record queries.
//!
//! Both tables hold the full record as JSON next to a few indexed
//! columns. Writes replace the run's previous rows wholesale.

use super::RunStore;
use crate::{
    analysis::IncidentAnalysis,
    clustering::Incident,
    error::OpsResult,
};
use rusqlite::params;
use std::collections::BTreeMap;

impl RunStore {
    pub fn replace_incidents(&self, run_id: &str, incidents: &[Incident]) -> OpsResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM incident WHERE run_id=?1", params![run_id])?;
        for (seq, inc) in incidents.iter().enumerate() {
            tx.execute(
                "INSERT INTO incident (run_id, incident_id, seq, issue_type, ticket_count,
                    first_seen, last_updated, status, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run_id,
                    inc.incident_id,
                    seq as i64,
                    inc.issue_type,
                    inc.ticket_count as i64,
                    inc.first_seen.as_str(),
                    inc.last_updated.as_str(),
                    if inc.is_open() { "open" } else { "closed" },
                    serde_json::to_string(inc)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn incidents_for_run(&self, run_id: &str) -> OpsResult<Vec<Incident>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_json FROM incident WHERE run_id=?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut result = Vec::with_capacity(rows.len());
        for json in rows {
            result.push(serde_json::from_str(&json)?);
        }
        Ok(result)
    }

    pub fn replace_analyses(&self, run_id: &str, analyses: &[IncidentAnalysis]) -> OpsResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM incident_analysis WHERE run_id=?1", params![run_id])?;
        for (seq, analysis) in analyses.iter().enumerate() {
            tx.execute(
                "INSERT INTO incident_analysis (run_id, incident_id, seq, hypothesis,
                    confidence, record_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run_id,
                    analysis.incident_id,
                    seq as i64,
                    analysis.hypothesis.as_str(),
                    analysis.confidence,
                    serde_json::to_string(analysis)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn analyses_for_run(&self, run_id: &str) -> OpsResult<Vec<IncidentAnalysis>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_json FROM incident_analysis WHERE run_id=?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut result = Vec::with_capacity(rows.len());
        for json in rows {
            result.push(serde_json::from_str(&json)?);
        }
        Ok(result)
    }

    /// Analysis count per hypothesis label for a run.
    pub fn hypothesis_counts(&self, run_id: &str) -> OpsResult<BTreeMap<String, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT hypothesis, COUNT(*) FROM incident_analysis
             WHERE run_id=?1 GROUP BY hypothesis",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let (hypothesis, count) = row?;
            counts.insert(hypothesis, count);
        }
        Ok(counts)
    }

    // ── Test helpers ─────────────────────────────────────────────────────────

    pub fn incident_count(&self, run_id: &str) -> OpsResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM incident WHERE run_id=?1",
            params![run_id],
            |r| r.get(0),
        )?)
    }

    pub fn analysis_count(&self, run_id: &str) -> OpsResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM incident_analysis WHERE run_id=?1",
            params![run_id],
            |r| r.get(0),
        )?)
    }
}
