//! The pipeline engine: one batch run from tickets to analyses.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Clustering stage   tickets   → incidents
//!   2. Analysis stage     incidents → incident analyses
//!
//! RULES:
//!   - Stages execute in registration order, once per run.
//!   - Reference data is handed to stages at build time, never read globally.
//!   - Tickets are validated before the run is registered, so a run that
//!     fails on bad input leaves nothing in the store.
//!   - Every event is recorded in the event log.
//!   - A run's incidents and analyses replace the previous ones wholesale.

use crate::{
    analysis::{AnalysisStage, IncidentAnalysis},
    clustering::{self, ClusteringStage, Incident, IncidentClusterer},
    config::OpsConfig,
    error::OpsResult,
    event::{EventLogEntry, PipelineEvent},
    reference::ReferenceData,
    stage::{PipelineStage, RunState},
    store::RunStore,
    ticket::Ticket,
    types::RunId,
};
use std::time::Instant;

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: &'static str,
    pub seconds: f64,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub incidents: Vec<Incident>,
    pub analyses: Vec<IncidentAnalysis>,
    pub events: Vec<PipelineEvent>,
    pub timings: Vec<StageTiming>,
}

pub struct PipelineEngine {
    pub run_id:     RunId,
    window_minutes: i64,
    stages:         Vec<Box<dyn PipelineStage>>,
    store:          RunStore,
    next_seq:       u64,
}

impl PipelineEngine {
    pub fn new(run_id: RunId, window_minutes: i64, store: RunStore) -> Self {
        Self {
            run_id,
            window_minutes,
            stages: Vec::new(),
            store,
            next_seq: 0,
        }
    }

    /// Build a fully wired engine with all stages registered.
    pub fn build(
        run_id: RunId,
        config: &OpsConfig,
        reference: ReferenceData,
        store: RunStore,
    ) -> OpsResult<Self> {
        let clusterer = IncidentClusterer::from_config(&config.clustering)?;
        let mut engine = PipelineEngine::new(run_id, clusterer.window_minutes(), store);
        // Execution order is fixed: clustering, then analysis.
        engine.register(Box::new(ClusteringStage::new(clusterer)));
        engine.register(Box::new(AnalysisStage::new(reference, config.analysis.clone())));
        Ok(engine)
    }

    /// In-memory store, migrated. Used by tests.
    pub fn build_test(
        run_id: RunId,
        config: &OpsConfig,
        reference: ReferenceData,
    ) -> OpsResult<Self> {
        let store = RunStore::in_memory()?;
        store.migrate()?;
        Self::build(run_id, config, reference, store)
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, stage: Box<dyn PipelineStage>) {
        self.stages.push(stage);
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Run every stage over `tickets`.
    pub fn run(&mut self, tickets: Vec<Ticket>) -> OpsResult<RunOutput> {
        clustering::parse_all(&tickets)?;
        self.store
            .insert_run(&self.run_id, self.window_minutes, env!("CARGO_PKG_VERSION"))?;

        let mut state = RunState::new(tickets);
        let mut run_events = Vec::new();
        let mut timings = Vec::new();

        let started = PipelineEvent::RunStarted {
            run_id: self.run_id.clone(),
            ticket_count: state.tickets.len(),
        };
        self.record("engine", &started)?;
        run_events.push(started);

        for stage in &mut self.stages {
            let clock = Instant::now();
            let new_events = stage.run(&mut state, &run_events)?;
            let seconds = clock.elapsed().as_secs_f64();

            for event in &new_events {
                let entry = EventLogEntry {
                    id:         None,
                    run_id:     self.run_id.clone(),
                    seq:        self.next_seq,
                    stage:      stage.name().to_string(),
                    event_type: event.type_name().to_string(),
                    payload:    serde_json::to_string(event)?,
                };
                self.store.append_event(&entry)?;
                self.next_seq += 1;
            }

            log::info!(
                "stage {} finished in {seconds:.3}s ({} events)",
                stage.name(), new_events.len()
            );
            timings.push(StageTiming { stage: stage.name(), seconds });
            run_events.extend(new_events);
        }

        self.store.replace_incidents(&self.run_id, &state.incidents)?;
        self.store.replace_analyses(&self.run_id, &state.analyses)?;

        let completed = PipelineEvent::RunCompleted {
            run_id: self.run_id.clone(),
            incident_count: state.incidents.len(),
        };
        self.record("engine", &completed)?;
        run_events.push(completed);

        Ok(RunOutput {
            incidents: state.incidents,
            analyses: state.analyses,
            events: run_events,
            timings,
        })
    }

    /// Event log for this engine's run, in insertion order.
    pub fn store_events(&self) -> OpsResult<Vec<EventLogEntry>> {
        self.store.events_for_run(&self.run_id)
    }

    fn record(&mut self, stage: &str, event: &PipelineEvent) -> OpsResult<()> {
        let entry = EventLogEntry {
            id:         None,
            run_id:     self.run_id.clone(),
            seq:        self.next_seq,
            stage:      stage.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        };
        self.store.append_event(&entry)?;
        self.next_seq += 1;
        Ok(())
    }
}
