//! Pipeline stage trait and shared run state.
//!
//! RULE: every stage implements PipelineStage.
//! The engine calls run() on each registered stage once per run,
//! in registration order. The order is fixed in engine.rs.

use crate::{
    analysis::IncidentAnalysis,
    clustering::Incident,
    error::OpsResult,
    event::PipelineEvent,
    ticket::Ticket,
};

/// Everything one run reads and produces. Stages fill it in order.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub tickets: Vec<Ticket>,
    pub incidents: Vec<Incident>,
    pub analyses: Vec<IncidentAnalysis>,
}

impl RunState {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self { tickets, ..Self::default() }
    }
}

/// The contract every stage must fulfill.
pub trait PipelineStage {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Called once per run by the engine.
    ///
    /// - `state`:     run state produced by earlier stages
    /// - `events_in`: events emitted so far this run
    ///
    /// Returns the new events to add to the run's event log.
    fn run(
        &mut self,
        state: &mut RunState,
        events_in: &[PipelineEvent],
    ) -> OpsResult<Vec<PipelineEvent>>;
}
