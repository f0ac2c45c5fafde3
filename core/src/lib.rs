//! Support-operations core: ticket clustering and root-cause analysis.

pub mod analysis;
pub mod approval;
pub mod clustering;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod event;
pub mod generator;
pub mod reference;
pub mod rng;
pub mod stage;
pub mod store;
pub mod ticket;
pub mod timestamp;
pub mod types;
