//! Shared primitive types used across the whole pipeline.

/// Support ticket identifier, e.g. `TCK-1042`.
pub type TicketId = String;

/// Merchant identifier, e.g. `M-007`.
pub type MerchantId = String;

/// Incident identifier, e.g. `INC-003`. Assigned in discovery order.
pub type IncidentId = String;

/// The canonical run identifier.
pub type RunId = String;
