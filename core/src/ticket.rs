//! Inbound support tickets.

use crate::types::{MerchantId, TicketId};
use serde::{Deserialize, Serialize};

/// A merchant-raised support ticket. Immutable once ingested.
///
/// `timestamp` is kept as the raw ISO-8601 text; the clusterer parses it
/// and fails the whole batch if any ticket carries a malformed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub merchant_id: MerchantId,
    pub issue_type: String,
    pub description: String,
    pub timestamp: String,
    pub channel: String,
}

/// Issue types the synthetic generator emits, with their canned descriptions.
/// Ingested tickets may carry any issue type string.
pub const ISSUE_TEMPLATES: &[(&str, &str)] = &[
    ("checkoutFailure", "Checkout returns 500 after frontend upgrade"),
    ("apiError",        "API authentication failing intermittently"),
    ("webhookMissing",  "Order webhooks not triggering"),
    ("configError",     "Integration broke after migration"),
    ("latencyIssue",    "Checkout loading very slowly"),
];

pub const CHANNELS: &[&str] = &["email", "chat", "dashboard"];
