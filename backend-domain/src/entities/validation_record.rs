// Validation audit record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit entry for every scan the gate sees, admitted or
/// refused. Never mutated; the enforced once-only admit lives on the
/// Ticket, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: Uuid,
    pub ticket_number: String,
    pub outcome: String,
    pub validator: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

pub const OUTCOME_ADMITTED: &str = "admitted";

impl ValidationRecord {
    pub fn new(
        ticket_number: &str,
        outcome: &str,
        validator: &str,
        location: &str,
        notes: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_number: ticket_number.to_string(),
            outcome: outcome.to_string(),
            validator: validator.trim().to_string(),
            location: location.trim().to_string(),
            notes: notes.map(str::to_string),
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidationLogQuery {
    pub limit: Option<usize>,
}
