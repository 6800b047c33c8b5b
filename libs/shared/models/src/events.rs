use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoctorEventType {
    AvailabilityUpdated,
}

/// Published by the availability cell whenever a doctor's slots change.
/// Consumers re-read the slots; the event carries no slot data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityUpdatedEvent {
    pub event_id: Uuid,
    pub event_type: DoctorEventType,
    pub doctor_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl AvailabilityUpdatedEvent {
    pub fn new(doctor_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: DoctorEventType::AvailabilityUpdated,
            doctor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
