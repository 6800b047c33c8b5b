use std::fmt;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attempts made per slot before a version conflict becomes fatal.
pub const MAX_BLOCK_ATTEMPTS: u32 = 3;

/// Pause between conflicting attempts on the same slot.
pub const BLOCK_RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotMode {
    InPerson,
    Online,
}

impl fmt::Display for SlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotMode::InPerson => write!(f, "in_person"),
            SlotMode::Online => write!(f, "online"),
        }
    }
}

/// One bookable interval owned by one doctor.
///
/// `version` belongs to the store: it is bumped on every successful write and
/// only consulted to detect concurrent modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub mode: SlotMode,
    #[serde(default)]
    pub blocked: bool,
    pub version: i64,
}

/// A slot that has not been persisted yet; the store assigns `id` and `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSlot {
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub mode: SlotMode,
}

impl NewSlot {
    pub fn into_slot(self, id: Uuid, version: i64) -> Slot {
        Slot {
            id,
            doctor_id: self.doctor_id,
            slot_date: self.slot_date,
            start_time: self.start_time,
            end_time: self.end_time,
            mode: self.mode,
            blocked: false,
            version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotsRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i64,
    pub mode: SlotMode,
}

/// What a completed block/unblock batch did, slot by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSlotsSummary {
    pub doctor_id: Uuid,
    pub blocked: bool,
    /// Slots written by this batch.
    pub updated: Vec<Uuid>,
    /// Slots that were already in the requested state.
    pub unchanged: Vec<Uuid>,
}

impl BlockSlotsSummary {
    pub fn new(doctor_id: Uuid, blocked: bool) -> Self {
        Self {
            doctor_id,
            blocked,
            updated: Vec::new(),
            unchanged: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.updated.len() + self.unchanged.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for SlotRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_BLOCK_ATTEMPTS,
            backoff: BLOCK_RETRY_BACKOFF,
        }
    }
}
