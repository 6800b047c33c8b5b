use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Slot was modified by another user: {slot_id}")]
    ConcurrencyConflict { slot_id: Uuid },

    #[error("Slot store error: {0}")]
    Store(String),
}

#[derive(Error, Debug)]
pub enum SlotStoreError {
    #[error("Stale version for slot {slot_id}: expected version {expected_version}")]
    StaleVersion { slot_id: Uuid, expected_version: i64 },

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<anyhow::Error> for SlotStoreError {
    fn from(err: anyhow::Error) -> Self {
        SlotStoreError::Backend(err.to_string())
    }
}

impl From<SlotStoreError> for AvailabilityError {
    fn from(err: SlotStoreError) -> Self {
        match err {
            SlotStoreError::StaleVersion { slot_id, .. } => {
                AvailabilityError::ConcurrencyConflict { slot_id }
            }
            other => AvailabilityError::Store(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
