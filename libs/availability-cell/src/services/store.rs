use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SlotStoreError;
use crate::models::{Doctor, NewSlot, Slot};

/// Durable keyed storage for slots.
///
/// `save_slot` is the only way to change an existing slot. It must compare the
/// slot's `version` with the stored one atomically, fail with
/// [`SlotStoreError::StaleVersion`] on mismatch, and otherwise persist the slot
/// with `version + 1`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SlotStoreError>;

    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotStoreError>;

    /// Slots of one doctor ordered by date, then start time.
    async fn list_slots_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SlotStoreError>;

    async fn insert_slot(&self, slot: NewSlot) -> Result<Slot, SlotStoreError>;

    async fn save_slot(&self, slot: &Slot) -> Result<Slot, SlotStoreError>;
}
