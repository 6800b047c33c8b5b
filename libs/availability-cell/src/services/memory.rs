use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::SlotStoreError;
use crate::models::{Doctor, NewSlot, Slot};
use crate::services::store::SlotStore;

#[derive(Default)]
struct StoreState {
    doctors: HashSet<Uuid>,
    slots: HashMap<Uuid, Slot>,
}

/// Process-local slot store. The version check and bump in `save_slot` happen
/// under one write lock, which makes it a compare-and-swap.
#[derive(Default)]
pub struct InMemorySlotStore {
    state: RwLock<StoreState>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_doctor(&self, doctor_id: Uuid) -> Doctor {
        self.state.write().await.doctors.insert(doctor_id);
        Doctor { id: doctor_id }
    }

    pub async fn slot_count(&self) -> usize {
        self.state.read().await.slots.len()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SlotStoreError> {
        let state = self.state.read().await;
        Ok(state.doctors.contains(&doctor_id).then_some(Doctor { id: doctor_id }))
    }

    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotStoreError> {
        Ok(self.state.read().await.slots.get(&slot_id).cloned())
    }

    async fn list_slots_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SlotStoreError> {
        let state = self.state.read().await;
        let mut slots: Vec<Slot> = state.slots.values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .cloned()
            .collect();
        slots.sort_by(|a, b| (a.slot_date, a.start_time).cmp(&(b.slot_date, b.start_time)));
        Ok(slots)
    }

    async fn insert_slot(&self, slot: NewSlot) -> Result<Slot, SlotStoreError> {
        let slot = slot.into_slot(Uuid::new_v4(), 0);
        self.state.write().await.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn save_slot(&self, slot: &Slot) -> Result<Slot, SlotStoreError> {
        let mut state = self.state.write().await;

        // A vanished row is reported as stale so the caller re-reads it.
        let stored = state.slots.get_mut(&slot.id).ok_or(SlotStoreError::StaleVersion {
            slot_id: slot.id,
            expected_version: slot.version,
        })?;

        if stored.version != slot.version {
            debug!("Version mismatch for slot {}: stored {}, given {}", slot.id, stored.version, slot.version);
            return Err(SlotStoreError::StaleVersion {
                slot_id: slot.id,
                expected_version: slot.version,
            });
        }

        if stored.doctor_id != slot.doctor_id {
            return Err(SlotStoreError::Backend(format!(
                "Slot {} cannot change owner",
                slot.id
            )));
        }

        let mut saved = slot.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }
}
