use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::SlotStoreError;
use crate::models::{Doctor, NewSlot, Slot};
use crate::services::store::SlotStore;

const DOCTORS_PATH: &str = "/rest/v1/doctors";
const SLOTS_PATH: &str = "/rest/v1/availability_slots";

/// Slot store backed by the `availability_slots` PostgREST table.
///
/// The conditional save filters on both `id` and `version`; PostgREST then
/// returns an empty representation when no row matched, which is how a stale
/// version shows up.
pub struct SupabaseSlotStore {
    supabase: SupabaseClient,
    auth_token: String,
}

impl SupabaseSlotStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: config.service_token().to_string(),
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn parse_slots(rows: Vec<Value>) -> Result<Vec<Slot>, SlotStoreError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(SlotStoreError::from))
            .collect()
    }
}

#[async_trait]
impl SlotStore for SupabaseSlotStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SlotStoreError> {
        let path = format!("{}?id=eq.{}&select=id", DOCTORS_PATH, doctor_id);
        let result: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        Ok(result.into_iter().next())
    }

    async fn get_slot(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotStoreError> {
        let path = format!("{}?id=eq.{}", SLOTS_PATH, slot_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        Ok(Self::parse_slots(result)?.into_iter().next())
    }

    async fn list_slots_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SlotStoreError> {
        debug!("Fetching slots for doctor: {}", doctor_id);

        let path = format!(
            "{}?doctor_id=eq.{}&order=slot_date.asc,start_time.asc",
            SLOTS_PATH, doctor_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        Self::parse_slots(result)
    }

    async fn insert_slot(&self, slot: NewSlot) -> Result<Slot, SlotStoreError> {
        let slot_data = json!({
            "doctor_id": slot.doctor_id,
            "slot_date": slot.slot_date,
            "start_time": slot.start_time.format("%H:%M:%S").to_string(),
            "end_time": slot.end_time.format("%H:%M:%S").to_string(),
            "mode": slot.mode,
            "blocked": false,
            "version": 0
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            SLOTS_PATH,
            Some(&self.auth_token),
            Some(slot_data),
            Some(Self::representation_headers()),
        ).await?;

        Self::parse_slots(result)?
            .into_iter()
            .next()
            .ok_or_else(|| SlotStoreError::Backend("Failed to create slot".to_string()))
    }

    async fn save_slot(&self, slot: &Slot) -> Result<Slot, SlotStoreError> {
        let path = format!("{}?id=eq.{}&version=eq.{}", SLOTS_PATH, slot.id, slot.version);

        // Only the mutable column and the version travel; owner and times are fixed.
        let update_data = json!({
            "blocked": slot.blocked,
            "version": slot.version + 1
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(&self.auth_token),
            Some(update_data),
            Some(Self::representation_headers()),
        ).await?;

        match Self::parse_slots(result)?.into_iter().next() {
            Some(saved) => Ok(saved),
            None => {
                warn!("No row matched slot {} at version {}", slot.id, slot.version);
                Err(SlotStoreError::StaleVersion {
                    slot_id: slot.id,
                    expected_version: slot.version,
                })
            }
        }
    }
}
