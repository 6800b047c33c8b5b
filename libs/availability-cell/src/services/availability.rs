use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::{AvailabilityError, SlotStoreError};
use crate::models::{BlockSlotsSummary, CreateSlotsRequest, NewSlot, Slot, SlotRetryPolicy};
use crate::services::events::{AvailabilityNotifier, LoggingNotifier, RedisAvailabilityNotifier};
use crate::services::slots::slot_windows;
use crate::services::store::SlotStore;
use crate::services::supabase_store::SupabaseSlotStore;

/// Outcome of one fetch/check/write pass over a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotAttempt {
    Applied,
    AlreadyInState,
    StaleVersion,
}

pub struct AvailabilityService {
    store: Arc<dyn SlotStore>,
    notifier: Arc<dyn AvailabilityNotifier>,
    retry_policy: SlotRetryPolicy,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn SlotStore>, notifier: Arc<dyn AvailabilityNotifier>) -> Self {
        Self {
            store,
            notifier,
            retry_policy: SlotRetryPolicy::default(),
        }
    }

    /// Supabase-backed store; Redis notifications when configured and reachable,
    /// log-only notifications otherwise.
    pub async fn from_config(config: &AppConfig) -> Self {
        let store: Arc<dyn SlotStore> = Arc::new(SupabaseSlotStore::new(config));

        let notifier: Arc<dyn AvailabilityNotifier> = if config.is_events_configured() {
            match RedisAvailabilityNotifier::new(config).await {
                Ok(redis) => Arc::new(redis),
                Err(e) => {
                    warn!("Redis notifier unavailable, falling back to logging: {}", e);
                    Arc::new(LoggingNotifier)
                }
            }
        } else {
            Arc::new(LoggingNotifier)
        };

        Self::new(store, notifier)
    }

    pub fn with_retry_policy(mut self, retry_policy: SlotRetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn retry_policy(&self) -> SlotRetryPolicy {
        self.retry_policy
    }

    /// Split the requested working window into equal slots and persist them.
    pub async fn create_slots(
        &self,
        doctor_id: Uuid,
        request: CreateSlotsRequest,
    ) -> Result<Vec<Slot>, AvailabilityError> {
        debug!("Creating slots for doctor {} on {}", doctor_id, request.date);

        self.store.get_doctor(doctor_id).await?
            .ok_or_else(|| AvailabilityError::NotFound(format!("Doctor not found: {}", doctor_id)))?;

        if request.end_time <= request.start_time {
            return Err(AvailabilityError::InvalidArgument(
                "End time must be after start time".to_string(),
            ));
        }

        if request.slot_minutes <= 0 {
            return Err(AvailabilityError::InvalidArgument(
                "Slot length must be a positive number of minutes".to_string(),
            ));
        }

        let windows = slot_windows(request.start_time, request.end_time, request.slot_minutes);
        let mut created = Vec::with_capacity(windows.len());

        for (start_time, end_time) in windows {
            let slot = self.store.insert_slot(NewSlot {
                doctor_id,
                slot_date: request.date,
                start_time,
                end_time,
                mode: request.mode,
            }).await?;
            created.push(slot);
        }

        info!("Created {} {} slots for doctor {} on {}", created.len(), request.mode, doctor_id, request.date);
        self.publish_availability_updated(doctor_id).await;

        Ok(created)
    }

    /// All slots of a doctor, by date then start time.
    pub async fn list_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>, AvailabilityError> {
        Ok(self.store.list_slots_by_doctor(doctor_id).await?)
    }

    /// Move each listed slot to `blocked`, in order, retrying version conflicts.
    ///
    /// The first fatal error stops the batch; slots handled before it keep
    /// their new state. One notification is sent when the batch loop exits,
    /// whether it completed or stopped early.
    pub async fn block_slots(
        &self,
        doctor_id: Uuid,
        slot_ids: &[Uuid],
        blocked: bool,
    ) -> Result<BlockSlotsSummary, AvailabilityError> {
        debug!("Setting blocked={} on {} slots for doctor {}", blocked, slot_ids.len(), doctor_id);

        let mut summary = BlockSlotsSummary::new(doctor_id, blocked);
        let result = self.apply_batch(doctor_id, slot_ids, blocked, &mut summary).await;

        self.publish_availability_updated(doctor_id).await;

        match result {
            Ok(()) => {
                info!("Doctor {}: {} slots updated, {} already blocked={}",
                      doctor_id, summary.updated.len(), summary.unchanged.len(), blocked);
                Ok(summary)
            }
            Err(e) => {
                warn!("Batch for doctor {} stopped after {} of {} slots: {}",
                      doctor_id, summary.processed(), slot_ids.len(), e);
                Err(e)
            }
        }
    }

    pub async fn unblock_slots(
        &self,
        doctor_id: Uuid,
        slot_ids: &[Uuid],
    ) -> Result<BlockSlotsSummary, AvailabilityError> {
        self.block_slots(doctor_id, slot_ids, false).await
    }

    // Private helper methods

    async fn apply_batch(
        &self,
        doctor_id: Uuid,
        slot_ids: &[Uuid],
        blocked: bool,
        summary: &mut BlockSlotsSummary,
    ) -> Result<(), AvailabilityError> {
        for &slot_id in slot_ids {
            match self.set_slot_blocked(doctor_id, slot_id, blocked).await? {
                SlotAttempt::Applied => summary.updated.push(slot_id),
                _ => summary.unchanged.push(slot_id),
            }
        }
        Ok(())
    }

    async fn set_slot_blocked(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        blocked: bool,
    ) -> Result<SlotAttempt, AvailabilityError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.try_set_slot_blocked(doctor_id, slot_id, blocked).await? {
                SlotAttempt::StaleVersion => {
                    warn!("Optimistic lock conflict for slot {} (attempt {}/{})",
                          slot_id, attempt, max_attempts);

                    if attempt >= max_attempts {
                        error!("Failed to update slot {} after {} attempts", slot_id, max_attempts);
                        return Err(AvailabilityError::ConcurrencyConflict { slot_id });
                    }

                    tokio::time::sleep(self.retry_policy.backoff).await;
                }
                settled => return Ok(settled),
            }
        }
    }

    async fn try_set_slot_blocked(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        blocked: bool,
    ) -> Result<SlotAttempt, AvailabilityError> {
        let mut slot = self.store.get_slot(slot_id).await?
            .ok_or_else(|| AvailabilityError::NotFound(format!("Slot not found: {}", slot_id)))?;

        if slot.doctor_id != doctor_id {
            return Err(AvailabilityError::InvalidArgument(format!(
                "Slot {} does not belong to doctor {}",
                slot_id, doctor_id
            )));
        }

        if slot.blocked == blocked {
            info!("Slot {} already in desired state (blocked={})", slot_id, blocked);
            return Ok(SlotAttempt::AlreadyInState);
        }

        slot.blocked = blocked;
        match self.store.save_slot(&slot).await {
            Ok(saved) => {
                debug!("Slot {} saved at version {}", slot_id, saved.version);
                Ok(SlotAttempt::Applied)
            }
            Err(SlotStoreError::StaleVersion { .. }) => Ok(SlotAttempt::StaleVersion),
            Err(e) => Err(e.into()),
        }
    }

    async fn publish_availability_updated(&self, doctor_id: Uuid) {
        if let Err(e) = self.notifier.notify_availability_changed(doctor_id).await {
            warn!("Failed to publish availability update for doctor {}: {}", doctor_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveTime};
    use mockall::predicate::eq;

    use crate::error::NotifyError;
    use crate::models::{Doctor, SlotMode};
    use crate::services::events::MockAvailabilityNotifier;
    use crate::services::store::MockSlotStore;

    fn slot(doctor_id: Uuid, blocked: bool, version: i64) -> Slot {
        Slot {
            id: Uuid::new_v4(),
            doctor_id,
            slot_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 20, 0).unwrap(),
            mode: SlotMode::InPerson,
            blocked,
            version,
        }
    }

    fn notifier_expecting(doctor_id: Uuid, times: usize) -> MockAvailabilityNotifier {
        let mut notifier = MockAvailabilityNotifier::new();
        notifier.expect_notify_availability_changed()
            .with(eq(doctor_id))
            .times(times)
            .returning(|_| Ok(()));
        notifier
    }

    fn service(store: MockSlotStore, notifier: MockAvailabilityNotifier) -> AvailabilityService {
        AvailabilityService::new(Arc::new(store), Arc::new(notifier))
    }

    fn stale(slot: &Slot) -> SlotStoreError {
        SlotStoreError::StaleVersion { slot_id: slot.id, expected_version: slot.version }
    }

    #[tokio::test]
    async fn persistent_conflict_gives_up_after_three_attempts() {
        let doctor_id = Uuid::new_v4();
        let target = slot(doctor_id, false, 7);
        let slot_id = target.id;

        let mut store = MockSlotStore::new();
        let fetched = target.clone();
        store.expect_get_slot()
            .with(eq(slot_id))
            .times(3)
            .returning(move |_| Ok(Some(fetched.clone())));
        store.expect_save_slot()
            .times(3)
            .returning(|s| Err(stale(s)));

        let service = service(store, notifier_expecting(doctor_id, 1));

        let started = Instant::now();
        let err = service.block_slots(doctor_id, &[slot_id], true).await.unwrap_err();

        assert_matches!(err, AvailabilityError::ConcurrencyConflict { slot_id: id } if id == slot_id);
        assert!(err.to_string().contains(&slot_id.to_string()));
        // two pauses between three attempts
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn conflict_then_success_is_invisible_to_caller() {
        let doctor_id = Uuid::new_v4();
        let target = slot(doctor_id, false, 1);
        let slot_id = target.id;

        let mut store = MockSlotStore::new();
        let fetched = target.clone();
        store.expect_get_slot()
            .times(2)
            .returning(move |_| Ok(Some(fetched.clone())));

        let mut seq = mockall::Sequence::new();
        store.expect_save_slot()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|s| Err(stale(s)));
        store.expect_save_slot()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|s: &Slot| s.blocked)
            .returning(|s| {
                let mut saved = s.clone();
                saved.version += 1;
                Ok(saved)
            });

        let service = service(store, notifier_expecting(doctor_id, 1))
            .with_retry_policy(SlotRetryPolicy { max_attempts: 3, backoff: Duration::ZERO });

        let summary = service.block_slots(doctor_id, &[slot_id], true).await.unwrap();
        assert_eq!(summary.updated, vec![slot_id]);
        assert!(summary.unchanged.is_empty());
    }

    #[tokio::test]
    async fn slot_already_in_state_is_not_written() {
        let doctor_id = Uuid::new_v4();
        let target = slot(doctor_id, true, 2);
        let slot_id = target.id;

        let mut store = MockSlotStore::new();
        store.expect_get_slot()
            .times(1)
            .returning(move |_| Ok(Some(target.clone())));
        store.expect_save_slot().never();

        let service = service(store, notifier_expecting(doctor_id, 1));

        let summary = service.block_slots(doctor_id, &[slot_id], true).await.unwrap();
        assert_eq!(summary.unchanged, vec![slot_id]);
        assert!(summary.updated.is_empty());
    }

    #[tokio::test]
    async fn foreign_slot_is_rejected_without_writing() {
        let doctor_id = Uuid::new_v4();
        let foreign = slot(Uuid::new_v4(), false, 0);
        let slot_id = foreign.id;

        let mut store = MockSlotStore::new();
        store.expect_get_slot()
            .times(1)
            .returning(move |_| Ok(Some(foreign.clone())));
        store.expect_save_slot().never();

        let service = service(store, notifier_expecting(doctor_id, 1));

        let err = service.block_slots(doctor_id, &[slot_id], true).await.unwrap_err();
        assert_matches!(err, AvailabilityError::InvalidArgument(msg) if msg.contains("does not belong"));
    }

    #[tokio::test]
    async fn missing_slot_aborts_the_batch() {
        let doctor_id = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let never_reached = Uuid::new_v4();

        let mut store = MockSlotStore::new();
        store.expect_get_slot()
            .with(eq(missing))
            .times(1)
            .returning(|_| Ok(None));
        store.expect_get_slot()
            .with(eq(never_reached))
            .never();

        let service = service(store, notifier_expecting(doctor_id, 1));

        let err = service.block_slots(doctor_id, &[missing, never_reached], true).await.unwrap_err();
        assert_matches!(err, AvailabilityError::NotFound(msg) if msg.contains(&missing.to_string()));
    }

    #[tokio::test]
    async fn backend_failures_are_not_retried() {
        let doctor_id = Uuid::new_v4();
        let target = slot(doctor_id, false, 0);
        let slot_id = target.id;

        let mut store = MockSlotStore::new();
        store.expect_get_slot()
            .times(1)
            .returning(move |_| Ok(Some(target.clone())));
        store.expect_save_slot()
            .times(1)
            .returning(|_| Err(SlotStoreError::Backend("API error (500): boom".to_string())));

        let service = service(store, notifier_expecting(doctor_id, 1));

        let err = service.block_slots(doctor_id, &[slot_id], true).await.unwrap_err();
        assert_matches!(err, AvailabilityError::Store(_));
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_the_batch() {
        let doctor_id = Uuid::new_v4();
        let target = slot(doctor_id, false, 0);
        let slot_id = target.id;

        let mut store = MockSlotStore::new();
        store.expect_get_slot()
            .returning(move |_| Ok(Some(target.clone())));
        store.expect_save_slot().never();

        let mut notifier = MockAvailabilityNotifier::new();
        notifier.expect_notify_availability_changed()
            .times(1)
            .returning(|_| Err(NotifyError::Pool("connection refused".to_string())));

        let service = service(store, notifier);

        let summary = service.unblock_slots(doctor_id, &[slot_id]).await.unwrap();
        assert_eq!(summary.unchanged, vec![slot_id]);
        assert!(!summary.blocked);
    }

    #[tokio::test]
    async fn create_slots_for_unknown_doctor_persists_nothing() {
        let doctor_id = Uuid::new_v4();

        let mut store = MockSlotStore::new();
        store.expect_get_doctor()
            .with(eq(doctor_id))
            .times(1)
            .returning(|_| Ok(None));
        store.expect_insert_slot().never();

        let service = service(store, notifier_expecting(doctor_id, 0));

        let request = CreateSlotsRequest {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            slot_minutes: 20,
            mode: SlotMode::Online,
        };
        let err = service.create_slots(doctor_id, request).await.unwrap_err();
        assert_matches!(err, AvailabilityError::NotFound(_));
    }

    #[tokio::test]
    async fn create_slots_rejects_bad_windows() {
        let doctor_id = Uuid::new_v4();

        let mut store = MockSlotStore::new();
        store.expect_get_doctor()
            .returning(move |id| Ok(Some(Doctor { id })));
        store.expect_insert_slot().never();

        let service = service(store, notifier_expecting(doctor_id, 0));

        let base = CreateSlotsRequest {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            slot_minutes: 20,
            mode: SlotMode::InPerson,
        };

        let reversed = service.create_slots(doctor_id, base.clone()).await.unwrap_err();
        assert_matches!(reversed, AvailabilityError::InvalidArgument(msg) if msg.contains("after start"));

        let empty = CreateSlotsRequest { end_time: base.start_time, ..base.clone() };
        assert_matches!(
            service.create_slots(doctor_id, empty).await,
            Err(AvailabilityError::InvalidArgument(_))
        );

        let zero_length = CreateSlotsRequest {
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            slot_minutes: 0,
            ..base
        };
        assert_matches!(
            service.create_slots(doctor_id, zero_length).await,
            Err(AvailabilityError::InvalidArgument(_))
        );
    }

    #[test]
    fn default_policy_is_three_attempts_with_short_backoff() {
        let service = service(MockSlotStore::new(), MockAvailabilityNotifier::new());
        let policy = service.retry_policy();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(100));
    }
}
