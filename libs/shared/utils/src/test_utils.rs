use std::sync::{Arc, Once};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use shared_config::AppConfig;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per test binary.
/// Honours `RUST_LOG`, defaulting to `debug`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: Option<String>,
    pub redis_url: Option<String>,
    pub availability_events_channel: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: Some("test-service-role-key".to_string()),
            redis_url: None,
            availability_events_channel: "test:availability-updated".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the config at a mock server such as `wiremock::MockServer::uri()`.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            redis_url: self.redis_url.clone(),
            availability_events_channel: self.availability_events_channel.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(doctor_id: Uuid) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "first_name": "Test",
            "last_name": "Doctor",
            "specialty": "General Practice",
            "is_available": true
        })
    }

    pub fn slot_row(
        slot_id: Uuid,
        doctor_id: Uuid,
        start_time: &str,
        end_time: &str,
        blocked: bool,
        version: i64,
    ) -> serde_json::Value {
        json!({
            "id": slot_id,
            "doctor_id": doctor_id,
            "slot_date": "2025-03-10",
            "start_time": start_time,
            "end_time": end_time,
            "mode": "in_person",
            "blocked": blocked,
            "version": version
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
