use std::env;
use tracing::{debug, warn};

pub const DEFAULT_AVAILABILITY_EVENTS_CHANNEL: &str = "doctor-events:availability-updated";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Bearer used for server-side writes. Falls back to the anon key when unset.
    pub supabase_service_role_key: Option<String>,
    pub redis_url: Option<String>,
    pub availability_events_channel: String,
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the environment.
    pub fn load() -> Self {
        if dotenv::dotenv().is_err() {
            debug!("No .env file found, reading process environment only");
        }
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            redis_url: env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            availability_events_channel: env::var("AVAILABILITY_EVENTS_CHANNEL")
                .unwrap_or_else(|_| {
                    warn!("AVAILABILITY_EVENTS_CHANNEL not set, using default");
                    DEFAULT_AVAILABILITY_EVENTS_CHANNEL.to_string()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_events_configured() {
            warn!("REDIS_URL not set - availability events will only be logged");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn is_events_configured(&self) -> bool {
        self.redis_url.is_some() && !self.availability_events_channel.is_empty()
    }

    /// Token sent as `Authorization: Bearer` on store requests.
    pub fn service_token(&self) -> &str {
        self.supabase_service_role_key
            .as_deref()
            .unwrap_or(&self.supabase_anon_key)
    }
}
