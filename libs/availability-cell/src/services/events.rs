use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::events::AvailabilityUpdatedEvent;

use crate::error::NotifyError;

/// Sink for "availability updated" notifications. Delivery is best-effort:
/// callers log a failure and carry on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvailabilityNotifier: Send + Sync {
    async fn notify_availability_changed(&self, doctor_id: Uuid) -> Result<(), NotifyError>;
}

/// Publishes [`AvailabilityUpdatedEvent`]s as JSON on a Redis pub/sub channel.
pub struct RedisAvailabilityNotifier {
    pool: Pool,
    channel: String,
}

impl RedisAvailabilityNotifier {
    pub async fn new(config: &AppConfig) -> Result<Self, NotifyError> {
        let redis_url = config.redis_url.clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| NotifyError::Pool(format!("Pool creation error: {}", e)))?;

        let notifier = Self {
            pool,
            channel: config.availability_events_channel.clone(),
        };

        // Test connection
        let mut conn = notifier.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis availability notifier ready on channel {}", notifier.channel);

        Ok(notifier)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn get_connection(&self) -> Result<Connection, NotifyError> {
        self.pool.get().await
            .map_err(|e| NotifyError::Pool(e.to_string()))
    }
}

#[async_trait]
impl AvailabilityNotifier for RedisAvailabilityNotifier {
    async fn notify_availability_changed(&self, doctor_id: Uuid) -> Result<(), NotifyError> {
        let event = AvailabilityUpdatedEvent::new(doctor_id);
        let payload = event.to_json()?;

        let mut conn = self.get_connection().await?;
        let receivers: i64 = conn.publish(&self.channel, payload).await?;

        debug!("Availability event {} for doctor {} delivered to {} subscribers",
               event.event_id, doctor_id, receivers);
        Ok(())
    }
}

/// Notifier for deployments without a broker: the event only reaches the logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl AvailabilityNotifier for LoggingNotifier {
    async fn notify_availability_changed(&self, doctor_id: Uuid) -> Result<(), NotifyError> {
        info!(doctor_id = %doctor_id, "Availability updated");
        Ok(())
    }
}
