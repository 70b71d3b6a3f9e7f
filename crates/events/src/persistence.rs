//! Durable audit persistence.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every [`PlatformEvent`] to the `platform_events` table. It
//! runs as a long-lived background task and exits when the bus is dropped.

use tokio::sync::broadcast;
use excursions_core::types::DbId;
use excursions_db::repositories::PlatformEventRepo;
use excursions_db::DbPool;

use crate::bus::PlatformEvent;

/// Background service that persists platform events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = event.kind.as_str(),
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write a single event to `platform_events`.
    pub async fn persist(pool: &DbPool, event: &PlatformEvent) -> Result<DbId, sqlx::Error> {
        PlatformEventRepo::insert(
            pool,
            event.kind.as_str(),
            Some(event.kind.entity_type()),
            Some(event.entity_id),
            Some(event.actor.as_str()),
            &event.payload,
        )
        .await
    }
}
