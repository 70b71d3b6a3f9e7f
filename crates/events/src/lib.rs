//! Event bus, audit persistence, and notification delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the audit event envelope published after each
//!   committed workflow change.
//! - [`EventPersistence`]: background service writing every event to the
//!   `platform_events` table.
//! - [`delivery`]: outbound message channels (SMTP, log-only).
//! - [`NotificationRelay`]: background worker draining the notification
//!   outbox with timeouts and retry backoff.

pub mod bus;
pub mod delivery;
pub mod persistence;
pub mod relay;

pub use bus::{AuditKind, EventBus, PlatformEvent};
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
pub use delivery::{LogDelivery, MessageSender};
pub use persistence::EventPersistence;
pub use relay::{NotificationRelay, RelayConfig};
