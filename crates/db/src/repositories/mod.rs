//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Single
//! statements accept any Postgres executor (`&PgPool` or `&mut *tx`) so
//! they compose into the caller's transaction; methods that issue several
//! statements take `&mut PgConnection`.

pub mod activity_repo;
pub mod approval_step_repo;
pub mod conflict_repo;
pub mod event_repo;
pub mod outbox_repo;
pub mod permission_repo;
pub mod platform_event_repo;

pub use activity_repo::ActivityRepo;
pub use approval_step_repo::ApprovalStepRepo;
pub use conflict_repo::ConflictRepo;
pub use event_repo::EventRepo;
pub use outbox_repo::OutboxRepo;
pub use permission_repo::PermissionRepo;
pub use platform_event_repo::PlatformEventRepo;
