//! Transactional orchestration of the activity workflow.
//!
//! Each operation locks the rows it changes, runs the pure planning logic
//! of `excursions-core` over what it loaded, persists the resulting plan,
//! and enqueues notifications, all inside one transaction. Platform events
//! are published on the [`EventBus`](excursions_events::EventBus) only
//! after commit.
//!
//! - [`ActivityWorkflow`]: editing, submission, approval actions,
//!   cancellation, deletion, and dashboard queries.
//! - [`CalendarService`]: calendar events and conflict reconciliation.
//! - [`PermissionService`]: parent permission rows and attendance.

pub mod activity;
pub mod calendar;
pub mod error;
pub mod permissions;

pub use activity::{ActivitySummary, ActivityView, ActivityWorkflow, StepOutcome};
pub use calendar::{CalendarService, EventDetail};
pub use error::{WorkflowError, WorkflowResult};
pub use permissions::{PermissionOverview, PermissionService};
