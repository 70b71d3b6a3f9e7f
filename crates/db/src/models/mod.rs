//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, any create DTO used for inserts, and conversions into
//! the typed domain values of `excursions-core`.

pub mod activity;
pub mod approval_step;
pub mod conflict;
pub mod event;
pub mod outbox;
pub mod permission;
pub mod platform_event;
