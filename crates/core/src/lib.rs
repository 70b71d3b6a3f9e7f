//! Domain logic for the excursions approval service.
//!
//! Everything in this crate is pure: callers load rows from storage, pass
//! them in, and persist whatever plan comes back. No I/O happens here.

pub mod activity;
pub mod actor;
pub mod approval;
pub mod conflict;
pub mod error;
pub mod event;
pub mod notification;
pub mod permission;
pub mod types;
pub mod workflow;
