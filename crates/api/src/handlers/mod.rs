pub mod activity;
pub mod approval;
pub mod conflict;
pub mod event;
pub mod permission;
