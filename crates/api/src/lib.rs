//! HTTP surface of the excursion approval service.
//!
//! Exposes the library half of the API crate so integration tests can build
//! the same router the binary serves.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
