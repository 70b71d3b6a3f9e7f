//! Authentication primitives.
//!
//! Tokens are issued by the school's identity provider; this service only
//! validates them. [`jwt::issue_token`] exists for tooling and
//! tests.

pub mod jwt;
