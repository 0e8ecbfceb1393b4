//! Wire objects for the Herald notification server.
//!
//! Everything here is plain data: request/response shapes, field-level
//! validation and API-key token helpers. No I/O happens in this crate.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

pub mod api_key;
pub mod objects;
