//! Postboard library modules.
//!
//! The crate is laid out as a hexagon:
//!
//! - [`domain`]: entities, the authorization guard and the services that
//!   keep follow, rating and comment counters in step with their rows.
//! - [`outbound`]: PostgreSQL, in-memory, blob and crypto adapters for the
//!   ports the domain declares.
//! - [`config`]: runtime settings loaded with OrthoConfig.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::PostboardSettings;
