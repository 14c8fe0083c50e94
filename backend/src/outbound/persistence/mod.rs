//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! This module provides concrete implementations of the domain repository
//! ports backed by PostgreSQL via Diesel with async support through
//! `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: Repository implementations translate between Diesel
//!   rows and domain types and open transactions. Business rules stay in the
//!   services.
//! - **Internal models**: Diesel row structs (`models.rs`) and schema
//!   definitions (`schema.rs`) never leave this module.
//! - **Serializable mutations**: every mutation that touches a counter runs
//!   in `build_transaction().serializable()`; a lost race surfaces as the
//!   port's `StaleState` variant.
//! - **Relative counters**: counters move by SQL deltas and decrements are
//!   floored with `GREATEST(.., 0)`.
//!
//! # Example
//!
//! ```ignore
//! use postboard::outbound::persistence::{DbPool, DieselContentRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/postboard")).await?;
//! let content = DieselContentRepository::new(pool.clone());
//! ```

pub(crate) mod diesel_helpers;
mod diesel_attachment_repository;
mod diesel_content_repository;
mod diesel_engagement_repository;
mod diesel_follow_repository;
mod diesel_messaging_repository;
mod diesel_settings_repository;
mod diesel_user_repository;
mod models;
mod pool;
mod schema;

pub use diesel_attachment_repository::DieselAttachmentRepository;
pub use diesel_content_repository::DieselContentRepository;
pub use diesel_engagement_repository::DieselEngagementRepository;
pub use diesel_follow_repository::DieselFollowRepository;
pub use diesel_messaging_repository::DieselMessagingRepository;
pub use diesel_settings_repository::DieselSettingsRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
