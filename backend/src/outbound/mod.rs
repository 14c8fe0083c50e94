//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern, providing concrete
//! implementations of domain port traits:
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **memory**: a mutex-guarded store implementing the same repository ports
//! - **blob**: attachment bytes under a `cap-std` directory
//! - **crypto**: AES-GCM message sealing and Argon2 password hashing
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod blob;
pub mod crypto;
pub mod memory;
pub mod persistence;
