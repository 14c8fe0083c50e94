//! Runtime configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `POSTBOARD_*` environment variables and
//! configuration files, in OrthoConfig's usual precedence.

use std::path::{Path, PathBuf};

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/postboard";
const DEFAULT_BLOB_ROOT: &str = "./var/blobs";

/// Settings shared by the admin binary and any host embedding the services.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "POSTBOARD")]
pub struct PostboardSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum number of pooled connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Seconds to wait for a pooled connection.
    #[ortho_config(default = 30)]
    pub pool_timeout_secs: u64,
    /// Directory holding attachment blobs.
    pub blob_root: Option<PathBuf>,
    /// File holding the 32-byte message encryption key, hex encoded.
    pub message_key_file: Option<PathBuf>,
}

impl PostboardSettings {
    /// Return the configured database URL, falling back to the local default.
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    /// Return the configured blob directory, falling back to `./var/blobs`.
    pub fn blob_root(&self) -> &Path {
        self.blob_root
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_BLOB_ROOT))
    }
}

impl Default for PostboardSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_max_size: 10,
            pool_timeout_secs: 30,
            blob_root: None,
            message_key_file: None,
        }
    }
}
