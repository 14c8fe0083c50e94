//! Async connection pool for the board's PostgreSQL store.
//!
//! Wraps `diesel-async` and `bb8`. Every Diesel repository holds a cloned
//! [`DbPool`] and checks out one connection per port call; a transaction
//! never spans two checkouts.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use tracing::{debug, info};

use crate::config::PostboardSettings;
use crate::domain::ports::define_port_error;

define_port_error! {
    /// Errors raised while building the pool or checking out a connection.
    pub enum PoolError {
        /// No connection became free within the checkout timeout.
        Checkout { message: String } => "failed to get connection from pool: {message}",
        /// The pool could not be constructed.
        Build { message: String } => "failed to build connection pool: {message}",
    }
}

/// Sizing and timeout settings for [`DbPool`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use postboard::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new("postgres://board@localhost/postboard")
///     .with_max_size(20)
///     .with_checkout_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_size(), 20);
/// assert_eq!(config.checkout_timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    min_idle: Option<u32>,
    checkout_timeout: Duration,
}

impl PoolConfig {
    /// Ten connections, two kept idle, thirty second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: 10,
            min_idle: Some(2),
            checkout_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the number of idle connections bb8 keeps warm.
    pub fn with_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set how long a port call waits for a free connection.
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    /// Connection URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Maximum pool size.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Checkout timeout.
    pub fn checkout_timeout(&self) -> Duration {
        self.checkout_timeout
    }

    /// Reject sizes bb8 would refuse, with the setting name in the message.
    fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 {
            return Err(PoolError::build("pool_max_size must be at least 1"));
        }
        if self.min_idle.is_some_and(|idle| idle > self.max_size) {
            return Err(PoolError::build(format!(
                "min_idle exceeds pool_max_size ({})",
                self.max_size
            )));
        }
        Ok(())
    }
}

impl From<&PostboardSettings> for PoolConfig {
    fn from(settings: &PostboardSettings) -> Self {
        let max_size = settings.pool_max_size;
        Self::new(settings.database_url())
            .with_max_size(max_size)
            .with_min_idle(Some(max_size.min(2)))
            .with_checkout_timeout(Duration::from_secs(settings.pool_timeout_secs))
    }
}

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Build`] for an invalid configuration or when bb8
    /// cannot open its initial connections.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.checkout_timeout)
            .build(manager)
            .await
            .map_err(|err| PoolError::build(err.to_string()))?;

        info!(
            max_size = config.max_size,
            timeout_secs = config.checkout_timeout.as_secs(),
            "database pool ready"
        );
        Ok(Self { inner: pool })
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Checkout`] when none frees up within the timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.inner.get().await.map_err(|err| {
            let error = PoolError::checkout(err.to_string());
            debug!(kind = error.label(), error = %error, "connection checkout failed");
            error
        })
    }
}

#[cfg(test)]
mod tests {
    //! Configuration coverage; pool construction needs a live server.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_suit_a_small_deployment() {
        let config = PoolConfig::new("postgres://localhost/postboard");

        assert_eq!(config.database_url(), "postgres://localhost/postboard");
        assert_eq!(config.max_size(), 10);
        assert_eq!(config.min_idle, Some(2));
        assert_eq!(config.checkout_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(1, Some(1))]
    #[case(4, Some(2))]
    fn settings_drive_size_and_timeout(#[case] max_size: u32, #[case] idle: Option<u32>) {
        let settings = PostboardSettings {
            database_url: Some("postgres://board@db/postboard".to_owned()),
            pool_max_size: max_size,
            pool_timeout_secs: 3,
            ..PostboardSettings::default()
        };
        let config = PoolConfig::from(&settings);

        assert_eq!(config.database_url(), "postgres://board@db/postboard");
        assert_eq!(config.max_size(), max_size);
        assert_eq!(config.min_idle, idle);
        assert_eq!(config.checkout_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[rstest]
    fn zero_sized_pool_is_rejected() {
        let config = PoolConfig::new("postgres://localhost/postboard").with_max_size(0);
        assert_eq!(
            config.validate(),
            Err(PoolError::build("pool_max_size must be at least 1"))
        );
    }

    #[rstest]
    fn idle_above_max_is_rejected() {
        let config = PoolConfig::new("postgres://localhost/postboard")
            .with_max_size(2)
            .with_min_idle(Some(3));
        let err = config.validate().expect_err("idle above max");
        assert_eq!(err.label(), "build");
    }
}
