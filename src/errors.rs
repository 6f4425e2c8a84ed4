use thiserror::Error;

/// Possible errors returned by [`Pool::get()`] method.
///
/// [`Pool::get()`]: super::Pool::get
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// Every connection is in use, nothing could be harvested and the
    /// [`WaitPolicy`] did not allow waiting any longer.
    ///
    /// [`WaitPolicy`]: super::WaitPolicy
    #[error("Pool is exhausted, no connection became available")]
    Exhausted,

    /// Every candidate connection failed its liveness probe.
    #[error("No live connection found after {attempts} failed liveness probes")]
    Unavailable {
        /// Number of connections that failed the probe and were destroyed.
        attempts: usize,
    },

    /// [`Manager`] failed to create a new connection.
    ///
    /// [`Manager`]: super::Manager
    #[error("Error occurred while creating a new connection: {0}")]
    Create(#[source] E),

    /// [`Pool`] has been closed.
    ///
    /// [`Pool`]: super::Pool
    #[error("Pool has been closed")]
    Closed,
}

/// Possible errors returned by [`PoolBuilder::build()`] method.
///
/// [`PoolBuilder::build()`]: super::PoolBuilder::build
#[derive(Debug, Error)]
pub enum BuildError<E> {
    /// The [`PoolConfig`] is invalid.
    ///
    /// [`PoolConfig`]: super::PoolConfig
    #[error("Invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// Pre-warming stopped before [`PoolConfig::min_size`] connections
    /// existed.
    ///
    /// [`PoolConfig::min_size`]: super::PoolConfig::min_size
    #[error("Created only {created} of {required} initial connections: {source}")]
    Init {
        /// Connections created before the failure.
        created: usize,
        /// Configured [`PoolConfig::min_size`].
        ///
        /// [`PoolConfig::min_size`]: super::PoolConfig::min_size
        required: usize,
        /// Error reported by the [`Manager`].
        ///
        /// [`Manager`]: super::Manager
        #[source]
        source: E,
    },
}

/// Invalid combinations of [`PoolConfig`] values.
///
/// [`PoolConfig`]: super::PoolConfig
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_size` must be at least 1.
    #[error("max_size must be at least 1")]
    ZeroMaxSize,

    /// `min_size` connections could never be kept idle.
    #[error("min_size ({min_size}) exceeds max_size ({max_size})")]
    MinSizeExceedsMaxSize {
        /// Configured `min_size`.
        min_size: usize,
        /// Configured `max_size`.
        max_size: usize,
    },

    /// `probe_attempts` must be at least 1.
    #[error("probe_attempts must be at least 1")]
    ZeroProbeAttempts,

    /// `create_attempts` must be at least 1.
    #[error("create_attempts must be at least 1")]
    ZeroCreateAttempts,
}
