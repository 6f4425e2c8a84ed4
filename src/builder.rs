use std::{fmt, time::Duration};

use tracing::{debug, warn};

use super::{
    BuildError, ConnectionArguments, Manager, Normalize, Pool, PoolConfig, Probe, WaitPolicy,
};

/// Builder for [`Pool`]s.
///
/// Instances of this are created by calling the [`Pool::builder()`] method.
#[must_use = "builder does nothing itself, use `.build()` to build it"]
pub struct PoolBuilder<M: Manager> {
    pub(crate) manager: M,
    pub(crate) config: PoolConfig,
    pub(crate) arguments: ConnectionArguments,
    pub(crate) probe: Option<Box<dyn Probe<M::Type>>>,
    pub(crate) normalizer: Option<Box<dyn Normalize<M::Type>>>,
}

// Implemented manually as the strategies are trait objects.
impl<M> fmt::Debug for PoolBuilder<M>
where
    M: fmt::Debug + Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .field("arguments", &self.arguments)
            .field("probe", &self.probe.is_some())
            .field("normalizer", &self.normalizer.is_some())
            .finish()
    }
}

impl<M: Manager> PoolBuilder<M> {
    pub(crate) fn new(manager: M) -> Self {
        Self {
            manager,
            config: PoolConfig::default(),
            arguments: ConnectionArguments::default(),
            probe: None,
            normalizer: None,
        }
    }

    /// Builds the [`Pool`] and creates [`PoolConfig::min_size`] connections.
    ///
    /// # Errors
    ///
    /// See [`BuildError`] for details.
    pub async fn build(self) -> Result<Pool<M>, BuildError<M::Error>> {
        self.config.validate()?;
        if self.probe.is_none() {
            warn!("No liveness probe configured, every connection is assumed alive");
        }
        if self.normalizer.is_none() {
            warn!("No normalizer configured, connection state leaks between leases");
        }
        let pool = Pool::from_builder(self);
        pool.prewarm().await?;
        debug!(
            min_size = pool.inner.config.min_size,
            max_size = pool.inner.config.max_size,
            overflow = pool.inner.config.overflow,
            "Connection pool initialized"
        );
        Ok(pool)
    }

    /// Sets a [`PoolConfig`] to build the [`Pool`] with.
    pub fn config(mut self, value: PoolConfig) -> Self {
        self.config = value;
        self
    }

    /// Sets the [`PoolConfig::min_size`].
    pub fn min_size(mut self, value: usize) -> Self {
        self.config.min_size = value;
        self
    }

    /// Sets the [`PoolConfig::max_size`].
    pub fn max_size(mut self, value: usize) -> Self {
        self.config.max_size = value;
        self
    }

    /// Sets the [`PoolConfig::overflow`].
    pub fn overflow(mut self, value: usize) -> Self {
        self.config.overflow = value;
        self
    }

    /// Sets the [`PoolConfig::wait`] policy.
    pub fn wait(mut self, value: WaitPolicy) -> Self {
        self.config.wait = value;
        self
    }

    /// Shorthand for [`WaitPolicy::Timeout`].
    pub fn timeout(self, value: Duration) -> Self {
        self.wait(WaitPolicy::Timeout(value))
    }

    /// Sets the [`PoolConfig::probe_attempts`].
    pub fn probe_attempts(mut self, value: usize) -> Self {
        self.config.probe_attempts = value;
        self
    }

    /// Sets the [`PoolConfig::create_attempts`].
    pub fn create_attempts(mut self, value: usize) -> Self {
        self.config.create_attempts = value;
        self
    }

    /// Replaces every [`ConnectionArguments`] passed to the [`Manager`].
    pub fn arguments(mut self, value: ConnectionArguments) -> Self {
        self.arguments = value;
        self
    }

    /// Adds a single argument passed to the [`Manager`].
    pub fn argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.arguments.insert(key, value);
        self
    }

    /// Sets the [`Probe`] run before a connection is handed out.
    pub fn probe(mut self, value: impl Probe<M::Type> + 'static) -> Self {
        self.probe = Some(Box::new(value));
        self
    }

    /// Sets the [`Normalize`] strategy run before a connection goes idle.
    pub fn normalizer(mut self, value: impl Normalize<M::Type> + 'static) -> Self {
        self.normalizer = Some(Box::new(value));
        self
    }
}
