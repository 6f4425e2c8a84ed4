use std::{collections::BTreeMap, iter::FromIterator, time::Duration};

use tokio::time::Instant;

use crate::errors::ConfigError;

/// [`Pool`] configuration.
///
/// [`Pool`]: super::Pool
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Number of connections created up front when the [`Pool`] is built.
    ///
    /// [`Pool`]: super::Pool
    pub min_size: usize,

    /// Maximum number of idle connections the [`Pool`] keeps around.
    ///
    /// [`Pool`]: super::Pool
    pub max_size: usize,

    /// Extra connections the [`Pool`] may create on top of
    /// [`PoolConfig::max_size`] during a burst. They are destroyed instead of
    /// being kept idle once returned.
    ///
    /// [`Pool`]: super::Pool
    pub overflow: usize,

    /// What [`Pool::get()`] does once every connection is in use.
    ///
    /// [`Pool::get()`]: super::Pool::get
    pub wait: WaitPolicy,

    /// Number of failed liveness probes tolerated by a single
    /// [`Pool::get()`] call before it gives up.
    ///
    /// [`Pool::get()`]: super::Pool::get
    pub probe_attempts: usize,

    /// Number of times a single [`Pool::get()`] call asks the
    /// [`Manager`] for a new connection before surfacing its error.
    ///
    /// [`Pool::get()`]: super::Pool::get
    /// [`Manager`]: super::Manager
    pub create_attempts: usize,
}

impl PoolConfig {
    /// Creates a new [`PoolConfig`] with the provided `max_size`, no overflow,
    /// no pre-warmed connections and the [`WaitPolicy::Immediate`] policy.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            min_size: 0,
            max_size,
            overflow: 0,
            wait: WaitPolicy::Immediate,
            probe_attempts: 3,
            create_attempts: 1,
        }
    }

    /// Hard ceiling of connections that may exist at the same time.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.max_size.saturating_add(self.overflow)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        if self.min_size > self.max_size {
            return Err(ConfigError::MinSizeExceedsMaxSize {
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        if self.probe_attempts == 0 {
            return Err(ConfigError::ZeroProbeAttempts);
        }
        if self.create_attempts == 0 {
            return Err(ConfigError::ZeroCreateAttempts);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Creates a new [`PoolConfig`] with the `max_size` being set to
    /// `cpu_count * 4` ignoring any logical CPUs (Hyper-Threading).
    fn default() -> Self {
        Self::new(num_cpus::get_physical() * 4)
    }
}

/// Behaviour of [`Pool::get()`] when the pool is exhausted.
///
/// [`Pool::get()`]: super::Pool::get
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WaitPolicy {
    /// Fail with [`PoolError::Exhausted`] right away.
    ///
    /// [`PoolError::Exhausted`]: super::PoolError::Exhausted
    Immediate,

    /// Wait up to the given duration for a connection to be returned. A zero
    /// duration behaves like [`WaitPolicy::Immediate`].
    Timeout(Duration),

    /// Wait until a connection becomes available or the pool is closed.
    Forever,
}

impl WaitPolicy {
    pub(crate) fn is_immediate(self) -> bool {
        match self {
            Self::Immediate => true,
            Self::Timeout(d) => d.is_zero(),
            Self::Forever => false,
        }
    }

    pub(crate) fn deadline(self) -> Option<Instant> {
        match self {
            Self::Timeout(d) => Instant::now().checked_add(d),
            Self::Immediate | Self::Forever => None,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::Immediate
    }
}

/// Parameters handed to [`Manager::create()`] for every new connection.
///
/// [`Pool::connection_arguments()`] returns a copy, so changing it never
/// affects the pool.
///
/// [`Manager::create()`]: super::Manager::create
/// [`Pool::connection_arguments()`]: super::Pool::connection_arguments
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ConnectionArguments(BTreeMap<String, String>);

impl ConnectionArguments {
    /// Creates an empty set of arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no argument is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectionArguments
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
