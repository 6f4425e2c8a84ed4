#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]
#![warn(clippy::pedantic)]
#![warn(
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]
#![allow(
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::match_same_arms
)]

mod builder;
mod config;
mod errors;
mod hooks;
mod lease;
mod metrics;
mod pool;
mod slots;

pub use self::{
    builder::PoolBuilder,
    config::{ConnectionArguments, PoolConfig, WaitPolicy},
    errors::{BuildError, ConfigError, PoolError},
    hooks::{BoxError, Normalize, Probe, Unchecked},
    lease::Lease,
    metrics::PoolMetrics,
    pool::Pool,
    slots::LeaseId,
};

use std::{fmt, time::Duration};

use async_trait::async_trait;

/// The current pool status.
///
/// Outside of in-flight [`Pool::get()`] and [`Lease::dispose()`] calls
/// `idle + leased + abandoned == size` holds.
#[derive(Clone, Copy, Debug)]
pub struct Status {
    /// Maximum number of idle connections kept by the pool.
    pub max_size: usize,

    /// Extra connections allowed on top of `max_size`.
    pub overflow: usize,

    /// Number of live connections created by the pool.
    pub size: usize,

    /// Connections currently idle in the pool.
    pub idle: usize,

    /// Leases handed out and not yet returned.
    pub leased: usize,

    /// Connections of dropped leases waiting to be harvested.
    pub abandoned: usize,

    /// Age of the oldest outstanding lease.
    pub longest_lease: Option<Duration>,
}

/// Manager responsible for creating new connections.
///
/// Liveness checks and state resets are separate strategies, see [`Probe`]
/// and [`Normalize`].
#[async_trait]
pub trait Manager: Sync + Send {
    /// Type of connections that this [`Manager`] creates.
    type Type: Send + 'static;
    /// Error that this [`Manager`] can return when creating connections.
    type Error: fmt::Debug + Send + 'static;

    /// Creates a new instance of [`Manager::Type`] using the pool's
    /// [`ConnectionArguments`].
    async fn create(&self, args: &ConnectionArguments) -> Result<Self::Type, Self::Error>;
}
