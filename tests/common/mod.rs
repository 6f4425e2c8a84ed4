#![allow(dead_code, unreachable_pub)]

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use cuttlepool::{BoxError, ConnectionArguments, Normalize, Probe, Status};

pub type Pool = cuttlepool::Pool<Manager>;

#[derive(Debug)]
pub struct Conn {
    pub id: usize,
    pub open: bool,
    pub autocommit: bool,
    pub host: Option<String>,
}

#[derive(Debug)]
pub struct CreateError;

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection refused")
    }
}

impl std::error::Error for CreateError {}

/// Hands out connections numbered from 0. The first `fail_first` calls to
/// `create` fail, and so does every call from `fail_from` on.
#[derive(Debug, Default)]
pub struct Manager {
    next: AtomicUsize,
    attempts: AtomicUsize,
    fail_first: usize,
    fail_from: Option<usize>,
}

impl Manager {
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_from: Some(successes),
            ..Self::default()
        }
    }

    pub fn failing_first(failures: usize) -> Self {
        Self {
            fail_first: failures,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl cuttlepool::Manager for Manager {
    type Type = Conn;
    type Error = CreateError;

    async fn create(&self, args: &ConnectionArguments) -> Result<Conn, CreateError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first || matches!(self.fail_from, Some(n) if attempt >= n) {
            return Err(CreateError);
        }
        Ok(Conn {
            id: self.next.fetch_add(1, Ordering::SeqCst),
            open: true,
            autocommit: true,
            host: args.get("host").map(str::to_owned),
        })
    }
}

/// Reports `conn.open`.
#[derive(Debug, Default)]
pub struct Ping;

#[async_trait]
impl Probe<Conn> for Ping {
    async fn probe(&self, conn: &mut Conn) -> Result<bool, BoxError> {
        Ok(conn.open)
    }
}

/// Reports the first probed connection as dead.
#[derive(Debug, Default)]
pub struct DeadOnce {
    fired: AtomicBool,
}

#[async_trait]
impl Probe<Conn> for DeadOnce {
    async fn probe(&self, _conn: &mut Conn) -> Result<bool, BoxError> {
        Ok(self.fired.swap(true, Ordering::SeqCst))
    }
}

/// Fails on every connection.
#[derive(Debug, Default)]
pub struct BrokenProbe;

#[async_trait]
impl Probe<Conn> for BrokenProbe {
    async fn probe(&self, _conn: &mut Conn) -> Result<bool, BoxError> {
        Err("server has gone away".into())
    }
}

/// Restores autocommit and counts every call.
#[derive(Clone, Debug, Default)]
pub struct Reset {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl Reset {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Takes `delay` for every reset, like a round trip to the server.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Normalize<Conn> for Reset {
    async fn normalize(&self, conn: &mut Conn) -> Result<(), BoxError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err("cannot reset session".into());
        }
        conn.autocommit = true;
        Ok(())
    }
}

pub fn assert_consistent(status: Status) {
    assert_eq!(
        status.idle + status.leased + status.abandoned,
        status.size,
        "{:?}",
        status
    );
    assert!(status.size <= status.max_size + status.overflow, "{:?}", status);
}
