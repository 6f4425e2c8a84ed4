use async_trait::async_trait;

/// Error type returned by [`Probe`] and [`Normalize`] implementations.
///
/// These errors never leave the [`Pool`]. The affected connection is
/// destroyed and the error is logged.
///
/// [`Pool`]: super::Pool
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Liveness check run on every connection before it is handed out.
#[async_trait]
pub trait Probe<T: Send>: Send + Sync {
    /// Returns `Ok(false)` if `conn` is dead.
    ///
    /// # Errors
    ///
    /// An error is treated like a dead connection: it gets destroyed and
    /// [`Pool::get()`] moves on to the next candidate.
    ///
    /// [`Pool::get()`]: super::Pool::get
    async fn probe(&self, conn: &mut T) -> Result<bool, BoxError>;
}

/// Resets the session state of a connection before it becomes idle again.
#[async_trait]
pub trait Normalize<T: Send>: Send + Sync {
    /// Brings `conn` back to a known baseline (isolation level, autocommit,
    /// session variables and so on).
    ///
    /// # Errors
    ///
    /// The connection is destroyed instead of being returned to the idle
    /// store.
    async fn normalize(&self, conn: &mut T) -> Result<(), BoxError>;
}

/// Default strategy when no [`Probe`] or [`Normalize`] is configured.
///
/// Every connection is considered alive and nothing gets reset.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unchecked;

#[async_trait]
impl<T: Send> Probe<T> for Unchecked {
    async fn probe(&self, _conn: &mut T) -> Result<bool, BoxError> {
        Ok(true)
    }
}

#[async_trait]
impl<T: Send> Normalize<T> for Unchecked {
    async fn normalize(&self, _conn: &mut T) -> Result<(), BoxError> {
        Ok(())
    }
}
