use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Weak,
};

use tokio::time::Instant;

use crate::{pool::PoolInner, LeaseId, Manager, Pool};

/// Wrapper around a pooled connection which implements [`Deref`],
/// [`DerefMut`] and [`Drop`] traits.
///
/// Use this lease just as if it was of type `M::Type`. Call
/// [`Lease::dispose()`] to normalize the connection and return it right away.
/// A lease that simply leaves its scope is abandoned: its connection is kept
/// by the pool and harvested by the next [`Pool::get()`] that finds no idle
/// connection.
///
/// # Panics
///
/// Dereferencing a disposed lease panics.
#[must_use]
pub struct Lease<M: Manager> {
    /// The actual connection
    conn: Option<M::Type>,

    /// Pool to return the connection to.
    pool: Weak<PoolInner<M>>,

    id: LeaseId,

    /// Time this lease was issued
    issued_at: Instant,
}

impl<M> fmt::Debug for Lease<M>
where
    M: Manager,
    M::Type: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("conn", &self.conn)
            .finish()
    }
}

impl<M: Manager> Lease<M> {
    pub(crate) fn new(
        conn: M::Type,
        pool: Weak<PoolInner<M>>,
        id: LeaseId,
        issued_at: Instant,
    ) -> Self {
        Self {
            conn: Some(conn),
            pool,
            id,
            issued_at,
        }
    }

    /// Normalizes the connection and hands it back to its [`Pool`].
    ///
    /// Disposing a lease more than once is a no-op. If the pool has been
    /// closed in the meantime the connection is destroyed instead.
    pub async fn dispose(this: &mut Self) {
        let conn = match this.conn.take() {
            Some(conn) => conn,
            None => return,
        };
        if let Some(pool) = this.pool.upgrade() {
            pool.release(this.id, conn).await;
        }
    }

    /// Returns `true` once [`Lease::dispose()`] has been called.
    #[must_use]
    pub fn is_disposed(this: &Self) -> bool {
        this.conn.is_none()
    }

    /// Takes the connection from its [`Pool`] permanently. This frees one
    /// slot of the [`Pool`].
    ///
    /// # Panics
    ///
    /// Panics if the lease has already been disposed.
    #[must_use]
    pub fn take(mut this: Self) -> M::Type {
        let conn = this.conn.take().expect("lease has already been disposed");
        if let Some(pool) = this.pool.upgrade() {
            pool.detach(this.id);
        }
        conn
    }

    /// Identifier of this lease within its [`Pool`].
    #[must_use]
    pub fn id(this: &Self) -> LeaseId {
        this.id
    }

    /// Time this lease was issued.
    #[must_use]
    pub fn issued_at(this: &Self) -> Instant {
        this.issued_at
    }

    /// Returns the [`Pool`] this [`Lease`] belongs to.
    ///
    /// Since [`Lease`]s only hold a [`Weak`] reference to the [`Pool`] they
    /// come from, this can fail and return [`None`] instead.
    pub fn pool(this: &Self) -> Option<Pool<M>> {
        this.pool.upgrade().map(|inner| Pool { inner })
    }
}

impl<M: Manager> Drop for Lease<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.abandon(self.id, conn);
            }
        }
    }
}

impl<M: Manager> Deref for Lease<M> {
    type Target = M::Type;
    fn deref(&self) -> &M::Type {
        self.conn.as_ref().expect("lease has already been disposed")
    }
}

impl<M: Manager> DerefMut for Lease<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("lease has already been disposed")
    }
}

impl<M: Manager> AsRef<M::Type> for Lease<M> {
    fn as_ref(&self) -> &M::Type {
        self
    }
}

impl<M: Manager> AsMut<M::Type> for Lease<M> {
    fn as_mut(&mut self) -> &mut M::Type {
        self
    }
}
