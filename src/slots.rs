//! Bookkeeping guarded by the pool lock.
//!
//! `size` counts every live connection: idle, leased, abandoned, and the ones
//! currently owned by an in-flight `get()` or `dispose()`.

use std::{collections::HashMap, fmt, mem};

use tokio::time::Instant;

/// Identifies a [`Lease`] within its pool.
///
/// [`Lease`]: super::Lease
pub type LeaseId = u64;

/// Outcome of a single look at the pool state by `Pool::get()`.
pub(crate) enum Checkout<T> {
    Closed,
    Idle(T),
    /// Connection of a lease that was dropped without being disposed. It
    /// still has to be normalized.
    Harvest(T),
    /// Room for one more connection has been reserved.
    Grow,
    Exhausted,
}

pub(crate) struct Slots<T> {
    idle: Vec<T>,
    abandoned: Vec<T>,
    leases: HashMap<LeaseId, Instant>,
    size: usize,
    closed: bool,
    next_id: LeaseId,
}

impl<T> Slots<T> {
    pub(crate) fn new() -> Self {
        Self {
            idle: Vec::new(),
            abandoned: Vec::new(),
            leases: HashMap::new(),
            size: 0,
            closed: false,
            next_id: 0,
        }
    }

    /// Idle connections come first (LIFO), abandoned ones next and growth
    /// last. Abandoned connections are handed out one at a time so that
    /// concurrent callers can each harvest their own.
    pub(crate) fn checkout(&mut self, ceiling: usize) -> Checkout<T> {
        if self.closed {
            return Checkout::Closed;
        }
        if let Some(conn) = self.idle.pop() {
            return Checkout::Idle(conn);
        }
        if let Some(conn) = self.abandoned.pop() {
            return Checkout::Harvest(conn);
        }
        if self.reserve(ceiling) {
            return Checkout::Grow;
        }
        Checkout::Exhausted
    }

    pub(crate) fn reserve(&mut self, ceiling: usize) -> bool {
        if self.size < ceiling {
            self.size += 1;
            true
        } else {
            false
        }
    }

    /// Forgets a connection that was destroyed or detached.
    pub(crate) fn forfeit(&mut self) {
        debug_assert!(self.size > 0, "forfeit without a live connection");
        self.size = self.size.saturating_sub(1);
    }

    pub(crate) fn register(&mut self, issued_at: Instant) -> LeaseId {
        let id = self.next_id;
        self.next_id += 1;
        let _ = self.leases.insert(id, issued_at);
        id
    }

    /// Marks a lease as returned. Returns `None` if it already was.
    pub(crate) fn deregister(&mut self, id: LeaseId) -> Option<Instant> {
        self.leases.remove(&id)
    }

    /// Returns `conn` if it has to be destroyed instead.
    pub(crate) fn push_idle(&mut self, conn: T, max_size: usize) -> Result<(), T> {
        if self.accepts_idle(max_size) {
            self.idle.push(conn);
            Ok(())
        } else {
            Err(conn)
        }
    }

    pub(crate) fn accepts_idle(&self, max_size: usize) -> bool {
        !self.closed && self.idle.len() < max_size
    }

    /// Returns `conn` if it has to be destroyed instead.
    pub(crate) fn push_abandoned(&mut self, conn: T) -> Result<(), T> {
        if self.closed {
            Err(conn)
        } else {
            self.abandoned.push(conn);
            Ok(())
        }
    }

    /// Closes the slots and hands back every idle and abandoned connection.
    /// They are no longer counted in `size`.
    pub(crate) fn close(&mut self) -> Vec<T> {
        self.closed = true;
        let mut drained = mem::take(&mut self.idle);
        drained.append(&mut self.abandoned);
        self.size -= drained.len();
        drained
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle.len()
    }

    pub(crate) fn leased(&self) -> usize {
        self.leases.len()
    }

    pub(crate) fn abandoned(&self) -> usize {
        self.abandoned.len()
    }

    pub(crate) fn oldest_lease(&self) -> Option<Instant> {
        self.leases.values().min().copied()
    }
}

impl<T> fmt::Debug for Slots<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("size", &self.size)
            .field("idle", &self.idle.len())
            .field("leased", &self.leases.len())
            .field("abandoned", &self.abandoned.len())
            .field("closed", &self.closed)
            .finish()
    }
}
