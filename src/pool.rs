use std::{
    fmt,
    sync::{atomic::Ordering, Arc},
};

use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, info, trace, warn};

use crate::{
    lease::Lease,
    slots::{Checkout, LeaseId, Slots},
    BuildError, ConnectionArguments, Manager, Normalize, PoolBuilder, PoolConfig, PoolError,
    PoolMetrics, Probe, Status, Unchecked, WaitPolicy,
};

/// Generic connection pool.
///
/// This struct can be cloned and transferred across thread boundaries and uses
/// reference counting for its internal state.
pub struct Pool<M: Manager> {
    pub(crate) inner: Arc<PoolInner<M>>,
}

impl<M> fmt::Debug for Pool<M>
where
    M: fmt::Debug + Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("inner", &self.inner).finish()
    }
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Manager> Pool<M> {
    /// Instantiates a builder for a new [`Pool`].
    ///
    /// This is the only way to create a [`Pool`] instance.
    pub fn builder(manager: M) -> PoolBuilder<M> {
        PoolBuilder::new(manager)
    }

    pub(crate) fn from_builder(builder: PoolBuilder<M>) -> Self {
        let PoolBuilder {
            manager,
            config,
            arguments,
            probe,
            normalizer,
        } = builder;
        Self {
            inner: Arc::new(PoolInner {
                slots: Mutex::new(Slots::new()),
                returned: Notify::new(),
                metrics: PoolMetrics::default(),
                probe: probe.unwrap_or_else(|| Box::new(Unchecked)),
                normalizer: normalizer.unwrap_or_else(|| Box::new(Unchecked)),
                manager,
                arguments,
                config,
            }),
        }
    }

    pub(crate) async fn prewarm(&self) -> Result<(), BuildError<M::Error>> {
        let required = self.inner.config.min_size;
        for created in 0..required {
            if !self.inner.slots.lock().reserve(self.inner.config.ceiling()) {
                break;
            }
            let reservation = Reservation::new(&self.inner);
            let conn = self
                .inner
                .manager
                .create(&self.inner.arguments)
                .await
                .map_err(|source| BuildError::Init {
                    created,
                    required,
                    source,
                })?;
            let conn = reservation.commit(conn).into_inner();
            let rejected = self
                .inner
                .slots
                .lock()
                .push_idle(conn, self.inner.config.max_size);
            if let Err(conn) = rejected {
                self.inner.destroy(conn);
            }
        }
        Ok(())
    }

    /// Retrieves a [`Lease`] from this [`Pool`], applying the configured
    /// [`WaitPolicy`] when every connection is in use.
    ///
    /// # Errors
    ///
    /// See [`PoolError`] for details.
    pub async fn get(&self) -> Result<Lease<M>, PoolError<M::Error>> {
        self.timeout_get(self.inner.config.wait).await
    }

    /// Retrieves a [`Lease`] from this [`Pool`] using a different
    /// [`WaitPolicy`] than the configured one.
    ///
    /// # Errors
    ///
    /// See [`PoolError`] for details.
    pub async fn timeout_get(&self, wait: WaitPolicy) -> Result<Lease<M>, PoolError<M::Error>> {
        let start = Instant::now();
        let result = self.acquire(wait).await;
        match &result {
            Ok(_) => self.inner.metrics.record_waiting(start),
            Err(_) => PoolMetrics::incr(&self.inner.metrics.failure_count),
        }
        result
    }

    async fn acquire(&self, wait: WaitPolicy) -> Result<Lease<M>, PoolError<M::Error>> {
        let deadline = wait.deadline();
        let mut failed_probes = 0;
        loop {
            let mut claimed = self.claim(wait, deadline).await?;
            let alive = self.inner.probe.probe(claimed.conn_mut()).await;
            match alive {
                Ok(true) => return Ok(claimed.into_lease()),
                Ok(false) => debug!("Connection failed liveness probe"),
                Err(error) => warn!(%error, "Liveness probe failed with an error"),
            }
            PoolMetrics::incr(&self.inner.metrics.probe_failures);
            drop(claimed);
            failed_probes += 1;
            if failed_probes >= self.inner.config.probe_attempts {
                warn!(
                    attempts = failed_probes,
                    "Giving up, no connection passed the liveness probe"
                );
                return Err(PoolError::Unavailable {
                    attempts: failed_probes,
                });
            }
        }
    }

    /// Takes ownership of a candidate connection: an idle one, a harvested
    /// one or a freshly created one.
    async fn claim(
        &self,
        wait: WaitPolicy,
        deadline: Option<Instant>,
    ) -> Result<Claimed<M>, PoolError<M::Error>> {
        let mut failed_creates = 0;
        loop {
            let checkout = self.inner.slots.lock().checkout(self.inner.config.ceiling());
            match checkout {
                Checkout::Closed => return Err(PoolError::Closed),
                Checkout::Idle(conn) => return Ok(Claimed::new(&self.inner, conn)),
                Checkout::Harvest(conn) => {
                    debug!("Harvesting abandoned lease");
                    PoolMetrics::incr(&self.inner.metrics.harvested);
                    let mut claimed = Claimed::new(&self.inner, conn);
                    if self.inner.normalize(&mut claimed).await {
                        return Ok(claimed);
                    }
                }
                Checkout::Grow => {
                    let reservation = Reservation::new(&self.inner);
                    match self.inner.manager.create(&self.inner.arguments).await {
                        Ok(conn) => return Ok(reservation.commit(conn)),
                        Err(error) => {
                            drop(reservation);
                            failed_creates += 1;
                            warn!(
                                ?error,
                                attempt = failed_creates,
                                "Failed to create a new connection"
                            );
                            if failed_creates >= self.inner.config.create_attempts {
                                return Err(PoolError::Create(error));
                            }
                        }
                    }
                }
                Checkout::Exhausted => {
                    if wait.is_immediate() {
                        debug!("Pool exhausted");
                        return Err(PoolError::Exhausted);
                    }
                    let mut returned = Box::pin(self.inner.returned.notified());
                    let _ = returned.as_mut().enable();
                    if self.inner.slots.lock().is_closed() {
                        return Err(PoolError::Closed);
                    }
                    trace!("Pool exhausted, waiting for a connection");
                    match deadline {
                        None => returned.await,
                        Some(deadline) => tokio::time::timeout_at(deadline, returned)
                            .await
                            .map_err(|_| PoolError::Exhausted)?,
                    }
                }
            }
        }
    }

    /// Closes this [`Pool`], destroying every idle connection.
    ///
    /// All current and future tasks waiting for a [`Lease`] will return
    /// [`PoolError::Closed`] immediately. Leases still checked out are not
    /// revoked, their connections are destroyed once they are disposed or
    /// dropped.
    pub fn close(&self) {
        let drained = self.inner.slots.lock().close();
        let count = drained.len();
        drop(drained);
        let _ = self
            .inner
            .metrics
            .destroyed
            .fetch_add(count, Ordering::Relaxed);
        self.inner.returned.notify_waiters();
        info!(destroyed = count, "Connection pool closed");
    }

    /// Indicates whether this [`Pool`] has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.slots.lock().is_closed()
    }

    /// Retrieves [`Status`] of this [`Pool`].
    #[must_use]
    pub fn status(&self) -> Status {
        let slots = self.inner.slots.lock();
        Status {
            max_size: self.inner.config.max_size,
            overflow: self.inner.config.overflow,
            size: slots.size(),
            idle: slots.idle(),
            leased: slots.leased(),
            abandoned: slots.abandoned(),
            longest_lease: slots.oldest_lease().map(|issued_at| issued_at.elapsed()),
        }
    }

    /// Returns a copy of the [`ConnectionArguments`] passed to the
    /// [`Manager`].
    #[must_use]
    pub fn connection_arguments(&self) -> ConnectionArguments {
        self.inner.arguments.clone()
    }

    /// Returns the [`PoolConfig`] of this [`Pool`].
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    /// Returns [`PoolMetrics`] of this [`Pool`].
    pub fn metrics(&self) -> &PoolMetrics {
        &self.inner.metrics
    }

    /// Returns [`Manager`] of this [`Pool`].
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

pub(crate) struct PoolInner<M: Manager> {
    slots: Mutex<Slots<M::Type>>,
    returned: Notify,
    metrics: PoolMetrics,
    probe: Box<dyn Probe<M::Type>>,
    normalizer: Box<dyn Normalize<M::Type>>,
    manager: M,
    arguments: ConnectionArguments,
    pub(crate) config: PoolConfig,
}

impl<M> fmt::Debug for PoolInner<M>
where
    M: fmt::Debug + Manager,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolInner")
            .field("slots", &*self.slots.lock())
            .field("metrics", &self.metrics)
            .field("manager", &self.manager)
            .field("arguments", &self.arguments)
            .field("config", &self.config)
            .finish()
    }
}

impl<M: Manager> PoolInner<M> {
    /// Normalizes `claimed` and puts it back into the idle store, or
    /// destroys it if the pool is closed, full or normalization failed.
    async fn recycle(self: &Arc<Self>, mut claimed: Claimed<M>) {
        if !self.slots.lock().accepts_idle(self.config.max_size) {
            trace!("Pool closed or idle store full, destroying returned connection");
            return;
        }
        if !self.normalize(&mut claimed).await {
            return;
        }
        let conn = claimed.into_inner();
        let rejected = self.slots.lock().push_idle(conn, self.config.max_size);
        match rejected {
            Ok(()) => self.returned.notify_one(),
            Err(conn) => self.destroy(conn),
        }
    }

    /// Returns `false` if normalization failed. The connection is then
    /// destroyed once `claimed` is dropped.
    async fn normalize(&self, claimed: &mut Claimed<M>) -> bool {
        let normalized = self.normalizer.normalize(claimed.conn_mut()).await;
        match normalized {
            Ok(()) => {
                PoolMetrics::incr(&self.metrics.normalized);
                true
            }
            Err(error) => {
                warn!(%error, "Failed to normalize connection, destroying it");
                false
            }
        }
    }

    pub(crate) async fn release(self: &Arc<Self>, id: LeaseId, conn: M::Type) {
        let claimed = Claimed::new(self, conn);
        let issued_at = self.slots.lock().deregister(id);
        if let Some(issued_at) = issued_at {
            self.metrics.record_active(issued_at);
        }
        self.recycle(claimed).await;
    }

    pub(crate) fn abandon(&self, id: LeaseId, conn: M::Type) {
        let (issued_at, rejected) = {
            let mut slots = self.slots.lock();
            let issued_at = slots.deregister(id);
            (issued_at, slots.push_abandoned(conn))
        };
        if let Some(issued_at) = issued_at {
            self.metrics.record_active(issued_at);
        }
        match rejected {
            Ok(()) => {
                debug!(lease = id, "Lease dropped without dispose, queued for harvesting");
                self.returned.notify_one();
            }
            Err(conn) => self.destroy(conn),
        }
    }

    pub(crate) fn detach(&self, id: LeaseId) {
        {
            let mut slots = self.slots.lock();
            let _ = slots.deregister(id);
            slots.forfeit();
        }
        self.returned.notify_one();
    }

    fn destroy(&self, conn: M::Type) {
        drop(conn);
        self.slots.lock().forfeit();
        PoolMetrics::incr(&self.metrics.destroyed);
        trace!("Connection destroyed");
        self.returned.notify_one();
    }
}

/// Capacity reserved for a connection that is being created.
///
/// Dropping it without [`Reservation::commit()`] gives the capacity back.
struct Reservation<'a, M: Manager> {
    pool: &'a Arc<PoolInner<M>>,
    armed: bool,
}

impl<'a, M: Manager> Reservation<'a, M> {
    fn new(pool: &'a Arc<PoolInner<M>>) -> Self {
        Self { pool, armed: true }
    }

    fn commit(mut self, conn: M::Type) -> Claimed<M> {
        self.armed = false;
        PoolMetrics::incr(&self.pool.metrics.created);
        trace!("Connection created");
        Claimed::new(self.pool, conn)
    }
}

impl<M: Manager> Drop for Reservation<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.slots.lock().forfeit();
            self.pool.returned.notify_one();
        }
    }
}

/// Connection owned by an in-flight `get()` or `dispose()`.
///
/// Dropping it destroys the connection, so cancelled futures and panicking
/// strategies never leak capacity.
pub(crate) struct Claimed<M: Manager> {
    conn: Option<M::Type>,
    pool: Arc<PoolInner<M>>,
}

impl<M: Manager> Claimed<M> {
    fn new(pool: &Arc<PoolInner<M>>, conn: M::Type) -> Self {
        Self {
            conn: Some(conn),
            pool: pool.clone(),
        }
    }

    fn conn_mut(&mut self) -> &mut M::Type {
        self.conn.as_mut().expect("claimed connection already taken")
    }

    fn into_inner(mut self) -> M::Type {
        self.conn.take().expect("claimed connection already taken")
    }

    fn into_lease(self) -> Lease<M> {
        let issued_at = Instant::now();
        let id = self.pool.slots.lock().register(issued_at);
        let pool = Arc::downgrade(&self.pool);
        Lease::new(self.into_inner(), pool, id, issued_at)
    }
}

impl<M: Manager> Drop for Claimed<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.destroy(conn);
        }
    }
}
