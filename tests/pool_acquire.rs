use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use cuttlepool::{Lease, WaitPolicy};

mod common;

use common::{assert_consistent, Manager, Ping, Pool, Reset};

async fn build(max_size: usize, reset: &Reset) -> Pool {
    Pool::builder(Manager::default())
        .max_size(max_size)
        .probe(Ping)
        .normalizer(reset.clone())
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn dispose_returns_connection() {
    let reset = Reset::default();
    let pool = build(2, &reset).await;

    let mut conn = pool.get().await.unwrap();
    let id = conn.id;
    conn.autocommit = false;
    let status = pool.status();
    assert_eq!(status.size, 1);
    assert_eq!(status.leased, 1);
    assert_eq!(status.idle, 0);
    assert!(status.longest_lease.is_some());
    assert_consistent(status);

    Lease::dispose(&mut conn).await;
    assert!(Lease::is_disposed(&conn));
    let status = pool.status();
    assert_eq!(status.size, 1);
    assert_eq!(status.leased, 0);
    assert_eq!(status.idle, 1);
    assert!(status.longest_lease.is_none());
    assert_consistent(status);
    assert_eq!(reset.calls(), 1);

    let conn = pool.get().await.unwrap();
    assert_eq!(conn.id, id);
    assert!(conn.autocommit);
    assert_eq!(pool.metrics().created(), 1);
}

#[tokio::test]
async fn idle_connections_are_reused_lifo() {
    let reset = Reset::default();
    let pool = build(4, &reset).await;

    let mut a = pool.get().await.unwrap();
    let mut b = pool.get().await.unwrap();
    let b_id = b.id;
    Lease::dispose(&mut a).await;
    Lease::dispose(&mut b).await;

    let conn = pool.get().await.unwrap();
    assert_eq!(conn.id, b_id);
}

#[tokio::test]
async fn dispose_twice_is_noop() {
    let reset = Reset::default();
    let pool = build(2, &reset).await;

    let mut conn = pool.get().await.unwrap();
    Lease::dispose(&mut conn).await;
    Lease::dispose(&mut conn).await;
    drop(conn);

    let status = pool.status();
    assert_eq!(status.size, 1);
    assert_eq!(status.idle, 1);
    assert_eq!(status.abandoned, 0);
    assert_consistent(status);
    assert_eq!(reset.calls(), 1);
    assert_eq!(pool.metrics().normalized(), 1);
}

#[tokio::test]
async fn overflow_connections_are_destroyed_without_normalizing() {
    let reset = Reset::default();
    let pool = Pool::builder(Manager::default())
        .max_size(1)
        .overflow(1)
        .probe(Ping)
        .normalizer(reset.clone())
        .build()
        .await
        .unwrap();

    let mut a = pool.get().await.unwrap();
    let mut b = pool.get().await.unwrap();
    assert_eq!(pool.status().size, 2);

    Lease::dispose(&mut a).await;
    Lease::dispose(&mut b).await;

    let status = pool.status();
    assert_eq!(status.size, 1);
    assert_eq!(status.idle, 1);
    assert_consistent(status);
    assert_eq!(reset.calls(), 1);
    assert_eq!(pool.metrics().destroyed(), 1);
}

#[tokio::test]
async fn failed_normalize_destroys_connection() {
    let reset = Reset::failing();
    let pool = build(2, &reset).await;

    let mut conn = pool.get().await.unwrap();
    Lease::dispose(&mut conn).await;

    let status = pool.status();
    assert_eq!(status.size, 0);
    assert_eq!(status.idle, 0);
    assert_eq!(reset.calls(), 1);
    assert_eq!(pool.metrics().normalized(), 0);
    assert_eq!(pool.metrics().destroyed(), 1);

    let conn = pool.get().await.unwrap();
    assert_eq!(conn.id, 1);
}

#[tokio::test]
async fn take_detaches_connection() {
    let reset = Reset::default();
    let pool = build(1, &reset).await;

    let conn = pool.get().await.unwrap();
    let raw = Lease::take(conn);
    assert_eq!(raw.id, 0);

    let status = pool.status();
    assert_eq!(status.size, 0);
    assert_eq!(status.leased, 0);

    let conn = pool.get().await.unwrap();
    assert_eq!(conn.id, 1);
    assert!(Lease::pool(&conn).is_some());
}

#[tokio::test]
async fn connection_arguments_are_a_copy() {
    let pool = Pool::builder(Manager::default())
        .max_size(1)
        .argument("host", "db.local")
        .build()
        .await
        .unwrap();

    let mut args = pool.connection_arguments();
    let _ = args.insert("host", "elsewhere");
    assert_eq!(pool.connection_arguments().get("host"), Some("db.local"));

    let conn = pool.get().await.unwrap();
    assert_eq!(conn.host.as_deref(), Some("db.local"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gets_receive_distinct_connections() {
    let reset = Reset::default();
    let pool = Pool::builder(Manager::default())
        .max_size(4)
        .wait(WaitPolicy::Forever)
        .probe(Ping)
        .normalizer(reset.clone())
        .build()
        .await
        .unwrap();
    let in_use = Arc::new(Mutex::new(HashSet::new()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            let in_use = in_use.clone();
            tokio::spawn(async move {
                for _ in 0..8 {
                    let mut conn = pool.get().await.unwrap();
                    assert!(in_use.lock().unwrap().insert(conn.id));
                    tokio::task::yield_now().await;
                    assert!(in_use.lock().unwrap().remove(&conn.id));
                    Lease::dispose(&mut conn).await;
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let status = pool.status();
    assert_eq!(status.leased, 0);
    assert!(status.size <= 4);
    assert_consistent(status);
    assert!(pool.metrics().created() <= 4);
}
