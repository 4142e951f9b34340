//! View counter against a real Redis.
//!
//! Requires Docker; run with `cargo test -p blog-service -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use testcontainers::{core::WaitFor, runners::AsyncRunner, ContainerAsync, GenericImage};

use blog_service::services::{RedisCounterStore, ViewCounter};

async fn start_redis() -> (ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    let container = image.start().await.expect("redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("redis port");
    let url = format!("redis://127.0.0.1:{}/", port);
    (container, url)
}

async fn manager(url: &str) -> redis::aio::ConnectionManager {
    let client = redis::Client::open(url).expect("redis client");
    redis::aio::ConnectionManager::new(client)
        .await
        .expect("redis connection")
}

#[tokio::test]
#[ignore]
async fn increments_are_visible_under_the_post_key() {
    let (_redis, url) = start_redis().await;
    let mut conn = manager(&url).await;
    let views = ViewCounter::new(Arc::new(RedisCounterStore::from_manager(
        conn.clone(),
        Duration::from_secs(1),
    )));

    assert_eq!(views.read(7).await.unwrap(), 0);

    views.increment(7).await.unwrap();
    views.increment(7).await.unwrap();
    assert_eq!(views.read(7).await.unwrap(), 2);

    let raw: i64 = conn.get("post:7:views").await.unwrap();
    assert_eq!(raw, 2);
}

#[tokio::test]
#[ignore]
async fn read_many_fills_missing_with_zero() {
    let (_redis, url) = start_redis().await;
    let views = ViewCounter::new(Arc::new(RedisCounterStore::from_manager(
        manager(&url).await,
        Duration::from_secs(1),
    )));

    views.increment(1).await.unwrap();
    views.increment(3).await.unwrap();
    views.increment(3).await.unwrap();

    let counts = views.read_many(&[1, 2, 3]).await.unwrap();
    assert_eq!(counts.get(&1), Some(&1));
    assert_eq!(counts.get(&2), Some(&0));
    assert_eq!(counts.get(&3), Some(&2));
}

#[tokio::test]
#[ignore]
async fn concurrent_views_are_not_lost() {
    let (_redis, url) = start_redis().await;
    let views = ViewCounter::new(Arc::new(RedisCounterStore::from_manager(
        manager(&url).await,
        Duration::from_secs(2),
    )));

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let views = views.clone();
            tokio::spawn(async move { views.record_view(11).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(views.display_views(11).await, Some(100));
}
