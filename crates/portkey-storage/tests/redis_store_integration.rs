//! Runs against a real Redis in a container. Needs a container runtime, so
//! these are ignored by default: `cargo test -p portkey-storage -- --ignored`.

use std::time::Duration;

use portkey_core::{KeyValueStore, StorageError};
use portkey_storage::RedisStore;
use portkey_test_infra::redis::{RedisConfig, RedisServer};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Test fixture that manages a Redis container using test-infra.
pub struct RedisTestContainer {
    #[allow(dead_code)]
    redis: RedisServer,
    redis_url: String,
}

impl RedisTestContainer {
    pub async fn start() -> Self {
        let redis = RedisServer::new(RedisConfig::default())
            .await
            .expect("Failed to start Redis server");
        let redis_url = redis.url().await.expect("Failed to get Redis url");
        Self { redis, redis_url }
    }

    pub async fn store(&self) -> RedisStore {
        RedisStore::connect(&self.redis_url, TIMEOUT)
            .await
            .expect("Failed to connect to Redis")
    }
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_set_get_delete() {
    let fixture = RedisTestContainer::start().await;
    let store = fixture.store().await;

    assert_eq!(store.get("test:abc123").await.unwrap(), None);

    store
        .set("test:abc123", "https://example.com", None)
        .await
        .unwrap();
    assert_eq!(
        store.get("test:abc123").await.unwrap().as_deref(),
        Some("https://example.com")
    );

    assert_eq!(store.delete("test:abc123").await.unwrap(), 1);
    assert_eq!(store.delete("test:abc123").await.unwrap(), 0);
    assert_eq!(store.get("test:abc123").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_ttl_expires_key() {
    let fixture = RedisTestContainer::start().await;
    let store = fixture.store().await;

    store
        .set("test:short", "https://example.com", Some(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(store.get("test:short").await.unwrap().is_some());

    // sub-second TTLs round up to one second
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.get("test:short").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_keys_scans_by_prefix() {
    let fixture = RedisTestContainer::start().await;
    let store = fixture.store().await;

    for i in 0..1_200 {
        store
            .set(&format!("dev:{i:04}"), "https://example.com", None)
            .await
            .unwrap();
    }
    store.set("prod:0001", "https://example.com", None).await.unwrap();

    let keys = store.keys("dev:").await.unwrap();
    assert_eq!(keys.len(), 1_200);
    assert!(keys.iter().all(|k| k.starts_with("dev:")));
    assert!(store.keys("staging:").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_incr_counts_and_rejects_non_integers() {
    let fixture = RedisTestContainer::start().await;
    let store = fixture.store().await;

    assert_eq!(store.incr("dev:count_urls_set").await.unwrap(), 1);
    assert_eq!(store.incr("dev:count_urls_set").await.unwrap(), 2);

    store.set("dev:url", "https://example.com", None).await.unwrap();
    let err = store.incr("dev:url").await.unwrap_err();
    assert!(matches!(err, StorageError::Operation(_)));
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_connect_fails_when_server_is_gone() {
    let fixture = RedisTestContainer::start().await;
    let url = fixture.redis_url.clone();
    drop(fixture);

    let result = RedisStore::connect(&url, Duration::from_millis(500)).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_transient());
}
