//! Optimistic concurrency between writers holding the same original.

use crate::common::{self, RecordingStorage, insert_one};
use resource_layer::error::ResourceError;
use resource_layer::resource::{Item, RequestContext, Resource};
use resource_layer::storage::InMemoryStorage;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn renamed(original: &Item, name: &str) -> Item {
    let mut payload = original.payload.clone();
    payload.insert("name".to_string(), json!(name));
    Item::new(payload).unwrap()
}

#[tokio::test]
async fn test_stale_writer_gets_conflict() {
    common::init_logging();
    let index = common::users_and_posts();
    let users = index.resource("users").unwrap();
    let original = insert_one(users, json!({"name": "Ann"})).await;
    let ctx = RequestContext::default();

    let (first, second) = tokio::join!(
        users.update(&ctx, renamed(&original, "Alice"), &original),
        users.update(&ctx, renamed(&original, "Anne"), &original),
    );

    let outcomes = [first, second];
    let won: Vec<&Item> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    let lost: Vec<&ResourceError> = outcomes.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(won.len(), 1);
    assert_eq!(lost, vec![&ResourceError::Conflict]);

    let stored = users.get(&ctx, &original.id).await.unwrap();
    assert_eq!(&stored, won[0]);
}

#[tokio::test]
async fn test_update_cannot_take_another_id() {
    let storage = RecordingStorage::new();
    let index =
        common::users_and_posts_on(Arc::new(storage.clone()), Arc::new(InMemoryStorage::new()));
    let users = index.resource("users").unwrap();
    let a = insert_one(users, json!({"name": "a"})).await;
    let b = insert_one(users, json!({"name": "b"})).await;
    let ctx = RequestContext::default();
    storage.reset();

    let mut payload = b.payload.clone();
    payload.insert("name".to_string(), json!("taken"));
    let err = users
        .update(&ctx, Item::new(payload).unwrap(), &a)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResourceError::ValidationFailed { ref message, .. } if message == "Cannot change document ID"
    ));
    assert!(!storage.calls().contains(&"update"));
    assert_eq!(users.get(&ctx, &a.id).await.unwrap(), a);
    assert_eq!(users.get(&ctx, &b.id).await.unwrap(), b);
}

#[tokio::test]
async fn test_delete_with_stale_etag_conflicts() {
    let index = common::users_and_posts();
    let users = index.resource("users").unwrap();
    let original = insert_one(users, json!({"name": "Ann"})).await;
    let ctx = RequestContext::default();

    users
        .update(&ctx, renamed(&original, "Alice"), &original)
        .await
        .unwrap();
    let err = users.delete(&ctx, &original).await.unwrap_err();

    assert_eq!(err, ResourceError::Conflict);
    assert!(users.get(&ctx, &original.id).await.is_ok());
}

/// Read-modify-write of the `age` counter, retrying on conflict.
async fn increment(users: &Resource, id: &Value) -> usize {
    let ctx = RequestContext::with_generated_id();
    let mut conflicts = 0;
    loop {
        let original = users.get(&ctx, id).await.unwrap();
        let age = original.get("age").and_then(Value::as_i64).unwrap_or(0);
        let mut payload = original.payload.clone();
        payload.insert("age".to_string(), json!(age + 1));

        match users.update(&ctx, Item::new(payload).unwrap(), &original).await {
            Ok(_) => return conflicts,
            Err(ResourceError::Conflict) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retrying_writers_lose_no_update() {
    let storage = InMemoryStorage::new().with_latency(Duration::from_millis(1));
    let index = Arc::new(common::users_and_posts_on(
        Arc::new(storage),
        Arc::new(InMemoryStorage::new()),
    ));
    let users = index.resource("users").unwrap();
    let counter = insert_one(users, json!({"name": "counter", "age": 0})).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let index = index.clone();
        let id = counter.id.clone();
        tasks.push(tokio::spawn(async move {
            let users = index.resource("users").unwrap();
            increment(users, &id).await
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = users
        .get(&RequestContext::default(), &counter.id)
        .await
        .unwrap();
    assert_eq!(stored.get("age"), Some(&json!(8)));
}
