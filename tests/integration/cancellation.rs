//! Deadlines and cancellation of storage calls.

use crate::common::{self, RecordingStorage, new_item};
use resource_layer::error::ResourceError;
use resource_layer::query::Query;
use resource_layer::resource::{Index, RequestContext};
use resource_layer::storage::InMemoryStorage;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn slow_users() -> Index {
    common::users_and_posts_on(
        Arc::new(InMemoryStorage::new().with_latency(Duration::from_millis(200))),
        Arc::new(InMemoryStorage::new()),
    )
}

#[tokio::test]
async fn test_deadline_abandons_storage_call() {
    common::init_logging();
    let index = slow_users();
    let users = index.resource("users").unwrap();
    let item = new_item(users, json!({"name": "Ann"}));

    let ctx = RequestContext::with_generated_id().with_timeout(Duration::from_millis(20));
    let err = users.insert(&ctx, vec![item.clone()]).await.unwrap_err();
    assert_eq!(err, ResourceError::DeadlineExceeded);

    // The abandoned insert never wrote anything.
    let err = users
        .get(&RequestContext::default(), &item.id)
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::NotFound);
}

#[tokio::test]
async fn test_cancel_in_flight_find() {
    let index = slow_users();
    let users = index.resource("users").unwrap();
    let (ctx, handle) = RequestContext::with_generated_id().cancellable();

    let query = Query::default();

    let (result, ()) = tokio::join!(users.find(&ctx, &query), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    });

    assert_eq!(result.unwrap_err(), ResourceError::Canceled);
}

#[tokio::test]
async fn test_cancelled_context_fails_fast() {
    let storage = RecordingStorage::new();
    let index =
        common::users_and_posts_on(Arc::new(storage.clone()), Arc::new(InMemoryStorage::new()));
    let users = index.resource("users").unwrap();
    let (ctx, handle) = RequestContext::with_generated_id().cancellable();
    handle.cancel();

    let err = users.get(&ctx, &json!("u1")).await.unwrap_err();
    assert_eq!(err, ResourceError::Canceled);
    let err = users.count(&ctx, &Query::default()).await.unwrap_err();
    assert_eq!(err, ResourceError::Canceled);
    assert!(storage.calls().is_empty());
}
