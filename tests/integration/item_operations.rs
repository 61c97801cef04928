//! Conditional item flows through the operation handler.

use crate::common::{self, RecordingStorage};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use resource_layer::error::{ResourceError, ResourceResult};
use resource_layer::operation_handler::{ItemOperationHandler, ItemOperationRequest};
use resource_layer::query::Projection;
use resource_layer::resource::{
    Command, CommandOutcome, Conf, EventHandler, Index, Item, RequestContext, UpdateEventHandler,
};
use resource_layer::schema::{Field, Schema, Text, id_field};
use resource_layer::storage::InMemoryStorage;
use serde_json::{Map, Value, json};
use std::sync::Arc;

async fn put(handler: &ItemOperationHandler<'_>, id: &str, payload: Value) -> Item {
    let response = handler
        .execute(
            &RequestContext::default(),
            ItemOperationRequest::put(id, payload),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    let body = response.body.unwrap();
    Item::new(body.as_object().cloned().unwrap()).unwrap()
}

#[tokio::test]
async fn test_put_creates_then_replaces() {
    common::init_logging();
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();

    let created = handler
        .execute(
            &ctx,
            ItemOperationRequest::put("u1", json!({"name": "Ann", "age": 30})),
        )
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    let body = created.body.unwrap();
    assert_eq!(body["id"], json!("u1"));
    assert_eq!(body["age"], json!(30));
    assert!(created.etag.is_some());

    let replaced = handler
        .execute(&ctx, ItemOperationRequest::put("u1", json!({"name": "Ann B"})))
        .await
        .unwrap();
    assert_eq!(replaced.status, 200);
    let body = replaced.body.unwrap();
    assert_eq!(body["name"], json!("Ann B"));
    assert!(body.get("age").is_none());
    assert_ne!(replaced.etag, created.etag);
}

#[tokio::test]
async fn test_failed_precondition_never_reaches_storage() {
    let storage = RecordingStorage::new();
    let index =
        common::users_and_posts_on(Arc::new(storage.clone()), Arc::new(InMemoryStorage::new()));
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    put(&handler, "u1", json!({"name": "Ann"})).await;
    storage.reset();

    let response = handler
        .handle_operation(
            &RequestContext::default(),
            ItemOperationRequest::put("u1", json!({"name": "Bob"})).if_match("\"stale\""),
        )
        .await;

    assert_eq!(response.status, 412);
    assert_eq!(
        response.body,
        Some(json!({"code": 412, "message": "Precondition Failed"}))
    );
    assert_eq!(storage.calls(), vec!["find"]);
}

#[tokio::test]
async fn test_matching_if_match_writes() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    let created = handler
        .execute(&ctx, ItemOperationRequest::put("u1", json!({"name": "Ann"})))
        .await
        .unwrap();
    let etag = created.etag.unwrap();

    let updated = handler
        .execute(
            &ctx,
            ItemOperationRequest::patch("u1", json!({"age": 31})).if_match(etag.to_header()),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body.unwrap()["age"], json!(31));

    // The etag sent before the patch is now stale.
    let err = handler
        .execute(
            &ctx,
            ItemOperationRequest::patch("u1", json!({"age": 32})).if_match(etag.to_header()),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::PreconditionFailed);
}

#[tokio::test]
async fn test_conditional_write_on_missing_item() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());

    let err = handler
        .execute(
            &RequestContext::default(),
            ItemOperationRequest::put("ghost", json!({"name": "Ann"})).if_match("*"),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::PreconditionFailed);
}

#[tokio::test]
async fn test_patch_keeps_other_fields() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    put(&handler, "u1", json!({"name": "Ann", "age": 30})).await;

    let patched = handler
        .execute(&ctx, ItemOperationRequest::patch("u1", json!({"age": 31})))
        .await
        .unwrap();
    let body = patched.body.unwrap();
    assert_eq!(body["name"], json!("Ann"));
    assert_eq!(body["age"], json!(31));

    let missing = handler
        .handle_operation(&ctx, ItemOperationRequest::patch("u2", json!({"age": 1})))
        .await;
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn test_invalid_documents_are_rejected() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();

    let response = handler
        .handle_operation(&ctx, ItemOperationRequest::put("u1", json!({"age": "old"})))
        .await;
    assert_eq!(response.status, 422);
    let body = response.body.unwrap();
    assert_eq!(body["message"], json!("Document contains error(s)"));
    assert_eq!(body["issues"]["age"], json!(["not an integer"]));
    assert_eq!(body["issues"]["name"], json!(["required"]));

    let response = handler
        .handle_operation(&ctx, ItemOperationRequest::put("u1", json!([1, 2])))
        .await;
    assert_eq!(response.status, 422);
    assert_eq!(response.body.unwrap()["message"], json!("Malformed body"));
}

#[tokio::test]
async fn test_get_conditionals() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    let created = handler
        .execute(&ctx, ItemOperationRequest::put("u1", json!({"name": "Ann"})))
        .await
        .unwrap();
    let etag = created.etag.unwrap();
    let modified = created.last_modified.unwrap();

    let cached = handler
        .execute(&ctx, ItemOperationRequest::get("u1").if_none_match(etag.to_header()))
        .await
        .unwrap();
    assert_eq!(cached.status, 304);
    assert_eq!(cached.body, None);

    let fresh = handler
        .execute(&ctx, ItemOperationRequest::get("u1").if_none_match("\"other\""))
        .await
        .unwrap();
    assert_eq!(fresh.status, 200);

    let cached = handler
        .execute(
            &ctx,
            ItemOperationRequest::get("u1").if_modified_since(Utc::now() + Duration::hours(1)),
        )
        .await
        .unwrap();
    assert_eq!(cached.status, 304);

    let fresh = handler
        .execute(
            &ctx,
            ItemOperationRequest::get("u1").if_modified_since(modified - Duration::hours(1)),
        )
        .await
        .unwrap();
    assert_eq!(fresh.status, 200);
}

#[tokio::test]
async fn test_get_with_projection_and_lookup() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    put(&handler, "u1", json!({"name": "Ann", "age": 30})).await;

    let projected = handler
        .execute(
            &ctx,
            ItemOperationRequest::get("u1")
                .with_lookup("name", json!("Ann"))
                .with_projection(Projection::fields(["name"])),
        )
        .await
        .unwrap();
    assert_eq!(projected.body, Some(json!({"name": "Ann"})));

    let err = handler
        .execute(
            &ctx,
            ItemOperationRequest::get("u1").with_lookup("name", json!("Bob")),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::NotFound);
}

#[tokio::test]
async fn test_delete_checks_etag() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    let created = handler
        .execute(&ctx, ItemOperationRequest::put("u1", json!({"name": "Ann"})))
        .await
        .unwrap();

    let refused = handler
        .handle_operation(&ctx, ItemOperationRequest::delete("u1").if_match("\"stale\""))
        .await;
    assert_eq!(refused.status, 412);

    let deleted = handler
        .execute(
            &ctx,
            ItemOperationRequest::delete("u1").if_match(created.etag.unwrap().to_header()),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status, 204);
    assert_eq!(deleted.body, None);

    let gone = handler
        .handle_operation(&ctx, ItemOperationRequest::get("u1"))
        .await;
    assert_eq!(gone.status, 404);
}

#[tokio::test]
async fn test_read_only_resource_rejects_writes() {
    let mut index = Index::new();
    index
        .bind(
            "users",
            common::users_schema(),
            Some(Arc::new(InMemoryStorage::new())),
            Conf::read_only(),
        )
        .unwrap();
    index.compile().unwrap();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());

    let response = handler
        .handle_operation(
            &RequestContext::default(),
            ItemOperationRequest::put("u1", json!({"name": "Ann"})),
        )
        .await;
    assert_eq!(response.status, 405);
}

fn notes() -> Index {
    let schema = Schema::new("notes")
        .field("id", id_field())
        .field("text", Field::new(Text::default()));
    let mut index = Index::new();
    index
        .bind(
            "notes",
            schema,
            Some(Arc::new(InMemoryStorage::new())),
            Conf::default(),
        )
        .unwrap();
    index.compile().unwrap();
    index
}

struct Touch;

#[async_trait]
impl UpdateEventHandler for Touch {
    async fn on_update(
        &self,
        _ctx: &RequestContext,
        item: &mut Item,
        _original: &Item,
    ) -> ResourceResult<()> {
        item.payload.insert("touched".to_string(), json!(true));
        Ok(())
    }
}

#[tokio::test]
async fn test_no_content_elision() {
    let index = notes();
    let handler = ItemOperationHandler::new(index.resource("notes").unwrap());
    let ctx = RequestContext::default();

    let created = handler
        .execute(
            &ctx,
            ItemOperationRequest::put("n1", json!({"text": "hello"})).prefer_no_content(),
        )
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.body, None);
    assert!(created.etag.is_some());

    let patched = handler
        .execute(
            &ctx,
            ItemOperationRequest::patch("n1", json!({"text": "bye"})).prefer_no_content(),
        )
        .await
        .unwrap();
    assert_eq!(patched.status, 204);
    assert_eq!(patched.body, None);

    let full = handler
        .execute(&ctx, ItemOperationRequest::patch("n1", json!({"text": "again"})))
        .await
        .unwrap();
    assert_eq!(full.status, 200);
    assert_eq!(full.body, Some(json!({"id": "n1", "text": "again"})));
}

#[tokio::test]
async fn test_hook_edits_are_returned_despite_no_content() {
    let mut index = notes();
    index
        .resource_mut("notes")
        .unwrap()
        .use_handler(EventHandler::Update(Arc::new(Touch)));
    let handler = ItemOperationHandler::new(index.resource("notes").unwrap());
    let ctx = RequestContext::default();
    put(&handler, "n1", json!({"text": "hello"})).await;

    let response = handler
        .execute(
            &ctx,
            ItemOperationRequest::patch("n1", json!({"text": "bye"})).prefer_no_content(),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        Some(json!({"id": "n1", "text": "bye", "touched": true}))
    );
}

struct Rename;

#[async_trait]
impl Command for Rename {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        mut item: Item,
        payload: Map<String, Value>,
    ) -> ResourceResult<CommandOutcome> {
        let previous = item.get("name").cloned().unwrap_or(Value::Null);
        if let Some(name) = payload.get("name") {
            item.payload.insert("name".to_string(), name.clone());
        }
        Ok(CommandOutcome {
            item,
            response: json!({"previous": previous}),
        })
    }
}

fn users_with_rename() -> Index {
    let mut index = common::users_and_posts();
    index
        .resource_mut("users")
        .unwrap()
        .command("rename", Rename)
        .unwrap();
    index
}

#[tokio::test]
async fn test_command_persists_changes() {
    let index = users_with_rename();
    let users = index.resource("users").unwrap();
    let handler = ItemOperationHandler::new(users);
    let ctx = RequestContext::default();
    put(&handler, "u1", json!({"name": "Ann"})).await;

    let response = handler
        .execute(
            &ctx,
            ItemOperationRequest::command("u1", "rename", json!({"name": "Bob"})),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    let body = response.body.unwrap();
    assert_eq!(body["response"], json!({"previous": "Ann"}));
    assert_eq!(body["item"]["name"], json!("Bob"));

    let stored = users.get(&ctx, &json!("u1")).await.unwrap();
    assert_eq!(stored.get("name"), Some(&json!("Bob")));
    assert_eq!(response.etag, Some(stored.etag));
}

#[tokio::test]
async fn test_unchanged_command_item_is_elided() {
    let index = users_with_rename();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    let before = put(&handler, "u1", json!({"name": "Ann"})).await;

    let response = handler
        .execute(
            &ctx,
            ItemOperationRequest::command("u1", "rename", json!({})).prefer_no_content(),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(json!({"response": {"previous": "Ann"}})));
    assert_eq!(response.etag, Some(before.etag));
}

#[tokio::test]
async fn test_command_failures() {
    let index = users_with_rename();
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());
    let ctx = RequestContext::default();
    put(&handler, "u1", json!({"name": "Ann"})).await;

    let unknown = handler
        .handle_operation(&ctx, ItemOperationRequest::command("u1", "archive", json!({})))
        .await;
    assert_eq!(unknown.status, 404);

    let missing = handler
        .handle_operation(&ctx, ItemOperationRequest::command("u9", "rename", json!({})))
        .await;
    assert_eq!(missing.status, 404);

    let stale = handler
        .handle_operation(
            &ctx,
            ItemOperationRequest::command("u1", "rename", json!({"name": "Bob"}))
                .if_match("\"stale\""),
        )
        .await;
    assert_eq!(stale.status, 412);
}
