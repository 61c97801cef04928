//! References between resources and projection of connections.

use crate::common::{self, insert_one, object};
use resource_layer::error::ResourceError;
use resource_layer::operation_handler::{ItemOperationHandler, ItemOperationRequest};
use resource_layer::query::{Projection, ProjectionField};
use resource_layer::resource::{Conf, Index, RequestContext};
use resource_layer::schema::{Field, Reference, Schema, id_field};
use resource_layer::storage::InMemoryStorage;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_reference_checks_live_ids() {
    common::init_logging();
    let index = common::users_and_posts();
    let users = index.resource("users").unwrap();
    let posts = index.resource("users.posts").unwrap();
    let ann = insert_one(users, json!({"name": "Ann"})).await;
    let ctx = RequestContext::default();

    let payload = object(json!({"user": ann.id.clone(), "title": "hello"}));
    let (changes, base) = posts.schema().prepare(&ctx, &payload, None, false);
    assert!(posts.schema().validate(&changes, &base).is_ok());

    users.delete(&ctx, &ann).await.unwrap();

    let issues = posts.schema().validate(&changes, &base).unwrap_err();
    assert_eq!(issues.to_string(), "user is [not found]");
}

#[tokio::test]
async fn test_dangling_reference_is_rejected() {
    let index = common::users_and_posts();
    let handler = ItemOperationHandler::new(index.resource("users.posts").unwrap());

    let response = handler
        .handle_operation(
            &RequestContext::default(),
            ItemOperationRequest::put("p1", json!({"user": "nobody", "title": "hello"})),
        )
        .await;

    assert_eq!(response.status, 422);
    assert_eq!(response.body.unwrap()["issues"]["user"], json!(["not found"]));
}

#[test]
fn test_forward_references_compile() {
    let mut index = Index::new();
    let articles = Schema::new("articles")
        .field("id", id_field())
        .field("zine", Field::new(Reference::new("zines")));
    let zines = Schema::new("zines").field("id", id_field());

    index
        .bind("articles", articles, None, Conf::default())
        .unwrap();
    index.bind("zines", zines, None, Conf::default()).unwrap();

    assert!(index.compile().is_ok());
}

#[tokio::test]
async fn test_self_reference_compiles_and_validates() {
    let mut index = Index::new();
    let staff = Schema::new("staff")
        .field("id", id_field())
        .field("manager", Field::new(Reference::new("staff")));
    index
        .bind(
            "staff",
            staff,
            Some(Arc::new(InMemoryStorage::new())),
            Conf::default(),
        )
        .unwrap();
    index.compile().unwrap();

    let staff = index.resource("staff").unwrap();
    let boss = insert_one(staff, json!({})).await;
    let ctx = RequestContext::default();

    let payload = object(json!({"manager": boss.id.clone()}));
    let (changes, base) = staff.schema().prepare(&ctx, &payload, None, false);
    assert!(staff.schema().validate(&changes, &base).is_ok());

    let payload = object(json!({"manager": "nobody"}));
    let (changes, base) = staff.schema().prepare(&ctx, &payload, None, false);
    let issues = staff.schema().validate(&changes, &base).unwrap_err();
    assert_eq!(issues.to_string(), "manager is [not found]");
}

async fn ann_with_posts(index: &Index) -> serde_json::Value {
    let users = index.resource("users").unwrap();
    let posts = index.resource("users.posts").unwrap();
    let ann = insert_one(users, json!({"name": "Ann"})).await;
    for title in ["b", "a", "c"] {
        insert_one(posts, json!({"user": ann.id.clone(), "title": title})).await;
    }
    ann.id
}

#[tokio::test]
async fn test_connection_projection() {
    let index = common::users_and_posts();
    let id = ann_with_posts(&index).await;
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());

    let projection = Projection(vec![
        ProjectionField::new("name"),
        ProjectionField::new("posts")
            .alias("latest")
            .param("sort", json!("title"))
            .param("limit", json!(2))
            .children(Projection::fields(["title"])),
    ]);
    let response = handler
        .execute(
            &RequestContext::default(),
            ItemOperationRequest::get(id).with_projection(projection),
        )
        .await
        .unwrap();

    assert_eq!(
        response.body,
        Some(json!({
            "name": "Ann",
            "latest": [{"title": "a"}, {"title": "b"}]
        }))
    );
}

#[tokio::test]
async fn test_connection_params_are_validated() {
    let index = common::users_and_posts();
    let id = ann_with_posts(&index).await;
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());

    let projection = Projection(vec![
        ProjectionField::new("posts").param("limit", json!(5000)),
    ]);
    let err = handler
        .execute(
            &RequestContext::default(),
            ItemOperationRequest::get(id).with_projection(projection),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResourceError::ValidationFailed { ref message, .. } if message == "Invalid projection"
    ));
}

#[tokio::test]
async fn test_default_limit_applies_to_connections() {
    let mut index = Index::new();
    index
        .bind(
            "users",
            common::users_schema(),
            Some(Arc::new(InMemoryStorage::new())),
            Conf::default(),
        )
        .unwrap()
        .bind(
            "posts",
            "user",
            common::posts_schema(),
            Some(Arc::new(InMemoryStorage::new())),
            Conf::default().with_default_limit(1),
        )
        .unwrap();
    index.compile().unwrap();
    let id = ann_with_posts(&index).await;
    let handler = ItemOperationHandler::new(index.resource("users").unwrap());

    let projection = Projection(vec![
        ProjectionField::new("posts").children(Projection::fields(["title"])),
    ]);
    let response = handler
        .execute(
            &RequestContext::default(),
            ItemOperationRequest::get(id).with_projection(projection),
        )
        .await
        .unwrap();

    let body = response.body.unwrap();
    assert_eq!(body["posts"].as_array().map(Vec::len), Some(1));
}
