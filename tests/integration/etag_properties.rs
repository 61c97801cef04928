//! Property tests for content hashes.

use proptest::prelude::*;
use resource_layer::resource::{ETag, Item, header_matches};
use serde_json::{Map, Value, json};

fn field_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z]{0,12}".prop_map(Value::from),
        prop::collection::vec("[a-z]{1,4}", 0..4).prop_map(|v| json!(v)),
    ]
}

fn fields() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z]{1,8}", field_value(), 1..8)
        .prop_map(|fields| fields.into_iter().collect())
}

proptest! {
    #[test]
    fn etag_ignores_insertion_order(fields in fields()) {
        let forward: Map<String, Value> = fields.iter().cloned().collect();
        let backward: Map<String, Value> = fields.iter().rev().cloned().collect();

        prop_assert_eq!(
            ETag::from_payload(&forward).unwrap(),
            ETag::from_payload(&backward).unwrap()
        );
    }

    #[test]
    fn etag_tracks_every_field(fields in fields(), extra in "[A-Z]{1,8}") {
        let mut payload: Map<String, Value> = fields.into_iter().collect();
        payload.insert("id".to_string(), json!("1"));
        let item = Item::new(payload.clone()).unwrap();

        payload.insert(extra, Value::Null);
        prop_assert_ne!(item.etag, ETag::from_payload(&payload).unwrap());
    }

    #[test]
    fn header_form_matches(fields in fields()) {
        let payload: Map<String, Value> = fields.into_iter().collect();
        let etag = ETag::from_payload(&payload).unwrap();

        let strong = etag.to_header();
        let weak = format!("W/{strong}");
        let listed = format!("\"other\", {strong}");

        prop_assert!(header_matches(&strong, &etag));
        prop_assert!(header_matches(&weak, &etag));
        prop_assert!(header_matches(&listed, &etag));
        prop_assert!(!header_matches("\"other\"", &etag));
    }
}
