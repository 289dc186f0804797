mod models;

use std::rc::Rc;
use std::sync::Arc;

use entity_store::{
    fields, FieldValue, ModelRegistry, Snapshot, Store, StoreError, Value,
};
use models::{Node, User};
use pretty_assertions::assert_eq;
use serde_json::json;

fn registry() -> Arc<ModelRegistry> {
    ModelRegistry::builder()
        .model::<User>()
        .model::<Node>()
        .build()
        .unwrap()
}

fn restore(text: &str) -> Store {
    let store = Store::new(registry());
    store.parse(text).unwrap();
    store
}

#[test]
fn wire_format_replaces_records_with_tokens() {
    let ada = User::create("u1", fields! { "name" => "Ada" }).unwrap();
    let store = Store::builder(registry())
        .value("me", ada)
        .value("count", 3)
        .build();

    let text = store.stringify(&[]).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(
        parsed,
        json!({
            "state": {
                "count": 3,
                "me": {"_constructor": "User", "_id": "u1"}
            },
            "models": {
                "Node": {},
                "User": {
                    "u1": {"id": "u1", "name": "Ada", "friend": null}
                }
            }
        })
    );
}

#[test]
fn two_node_cycle_pools_each_record_once() {
    let a = Node::create("a", fields! { "label" => "A" }).unwrap();
    let b = Node::create("b", fields! { "label" => "B" }).unwrap();
    a.set_next(b.clone());
    b.set_prev(a.clone());

    let store = Store::builder(registry()).value("head", a.clone()).build();
    let snapshot = store.snapshot(&[]);

    assert_eq!(snapshot.pooled_count(), 2);
    assert!(snapshot.pooled("Node", "a").is_some());
    assert!(snapshot.pooled("Node", "b").is_some());
    snapshot.validate().unwrap();

    let restored = restore(&snapshot.to_json().unwrap());
    let head = Node::from_value(&restored.get("head").unwrap()).unwrap();
    let next = head.get_next().unwrap();
    let back = next.get_prev().unwrap();

    assert!(Rc::ptr_eq(head.record(), back.record()));
    assert!(!Rc::ptr_eq(head.record(), a.record()));
    assert_eq!(head.get_label().as_deref(), Some("A"));
    assert_eq!(next.get_label().as_deref(), Some("B"));
}

#[test]
fn record_reached_twice_is_pooled_once_and_restored_shared() {
    let ada = User::create("u1", fields! { "name" => "Ada" }).unwrap();
    let store = Store::builder(registry())
        .value("owner", ada.clone())
        .value(
            "members",
            vec![Value::from(ada.clone()), Value::from("guest")],
        )
        .build();

    let snapshot = store.snapshot(&[]);
    assert_eq!(snapshot.pooled_count(), 1);

    let restored = restore(&snapshot.to_json().unwrap());
    let owner = restored.get("owner").unwrap();
    let members = restored.get("members").unwrap();
    let members = members.as_list().unwrap();

    assert!(Rc::ptr_eq(
        owner.as_record().unwrap(),
        members[0].as_record().unwrap()
    ));
    assert_eq!(members[1], Value::from("guest"));
}

#[test]
fn cross_referencing_users_restore_to_same_instances() {
    let u2 = User::create("u2", fields! { "name" => "Grace" }).unwrap();
    let u1 = User::create("u1", fields! { "name" => "Ada", "friend" => u2.clone() }).unwrap();
    let users = fields! { "u1" => u1, "u2" => u2 };
    let store = Store::builder(registry()).value("users", users).build();

    let restored = restore(&store.stringify(&[]).unwrap());
    let u1 = restored.entity_as::<User>("users", "u1").unwrap();
    let u2 = restored.entity_as::<User>("users", "u2").unwrap();

    assert!(Rc::ptr_eq(u1.get_friend().unwrap().record(), u2.record()));
    assert!(u2.get_friend().is_none());
    assert_eq!(u2.get_name().as_deref(), Some("Grace"));
}

#[test]
fn stringify_with_keys_keeps_only_those_keys() {
    let store = Store::builder(registry())
        .value("a", 1)
        .value("b", 2)
        .build();

    let parsed: serde_json::Value =
        serde_json::from_str(&store.stringify(&["a"]).unwrap()).unwrap();
    assert_eq!(parsed["state"], json!({"a": 1}));
}

#[test]
fn records_only_reachable_from_records_are_pooled() {
    let u3 = User::create("u3", fields! { "name" => "Hidden" }).unwrap();
    let u1 = User::create("u1", fields! { "friend" => u3 }).unwrap();
    let store = Store::builder(registry()).value("me", u1).build();

    let snapshot = store.snapshot(&[]);
    assert_eq!(snapshot.pooled_count(), 2);
    assert!(snapshot.pooled("User", "u3").is_some());
}

#[test]
fn unregistered_type_fails_to_restore() {
    let node = Node::create("n1", fields! {}).unwrap();
    let store = Store::builder(registry()).value("n", node).build();
    let text = store.stringify(&[]).unwrap();

    let users_only = ModelRegistry::builder().model::<User>().build().unwrap();
    let target = Store::new(users_only);
    let err = target.parse(&text).unwrap_err();

    assert!(matches!(
        err,
        StoreError::UnresolvedReference { type_tag, id } if type_tag == "Node" && id == "n1"
    ));
    assert!(target.get_state().is_empty());
}

#[test]
fn numeric_ids_in_text_are_read_as_strings() {
    let store = restore(
        r#"{
            "state": {"me": {"_constructor": "User", "_id": 42}},
            "models": {"User": {"42": {"id": 42, "name": "Ada"}}}
        }"#,
    );

    let me = User::from_value(&store.get("me").unwrap()).unwrap();
    assert_eq!(me.id(), "42");
    assert_eq!(me.get_name().as_deref(), Some("Ada"));
}

#[test]
fn snapshot_text_round_trips_through_typed_form() {
    let ada = User::create("u1", fields! { "name" => "Ada" }).unwrap();
    let store = Store::builder(registry()).value("me", ada).build();

    let snapshot = store.snapshot(&[]);
    let reparsed = Snapshot::from_json(&snapshot.to_json_pretty().unwrap()).unwrap();
    assert_eq!(reparsed, snapshot);
}
