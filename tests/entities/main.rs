
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use entity_store::{
    fields, ChangeSet, EntityDefinitions, EntityPayload, ModelRegistry, Store, StoreError,
};
use models::{Post, User};
use pretty_assertions::assert_eq;
use serde_json::json;

fn store() -> Store {
    let registry = ModelRegistry::builder()
        .model::<User>()
        .model::<Post>()
        .build()
        .unwrap();
    Store::builder(registry)
        .entity::<User>("users")
        .entity::<Post>("posts")
        .build()
}

fn payload(json: serde_json::Value) -> EntityPayload {
    EntityPayload::from_json(json).unwrap()
}

fn recorder() -> (Arc<Mutex<Vec<ChangeSet>>>, impl Fn(ChangeSet) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |change| sink.lock().unwrap().push(change))
}

#[test]
fn merge_into_existing_entity_keeps_identity() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    let held = store.entity_as::<User>("users", "u1").unwrap();

    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Grace", "admin": true}}})))
        .unwrap();

    let current = store.entity_as::<User>("users", "u1").unwrap();
    assert!(Rc::ptr_eq(held.record(), current.record()));
    assert_eq!(held.get_name().as_deref(), Some("Grace"));
    assert!(held.is_admin());
}

#[test]
fn unseen_entity_is_created_with_defaults_and_payload() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u7": {"admin": true}}})))
        .unwrap();

    let users = store.partition("users").unwrap();
    assert_eq!(users.len(), 1);

    let created = store.entity_as::<User>("users", "u7").unwrap();
    assert_eq!(created.id(), "u7");
    assert_eq!(created.get_name().as_deref(), Some("anonymous"));
    assert!(created.is_admin());
    assert!(created.record().store().unwrap().same_store(&store));
}

#[test]
fn untouched_ids_are_carried_over() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    let ada = store.entity("users", "u1").unwrap();

    store
        .add_entities(payload(json!({"users": {"u2": {"name": "Grace"}}})))
        .unwrap();

    let users = store.partition("users").unwrap();
    assert_eq!(users.keys().collect::<Vec<_>>(), vec!["u1", "u2"]);
    assert!(Rc::ptr_eq(&ada, users["u1"].as_record().unwrap()));
}

#[test]
fn existing_record_notifies_its_own_listeners_once() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    let ada = store.entity("users", "u1").unwrap();
    let (seen, listener) = recorder();
    ada.on_change(listener);

    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Grace", "admin": true}}})))
        .unwrap();
    ada.settle();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        ChangeSet {
            type_tag: "User".into(),
            id: "u1".into(),
            fields: vec!["admin".into(), "name".into()],
        }
    );
}

#[test]
fn identical_payload_does_not_notify_record() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    let ada = store.entity("users", "u1").unwrap();
    let (seen, listener) = recorder();
    ada.on_change(listener);

    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    ada.settle();

    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn add_entities_notifies_store_once_for_all_partitions() {
    let store = store();
    let (seen, listener) = recorder();
    store.on_change(listener);

    store
        .add_entities(payload(json!({
            "users": {"u1": {"name": "Ada"}, "u2": {"name": "Grace"}},
            "posts": {"p1": {"title": "Hello"}}
        })))
        .unwrap();
    store.settle();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].fields, vec!["posts".to_string(), "users".to_string()]);
}

#[test]
fn payload_may_reference_live_records() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    let ada = store.entity_as::<User>("users", "u1").unwrap();

    let mut posts = EntityPayload::new();
    posts.insert("posts", "p1", fields! { "title" => "Notes", "author" => ada.clone() });
    store.add_entities(posts).unwrap();

    let post = store.entity_as::<Post>("posts", "p1").unwrap();
    assert!(Rc::ptr_eq(post.get_author().unwrap().record(), ada.record()));
}

#[test]
fn missing_definition_fails_without_rollback() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}}})))
        .unwrap();
    let ada = store.entity_as::<User>("users", "u1").unwrap();

    let err = store
        .add_entities(payload(json!({
            "users": {"u1": {"name": "Grace"}, "u2": {"name": "Linus"}},
            "zines": {"z1": {}}
        })))
        .unwrap_err();

    assert!(matches!(err, StoreError::UnknownEntityDefinition(p) if p == "zines"));
    // Earlier partitions were applied to live records, but not installed.
    assert_eq!(ada.get_name().as_deref(), Some("Grace"));
    assert!(store.entity("users", "u2").is_none());
}

#[test]
fn entity_definitions_can_be_replaced_per_store() {
    let store = store();
    store.set_entity_definitions(EntityDefinitions::new().with::<Post>("articles"));

    assert!(matches!(
        store
            .add_entities(payload(json!({"users": {"u1": {}}})))
            .unwrap_err(),
        StoreError::UnknownEntityDefinition(_)
    ));

    store
        .add_entities(payload(json!({"articles": {"a1": {"title": "Hi"}}})))
        .unwrap();
    let article = store.entity_as::<Post>("articles", "a1").unwrap();
    assert_eq!(article.get_title().as_deref(), Some("Hi"));
    assert_eq!(
        store.entity_definitions().partitions().collect::<Vec<_>>(),
        vec!["articles"]
    );
}

#[test]
fn merged_entities_survive_stringify_and_parse() {
    let store = store();
    store
        .add_entities(payload(json!({"users": {"u1": {"name": "Ada"}, "u2": {"name": "Grace"}}})))
        .unwrap();
    let ada = store.entity_as::<User>("users", "u1").unwrap();
    let grace = store.entity_as::<User>("users", "u2").unwrap();
    ada.set_best_friend(grace.clone());
    grace.set_best_friend(ada.clone());

    let restored = Store::new(store.registry().clone());
    restored.parse(&store.stringify(&[]).unwrap()).unwrap();

    let ada2 = restored.entity_as::<User>("users", "u1").unwrap();
    let grace2 = restored.entity_as::<User>("users", "u2").unwrap();
    assert!(Rc::ptr_eq(ada2.get_best_friend().unwrap().record(), grace2.record()));
    assert!(Rc::ptr_eq(grace2.get_best_friend().unwrap().record(), ada2.record()));
}
