use super::*;
use shared::domain::FieldType;

fn ids(snapshot: &ConfigSnapshot) -> Vec<&str> {
    snapshot.iter().map(|entry| entry.id.as_str()).collect()
}

#[test]
fn set_coerces_values_to_strings() {
    let mut store = ConfigStore::new();
    store.set("count", 42);
    store.set("enabled", true);

    assert_eq!(store.get("count"), Some("42"));
    assert_eq!(store.get("enabled"), Some("true"));
}

#[test]
fn set_upserts_in_place_and_reports_changes() {
    let mut store = ConfigStore::new();
    assert!(store.set("a", "1"));
    assert!(store.set("b", "2"));
    assert!(store.set("a", "3"));
    assert!(!store.set("a", "3"));

    let snapshot = store.get_all();
    assert_eq!(ids(&snapshot), vec!["a", "b"]);
    assert_eq!(snapshot.get("a"), Some("3"));
}

#[test]
fn revision_only_moves_on_real_changes() {
    let mut store = ConfigStore::new();
    store.set("a", "1");
    let before = store.revision();
    store.set("a", "1");
    assert_eq!(store.revision(), before);
    store.set("a", "2");
    assert!(store.revision() > before);
}

#[test]
fn remove_keeps_remaining_order_and_index() {
    let mut store = ConfigStore::new();
    store.set("a", "1");
    store.set("b", "2");
    store.set("c", "3");

    let removed = store.remove("a").expect("entry removed");
    assert_eq!(removed.value, "1");
    assert!(store.remove("a").is_none());

    store.set("c", "33");
    assert_eq!(ids(&store.get_all()), vec!["b", "c"]);
    assert_eq!(store.get("c"), Some("33"));
    assert_eq!(store.get("b"), Some("2"));
}

#[test]
fn snapshots_are_not_affected_by_later_edits() {
    let mut store = ConfigStore::new();
    store.set("a", "1");
    let snapshot = store.get_all();
    store.set("a", "2");

    assert_eq!(snapshot.get("a"), Some("1"));
    assert_eq!(store.get("a"), Some("2"));
}

#[test]
fn reset_only_touches_fields_with_defaults() {
    let schema = vec![
        FieldSchema::new("a", FieldType::Text).with_default("x"),
        FieldSchema::new("b", FieldType::Text),
    ];
    let mut store = ConfigStore::new();
    store.set("a", "edited");
    store.set("b", "keep");

    assert_eq!(store.reset_to_defaults(&schema), 1);
    assert_eq!(store.get("a"), Some("x"));
    assert_eq!(store.get("b"), Some("keep"));
}

#[test]
fn reset_writes_non_string_defaults_as_json() {
    let schema = vec![
        FieldSchema::new("loc", FieldType::LocationBased)
            .with_default(serde_json::json!({"lat": "1", "lng": "2"})),
        FieldSchema::new("flag", FieldType::Toggle).with_default(false),
        FieldSchema::new("blank", FieldType::Text).with_default(""),
    ];
    let mut store = ConfigStore::new();
    store.reset_to_defaults(&schema);

    assert_eq!(store.get("loc"), Some(r#"{"lat":"1","lng":"2"}"#));
    assert_eq!(store.get("flag"), Some("false"));
    assert!(!store.contains("blank"));
}

#[test]
fn fill_missing_defaults_never_overwrites() {
    let schema = vec![
        FieldSchema::new("a", FieldType::Text).with_default("x"),
        FieldSchema::new("b", FieldType::Text).with_default("y"),
    ];
    let mut store = ConfigStore::new();
    store.set("a", "from-url");

    assert_eq!(store.fill_missing_defaults(&schema), 1);
    assert_eq!(store.get("a"), Some("from-url"));
    assert_eq!(store.get("b"), Some("y"));
}

#[test]
fn replace_all_drops_entries_missing_from_the_new_set() {
    let mut store = ConfigStore::new();
    store.set("a", "old");
    store.set("c", "orphan");

    store.replace_all(vec![ConfigEntry::new("a", "1"), ConfigEntry::new("b", "2")]);

    let snapshot = store.get_all();
    assert_eq!(
        snapshot.entries(),
        &[ConfigEntry::new("a", "1"), ConfigEntry::new("b", "2")]
    );
    assert!(!store.contains("c"));
}

#[test]
fn replace_all_with_identical_content_is_a_no_op() {
    let mut store = ConfigStore::new();
    store.set("a", "1");
    let before = store.revision();

    store.replace_all(vec![ConfigEntry::new("a", "1")]);
    assert_eq!(store.revision(), before);
}
