use super::*;
use crate::config_store::ConfigStore;

#[test]
fn parses_entries_in_file_order() {
    let entries = parse_config_file(br#"{"b":{"value":"2"},"a":{"value":"1","id":"a"}}"#)
        .expect("valid file");
    assert_eq!(
        entries,
        vec![ConfigEntry::new("b", "2"), ConfigEntry::new("a", "1")]
    );
}

#[test]
fn coerces_scalar_values() {
    let entries =
        parse_config_file(br#"{"n":{"value":3},"t":{"value":true}}"#).expect("valid file");
    assert_eq!(
        entries,
        vec![ConfigEntry::new("n", "3"), ConfigEntry::new("t", "true")]
    );
}

#[test]
fn rejects_invalid_encoding() {
    assert!(matches!(
        parse_config_file(&[0xff, 0xfe, 0x00]),
        Err(ImportError::InvalidEncoding(_))
    ));
    assert!(matches!(
        parse_config_file(b"{not json"),
        Err(ImportError::InvalidEncoding(_))
    ));
}

#[test]
fn rejects_wrong_shapes() {
    for input in [
        &br#"["a"]"#[..],
        br#"{"a":"bare"}"#,
        br#"{"a":{}}"#,
        br#"{"a":{"value":null}}"#,
        br#"{"a":{"value":{"nested":1}}}"#,
    ] {
        assert!(
            matches!(parse_config_file(input), Err(ImportError::WrongShape(_))),
            "accepted {}",
            String::from_utf8_lossy(input)
        );
    }
}

#[test]
fn rejects_reserved_keys() {
    assert_eq!(
        parse_config_file(br#"{"_renderScale":{"value":"2"}}"#),
        Err(ImportError::ReservedKey("_renderScale".into()))
    );
}

#[test]
fn export_includes_oversized_entries_in_store_order() {
    let mut store = ConfigStore::new();
    let large = "z".repeat(5000);
    store.set("zeta", "1");
    store.set("alpha", &large);

    let exported = export_config(&store.get_all()).expect("export");
    let reparsed = parse_config_file(exported.as_bytes()).expect("reparse");
    assert_eq!(
        reparsed,
        vec![ConfigEntry::new("zeta", "1"), ConfigEntry::new("alpha", large)]
    );
}
