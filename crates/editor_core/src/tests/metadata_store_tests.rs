use super::*;

fn probe() -> StaticEnvironment {
    StaticEnvironment {
        timezone: Some("Europe/Berlin".into()),
        locale: Some("de-DE".into()),
    }
}

#[test]
fn injects_environment_values_into_unset_fields() {
    let mut store = MetadataStore::new();
    assert!(store.inject_defaults(&probe()));
    assert_eq!(store.entry().timezone, "Europe/Berlin");
    assert_eq!(store.entry().locale, "de-DE");
    assert!(store.defaults_injected());
}

#[test]
fn injection_latch_keeps_explicit_empty_timezone() {
    let mut store = MetadataStore::new();
    store.inject_defaults(&probe());
    store.set_timezone("");

    assert!(!store.inject_defaults(&probe()));
    assert_eq!(store.entry().timezone, "");
    assert_eq!(store.entry().locale, "de-DE");
}

#[test]
fn injection_skips_explicit_choices_made_before_mount() {
    let mut store = MetadataStore::new();
    store.set_locale("");
    store.inject_defaults(&probe());

    assert_eq!(store.entry().locale, "");
    assert_eq!(store.entry().timezone, "Europe/Berlin");
}

#[test]
fn hydrated_values_win_over_environment() {
    let mut store = MetadataStore::new();
    store.hydrate(
        Some(RenderScale::Double),
        Some("America/Chicago".into()),
        Some(String::new()),
    );
    store.inject_defaults(&probe());

    assert_eq!(store.render_scale(), Some(RenderScale::Double));
    assert_eq!(store.entry().timezone, "America/Chicago");
    // An empty locale in the URL is "unspecified", so the environment fills it.
    assert_eq!(store.entry().locale, "de-DE");
}

#[test]
fn missing_environment_values_leave_fields_empty() {
    let mut store = MetadataStore::new();
    assert!(!store.inject_defaults(&StaticEnvironment::default()));
    assert_eq!(store.entry(), &MetadataEntry::default());
}

#[test]
fn setters_report_whether_anything_changed() {
    let mut store = MetadataStore::new();
    assert!(store.set_render_scale(Some(RenderScale::Single)));
    assert!(!store.set_render_scale(Some(RenderScale::Single)));
    assert!(store.set_timezone("UTC"));
    assert!(!store.set_timezone("UTC"));
}

#[test]
fn normalizes_posix_locales() {
    assert_eq!(normalize_posix_locale("en_US.UTF-8").as_deref(), Some("en-US"));
    assert_eq!(normalize_posix_locale("de_DE@euro").as_deref(), Some("de-DE"));
    assert_eq!(normalize_posix_locale("fr").as_deref(), Some("fr"));
    assert_eq!(normalize_posix_locale("C"), None);
    assert_eq!(normalize_posix_locale("POSIX"), None);
    assert_eq!(normalize_posix_locale(""), None);
}

#[test]
fn tz_paths_are_not_zone_names() {
    assert_eq!(zone_from_tz(":America/New_York"), Some("America/New_York".into()));
    assert_eq!(zone_from_tz("UTC"), Some("UTC".into()));
    assert_eq!(zone_from_tz(":/etc/localtime"), None);
    assert_eq!(zone_from_tz("/usr/share/zoneinfo/UTC"), None);
    assert_eq!(zone_from_tz("  "), None);
}
