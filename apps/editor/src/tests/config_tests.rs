use super::{apply_env_overrides, apply_file_overrides, load_settings, parse_flag, Settings};

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file_overrides(
        &mut settings,
        r#"
backend_url = "https://render.example.com/editor"
url_value_limit = 2048
trailing_refresh = false
"#,
    );
    assert_eq!(settings.backend_url, "https://render.example.com/editor");
    assert_eq!(settings.url_value_limit, 2048);
    assert!(!settings.trailing_refresh);
}

#[test]
fn unreadable_file_keeps_defaults() {
    let mut settings = Settings::default();
    apply_file_overrides(&mut settings, "backend_url = [unterminated");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_plain_name() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("EDITOR_BACKEND_URL", "http://plain:1/"),
        ("APP__BACKEND_URL", "http://prefixed:2/"),
        ("APP__URL_VALUE_LIMIT", "512"),
        ("APP__TRAILING_REFRESH", "off"),
    ]);
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, |key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.backend_url, "http://prefixed:2/");
    assert_eq!(settings.session_options().url_value_limit, 512);
    assert!(!settings.session_options().trailing_refresh);
}

#[test]
fn invalid_env_values_are_ignored() {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, |key| match key {
        "APP__URL_VALUE_LIMIT" => Some("lots".into()),
        "APP__TRAILING_REFRESH" => Some("maybe".into()),
        _ => None,
    });
    assert_eq!(settings, Settings::default());
}

#[test]
fn flags_accept_common_spellings() {
    assert_eq!(parse_flag(" TRUE "), Some(true));
    assert_eq!(parse_flag("0"), Some(false));
    assert_eq!(parse_flag(""), None);
}

#[test]
fn loads_settings_file_from_disk() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("preview_editor_settings_{suffix}.toml"));
    fs::write(&path, "url_value_limit = 99\n").expect("write settings");

    let settings = load_settings(&path);
    assert_eq!(settings.url_value_limit, 99);

    fs::remove_file(path).expect("cleanup");
}
