//! Integration tests for loading and validating JSON config files.

use std::path::Path;

use weeproxy::breaker::Thresholds;
use weeproxy::config::model::Config;
use weeproxy::config::validation::{backend_warnings, validate};
use weeproxy::config::{load_file, parse_config_str, ConfigVersion};
use weeproxy::error::WeeproxyError;

fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("weeproxy-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn sample_config_loads_and_validates() {
    let (config, version) = load_file(Path::new("sample-config.json"), " ")
        .await
        .unwrap();

    assert_eq!(config.url_proxy.len(), 2);
    assert_eq!(config.total_backends(" "), 3);
    assert_eq!(config.thresholds(), Thresholds::new(7000, 100));
    assert_eq!(
        config.listen_addr(None).unwrap().to_string(),
        "0.0.0.0:8080"
    );
    let ConfigVersion(hash) = version;
    assert_eq!(hash.len(), 64);
}

#[test]
fn minimal_config_uses_defaults() {
    let config = parse_config_str(r#"{"url-proxy": {"/": "http://b1"}}"#, "min.json").unwrap();
    validate(&config, " ").unwrap();
    assert_eq!(config.thresholds(), Thresholds::default());
    assert_eq!(
        config.listen_addr(None).unwrap().to_string(),
        "0.0.0.0:8080"
    );
}

#[test]
fn unparsable_thresholds_fall_back_to_defaults() {
    let config = parse_config_str(
        r#"{"server": {"max-req-per-sec": "lots", "max-err-per-sec": "3"},
            "url-proxy": {"/": "http://b1"}}"#,
        "t.json",
    )
    .unwrap();
    assert_eq!(config.thresholds(), Thresholds::new(7000, 3));
}

#[test]
fn custom_separator_splits_backends() {
    let config = parse_config_str(
        r#"{"url-proxy": {"/": "http://b1,http://b2, http://b3"}}"#,
        "sep.json",
    )
    .unwrap();
    validate(&config, ",").unwrap();
    assert_eq!(config.total_backends(","), 3);
}

#[test]
fn invalid_config_reports_every_problem() {
    let config: Config = parse_config_str(
        r#"{"url-proxy": {"api": "http://b1", "/empty": " "},
            "custom-headers": {"bad header": "x"}}"#,
        "bad.json",
    )
    .unwrap();
    let errors = validate(&config, " ").unwrap_err();
    assert_eq!(errors.len(), 3, "got {errors:?}");
}

#[tokio::test]
async fn non_url_backends_are_tolerated() {
    let path = write_temp(
        "raw.json",
        r#"{"url-proxy": {"/": "http://good b1:9000 ftp://files"}}"#,
    );
    let (config, _) = load_file(&path, " ").await.unwrap();

    assert_eq!(config.total_backends(" "), 3);
    let warnings = backend_warnings(&config, " ");
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.field == "backend"));
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = parse_config_str(
        r#"{"url-proxy": {"/": "http://b1"}, "metrics": {}}"#,
        "extra.json",
    )
    .unwrap_err();
    assert!(matches!(err, WeeproxyError::ConfigParse { .. }));
}

#[tokio::test]
async fn load_file_rejects_invalid_config() {
    let path = write_temp("invalid.json", r#"{"url-proxy": {}}"#);
    let err = load_file(&path, " ").await.unwrap_err();
    assert!(matches!(err, WeeproxyError::ConfigValidation { .. }));
}

#[tokio::test]
async fn version_changes_with_content() {
    let a = write_temp("a.json", r#"{"url-proxy": {"/": "http://b1"}}"#);
    let b = write_temp("b.json", r#"{"url-proxy": {"/": "http://b2"}}"#);
    let (_, va) = load_file(&a, " ").await.unwrap();
    let (_, vb) = load_file(&b, " ").await.unwrap();
    assert_ne!(va, vb);
}
