//! Loading `ReindexConfig` from YAML files.

use es_reindex::{Endpoint, ReindexConfig};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reindex.yaml");
    fs::write(
        &path,
        r#"
source:
  url: http://old:9200/
  index: products
destination:
  url: https://new:9243
  index: products_v2
options:
  frame_size: 2000
  update_existing: true
  scroll_keep_alive: 5m
  verify_timeout_secs: 120
  request_timeout_secs: 30
  retry:
    max_retries: 50
    initial_delay_ms: 250
    max_delay_ms: 30000
"#,
    )
    .unwrap();

    let config = ReindexConfig::from_file(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.source.url, "http://old:9200");
    assert_eq!(config.destination, Endpoint::new("https://new:9243", "products_v2"));
    assert_eq!(config.options.frame_size, 2000);
    assert!(config.options.update_existing);
    assert!(!config.options.remove_destination);
    assert_eq!(config.options.scroll_keep_alive, "5m");
    assert_eq!(config.options.verify_timeout(), Duration::from_secs(120));
    assert_eq!(config.options.verify_interval(), Duration::from_secs(1));
    assert_eq!(config.options.request_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.options.retry.max_retries, Some(50));
    assert_eq!(config.options.retry.initial_delay, Duration::from_millis(250));
    assert_eq!(config.options.retry.max_delay, Duration::from_secs(30));
    assert!(config.options.retry.add_jitter);
}

#[test]
fn test_minimal_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reindex.yaml");
    fs::write(
        &path,
        "source: {url: 'http://127.0.0.1:9200', index: a}\ndestination: {url: 'http://127.0.0.1:9200', index: b}\n",
    )
    .unwrap();

    let config = ReindexConfig::from_file(&path).unwrap();

    assert_eq!(config.options.frame_size, 1000);
    assert_eq!(config.options.scroll_keep_alive, "10m");
    assert_eq!(config.options.retry.max_retries, None);
    assert_eq!(
        config.describe_plan(),
        "Copying 'http://127.0.0.1:9200/a' to 'http://127.0.0.1:9200/b'."
    );
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reindex.yaml");
    fs::write(&path, "source: [not, an, endpoint]\n").unwrap();

    let err = ReindexConfig::from_file(&path).unwrap_err();

    assert_eq!(err.code(), "REINDEX-006");
}
