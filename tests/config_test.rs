//! Integration tests for configuration loading

use geoenrich::infra::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[provider]
base_url = "https://flows.example.com"
client_id = "media-client"
client_secret = "s3cret"
timeout_ms = 3000

[store]
dataset = "data/sp-points.json"

[resolver]
precision = 5
radius_ladder_m = [25.0, 75.0, 150.0]
fuzzy_offsets_deg = [0.0005]
fuzzy_radius_rungs = 1
rate_delay_ms = 250

[batch]
concurrency = 4
deadline_secs = 60
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.provider_base_url(), "https://flows.example.com");
    assert_eq!(config.provider_client_id(), "media-client");
    assert_eq!(config.provider_timeout(), Duration::from_millis(3000));
    assert_eq!(config.dataset(), "data/sp-points.json");
    assert_eq!(config.precision(), 5);
    assert_eq!(config.concurrency(), 4);

    let resolver = config.resolver_settings();
    assert_eq!(resolver.radius_ladder_m, vec![25.0, 75.0, 150.0]);
    assert_eq!(resolver.fuzzy_offsets_deg, vec![0.0005]);
    assert_eq!(resolver.fuzzy_radius_rungs, 1);
    assert_eq!(resolver.rate_delay, Duration::from_millis(250));

    let batch = config.batch_settings();
    assert_eq!(batch.concurrency, 4);
    assert_eq!(batch.deadline, Some(Duration::from_secs(60)));
}

#[test]
fn test_sections_default_when_omitted() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[provider]
base_url = "https://flows.example.com"
client_id = "c"
client_secret = "s"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.precision(), 6);
    assert_eq!(config.concurrency(), 8);
    assert_eq!(config.resolver_settings().radius_ladder_m.len(), 6);
    assert!(config.batch_settings().deadline.is_none());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.precision(), 6);
    assert_eq!(config.concurrency(), 8);
    assert_eq!(config.config_file(), "default");
}
