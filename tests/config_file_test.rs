//! Loading configuration from TOML files on disk.

use std::io::Write;

use rss_guard::telemetry::LogFormat;
use rss_guard::{AccountingError, GuardConfig};

#[test]
fn loads_full_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
memory_limit = 17179869184
flush_threshold = 262144
log_level = "rss_guard=debug,warn"
log_format = "json"
"#
    )
    .unwrap();

    let config = GuardConfig::from_file(file.path()).unwrap();

    assert_eq!(config.memory_limit, Some(16 * 1024 * 1024 * 1024));
    assert_eq!(config.flush_threshold, 256 * 1024);
    assert_eq!(config.log.level, "rss_guard=debug,warn");
    assert_eq!(config.log.format, LogFormat::Json);
    assert_eq!(config.log.output_path, None);
}

#[test]
fn empty_file_yields_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = GuardConfig::from_file(file.path()).unwrap();
    assert_eq!(config, GuardConfig::default());
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = GuardConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(AccountingError::Config(_))));
}

#[test]
fn malformed_values_are_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "memory_limit = \"a lot\"").unwrap();
    let result = GuardConfig::from_file(file.path());
    assert!(matches!(result, Err(AccountingError::Config(_))));
}
