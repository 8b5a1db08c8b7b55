use tracing::Level;

use weft::logging::{self, LogConfig};
use weft::{log_error, log_lifecycle, log_protocol, pool_span, unit_span};

#[test]
fn test_default_log_config() {
    let config = LogConfig::default();

    assert_eq!(config.level, Level::INFO);
    assert!(!config.json_format);
    assert!(config.show_time);
    assert!(config.target_filters.is_none());
}

#[test]
fn test_init_is_idempotent() {
    logging::init_test();
    logging::init_default();
    logging::init_production();

    // Macros work with any Display ids once a subscriber is installed
    let span = pool_span!("p-1", operation = "deploy");
    let _entered = span.enter();
    let _unit = unit_span!("u-1");
    log_lifecycle!("u-1", "started");
    log_protocol!("invoke", "sent", call = "c-1");
    log_error!(std::io::Error::other("broken pipe"), unit = "u-1");
}

#[test]
fn test_unwritable_log_file_is_reported() {
    assert!(logging::open_log_file("/nonexistent-dir/weft.log").is_err());
    assert!(logging::init_with_file(LogConfig::default(), "/nonexistent-dir/weft.log").is_err());
}

#[test]
fn test_log_file_is_created_and_appended() -> std::io::Result<()> {
    use std::io::Write;

    let path = std::env::temp_dir().join(format!("weft-{}.log", std::process::id()));
    writeln!(logging::open_log_file(&path)?, "first")?;
    writeln!(logging::open_log_file(&path)?, "second")?;

    assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
    std::fs::remove_file(&path)
}
