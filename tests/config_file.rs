use std::path::Path;

use salesload::{Config, OrphanPolicy, TransactionScope};

#[test]
fn test_shipped_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/salesload.yaml");

    let config = Config::load(&path).unwrap();

    assert_eq!(config.load.batch_size, 10_000);
    assert_eq!(config.load.transaction_scope, TransactionScope::Separate);
    assert_eq!(config.policy.orphans, OrphanPolicy::Abort);
    assert_eq!(config.delimiter_byte().unwrap(), b',');
    assert!(config.database.url.is_none());
}

#[test]
fn test_missing_config_file_is_config_error() {
    let err = Config::load("does/not/exist.yaml").unwrap_err();
    assert!(err.phase().is_none());
    assert!(err.to_string().contains("does/not/exist.yaml"));
}
