//! Configuration file loading.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use mlokit_core::{MlokitConfig, MlokitError};
use std::io::Write;

#[test]
fn load_from_file_reads_all_sections() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[http]
timeout_secs = 20
user_agent = "ops-audit/2.0"
verify_tls = true

[storage]
api_version = "2020-10-02"

[walker]
app_root_depth = 2
space_depth = 5

[vertexai]
export_wait_secs = 45
"#
    )
    .unwrap();

    let config = MlokitConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.http.timeout_secs, 20);
    assert_eq!(config.http.user_agent, "ops-audit/2.0");
    assert!(config.http.verify_tls);
    assert_eq!(config.storage.api_version, "2020-10-02");
    assert_eq!(config.walker.app_root_depth, 2);
    assert_eq!(config.walker.space_depth, 5);
    assert_eq!(config.vertexai.export_wait_secs, 45);
    assert!(config.validate().is_ok());
}

#[test]
fn invalid_toml_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[http\ntimeout_secs = ").unwrap();

    let err = MlokitConfig::load_from_file(file.path()).unwrap_err();
    assert_matches!(err, MlokitError::Config { .. });
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MlokitConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert_matches!(err, MlokitError::Config { .. });
}

#[test]
fn zero_walker_depth_fails_validation() {
    let config = MlokitConfig::from_toml_str("[walker]\nspace_depth = 0\n").unwrap();
    assert_matches!(config.validate(), Err(MlokitError::Config { .. }));
}
