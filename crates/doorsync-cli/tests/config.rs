//! Configuration file loading and secret resolution.

use doorsync_cli::{Config, ConfigError};
use doorsync_directory::{AnySource, DirectorySource};
use rstest::rstest;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn env(name: &str) -> Option<String> {
    match name {
        "DOOR_PW" => Some("from-env".to_string()),
        "HR_TOKEN" => Some("tok".to_string()),
        _ => None,
    }
}

const FULL: &str = r#"
[device]
base_url = "https://10.0.0.5:8443"
username = "sync"
password_env = "DOOR_PW"
dev_index = "ABC"
timeout_secs = 5
page_size = 50
face_library_id = "2"
face_library_type = "staticFD"
valid_begin = "2024-01-01T00:00:00"
valid_end = "2030-12-31T23:59:59"

[directory]
url = "https://hr.example.com/users.json"
token_env = "HR_TOKEN"
timeout_secs = 20

[faces]
enabled = false
staging_dir = "/var/tmp/doorsync"
fetch_timeout_secs = 7
allow_local_paths = true
max_photo_bytes = 2097152

[run]
concurrency = 4
report_path = "report.json"
"#;

#[test]
fn test_load_full_config() {
    let file = write_config(FULL);
    let config = Config::load(file.path()).unwrap();

    let device = config.device_config_with(env).unwrap();
    assert_eq!(device.password, "from-env");
    assert_eq!(device.username, "sync");
    assert_eq!(device.dev_index.as_deref(), Some("ABC"));
    assert_eq!(device.timeout.as_secs(), 5);
    assert_eq!(device.page_size, 50);
    assert_eq!(device.face_library_type, "staticFD");
    assert_eq!(device.valid_end, "2030-12-31T23:59:59");

    let options = config.run_options();
    assert!(!options.faces);
    assert_eq!(options.concurrency, 4);
    assert_eq!(options.staging.dir, Some(PathBuf::from("/var/tmp/doorsync")));
    assert_eq!(config.fetch_config().timeout.as_secs(), 7);
    assert!(config.fetch_config().allow_local_paths);
    assert_eq!(config.fetch_config().max_bytes, 2_097_152);
    assert_eq!(config.run.report_path, Some(PathBuf::from("report.json")));

    let source = config.directory_source_with(env).unwrap();
    assert!(matches!(source, AnySource::Feed(_)));
    assert!(!format!("{source:?}").contains("tok\""));
}

#[test]
fn test_snapshot_source_from_path() {
    let file = write_config(
        r#"
        [device]
        base_url = "http://10.0.0.5"
        username = "admin"
        password = "pw"

        [directory]
        path = "people.json"
        "#,
    );
    let config = Config::load(file.path()).unwrap();
    let source = config.directory_source_with(env).unwrap();

    assert!(matches!(source, AnySource::Snapshot(_)));
    assert!(source.describe().contains("people.json"));
    assert_eq!(config.device_config_with(env).unwrap().password, "pw");

    let fetch = config.fetch_config();
    assert!(!fetch.allow_local_paths);
    assert_eq!(fetch.max_bytes, 10 * 1024 * 1024);
}

#[test]
fn test_missing_password_env() {
    let file = write_config(&FULL.replace("DOOR_PW", "NOT_SET"));
    let config = Config::load(file.path()).unwrap();

    let err = config.device_config_with(env).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv { ref name } if name == "NOT_SET"));
}

#[test]
fn test_missing_token_env() {
    let file = write_config(&FULL.replace("HR_TOKEN", "NOT_SET"));
    let config = Config::load(file.path()).unwrap();

    assert!(matches!(
        config.directory_source_with(env),
        Err(ConfigError::MissingEnv { .. })
    ));
}

#[test]
fn test_missing_file() {
    let err = Config::load(std::path::Path::new("/nonexistent/doorsync.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[device\nbase_url = ");
    assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
}

const DEVICE: &str = r#"
[device]
base_url = "http://10.0.0.5"
username = "admin"
password = "pw"
"#;

#[rstest]
#[case::no_directory("[directory]\n", "path or url")]
#[case::both("[directory]\npath = \"a.json\"\nurl = \"http://x\"\n", "not both")]
#[case::token_without_url("[directory]\npath = \"a.json\"\ntoken_env = \"T\"\n", "token_env")]
#[case::zero_concurrency("[directory]\npath = \"a.json\"\n[run]\nconcurrency = 0\n", "concurrency")]
#[case::zero_max_photo_bytes("[directory]\npath = \"a.json\"\n[faces]\nmax_photo_bytes = 0\n", "max_photo_bytes")]
#[case::zero_fetch_timeout("[directory]\npath = \"a.json\"\n[faces]\nfetch_timeout_secs = 0\n", "fetch_timeout_secs")]
fn test_invalid_config(#[case] rest: &str, #[case] expected: &str) {
    let file = write_config(&format!("{DEVICE}\n{rest}"));
    let err = Config::load(file.path()).unwrap_err();

    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn test_bad_device_url_is_invalid() {
    let file = write_config(
        r#"
        [device]
        base_url = "ftp://10.0.0.5"
        username = "admin"

        [directory]
        path = "a.json"
        "#,
    );
    let config = Config::load(file.path()).unwrap();
    assert!(matches!(config.device_config_with(env), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_bad_feed_url_is_invalid() {
    let file = write_config(&format!("{DEVICE}\n[directory]\nurl = \"ftp://hr.example.com\"\n"));
    let config = Config::load(file.path()).unwrap();
    assert!(matches!(config.directory_source_with(env), Err(ConfigError::Invalid(_))));
}
