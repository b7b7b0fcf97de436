use fuzzball::{ClientConfig, MuckError};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fuzzball.toml");

    let config = ClientConfig::load_from_file(&path).unwrap();
    assert_eq!(config, ClientConfig::default());
    assert!(path.exists());

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[timeouts]"));
    assert!(written.contains("banner_attempts = 3"));

    // The created file loads back to the same settings
    assert_eq!(ClientConfig::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_existing_file_overrides_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fuzzball.toml");
    fs::write(
        &path,
        r#"
[server]
host = "muck.example.org"
port = 8889
use_tls = true

[mcp]
packages = ["org-fuzzball-help", "dns-org-mud-moo-simpleedit:1.0:1.0"]

[logging]
level = "debug"
json = true
"#,
    )
    .unwrap();

    let config = ClientConfig::load_from_file(&path).unwrap();
    assert_eq!(config.server.host, "muck.example.org");
    assert_eq!(config.server.port, 8889);
    assert!(config.server.use_tls);
    assert!(!config.server.ignore_tls_cert);
    assert_eq!(config.mcp.packages.len(), 2);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert_eq!(config.terminal.terminal_types, vec!["fuzzball", "ansi"]);
}

#[test]
fn test_invalid_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fuzzball.toml");

    fs::write(&path, "[server\nhost = ").unwrap();
    assert!(matches!(
        ClientConfig::load_from_file(&path),
        Err(MuckError::Configuration(_))
    ));

    fs::write(&path, "[terminal]\nterminal_types = []\n").unwrap();
    assert!(matches!(
        ClientConfig::load_from_file(&path),
        Err(MuckError::Configuration(_))
    ));

    fs::write(&path, "[server]\nhost = \"  \"\n").unwrap();
    assert!(matches!(
        ClientConfig::load_from_file(&path),
        Err(MuckError::Configuration(_))
    ));
}
