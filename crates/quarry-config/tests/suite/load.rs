use std::path::PathBuf;

use pretty_assertions::assert_eq;
use quarry_config::{ConfigError, QuarryConfig};

#[test]
fn loads_full_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join(quarry_config::QUARRY_CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
local_repository = "/srv/m2"
strict_validation = true

[[repositories]]
id = "corp"
url = "https://nexus.corp.example/repository/maven-public"
username = "ci"
password = "token"

[[repositories]]
id = "central"
url = "https://repo1.maven.org/maven2/"

[retry]
initial_delay_ms = 250
backoff_limit_ms = 1000
max_attempts = 5

[proxy.properties]
"https.proxyUser" = "builder"
"https.proxyPassword" = "secret"

[profiles]
jdk = "17"
os_family = "unix"

[profiles.properties]
env = "ci"

[logging]
level = "debug"
json = true
"#,
    )
    .unwrap();

    let config = QuarryConfig::load_from_path(&path).unwrap();
    assert_eq!(config.local_repository, Some(PathBuf::from("/srv/m2")));
    assert!(config.strict_validation);
    assert!(!config.offline);

    let repos = config.remote_repositories().unwrap();
    assert_eq!(
        repos.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["corp", "central"]
    );
    assert_eq!(
        repos[0].url().as_str(),
        "https://nexus.corp.example/repository/maven-public/"
    );
    assert_eq!(repos[0].authentication.as_ref().unwrap().username, "ci");

    let retry = config.retry_policy().unwrap();
    assert_eq!(retry.max_attempts(), 5);
    assert_eq!(config.proxy.properties["https.proxyUser"], "builder");
    assert_eq!(config.profiles.jdk.as_deref(), Some("17"));
    assert_eq!(config.profiles.properties["env"], "ci");
    assert!(config.logging.json);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = QuarryConfig::load_from_str("offlne = true").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)), "{err}");
}

#[test]
fn missing_file_is_an_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = QuarryConfig::load_from_path(tmp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "{err}");
}
