mod common;

use askgenie::config::{Config, PersistenceBackend};
use common::temp_config_file;
use serial_test::serial;

const ENV_VARS: &[&str] = &[
    "ASKGENIE_ANSWER_ENDPOINT",
    "ASKGENIE_ANSWER_TIMEOUT_SECONDS",
    "ASKGENIE_PERSISTENCE_BACKEND",
    "ASKGENIE_PERSISTENCE_URL",
    "ASKGENIE_API_KEY",
    "ASKGENIE_ACCESS_TOKEN",
    "ASKGENIE_SQLITE_PATH",
    "ASKGENIE_POLICY_LIMIT",
    "ASKGENIE_ENFORCE_QUOTA",
    "ASKGENIE_OWNER_ID",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load("/nonexistent/askgenie/config.yaml").unwrap();
    assert_eq!(config.answer.endpoint, "https://smartgenei.onrender.com/ask");
    assert_eq!(config.quota.policy_limit, 3);
    assert!(config.quota.enforce);
    assert_eq!(config.persistence.backend, PersistenceBackend::Sqlite);
    config.validate().unwrap();
}

#[test]
#[serial]
fn test_file_values_are_read() {
    clear_env();
    let (_dir, path) = temp_config_file(
        r#"
answer:
  endpoint: https://answers.example.com/ask
  include_video: false
quota:
  policy_limit: 5
  enforce: true
chat:
  placeholder_title: Untitled
"#,
    );

    let config = Config::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.answer.endpoint, "https://answers.example.com/ask");
    assert!(!config.answer.include_video);
    assert_eq!(config.answer.timeout_seconds, 60);
    assert_eq!(config.quota.policy_limit, 5);
    assert!(config.quota.enforce);
    assert_eq!(config.chat.placeholder_title, "Untitled");
    assert_eq!(config.chat.title_max_chars, 50);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let (_dir, path) = temp_config_file(
        r#"
quota:
  policy_limit: 5
"#,
    );

    std::env::set_var("ASKGENIE_POLICY_LIMIT", "7");
    std::env::set_var("ASKGENIE_ENFORCE_QUOTA", "false");
    std::env::set_var("ASKGENIE_PERSISTENCE_BACKEND", "rest");
    std::env::set_var("ASKGENIE_PERSISTENCE_URL", "https://db.example.com");
    std::env::set_var("ASKGENIE_ACCESS_TOKEN", "secret");

    let config = Config::load(path.to_str().unwrap()).unwrap();
    clear_env();

    assert_eq!(config.quota.policy_limit, 7);
    assert!(!config.quota.enforce);
    assert_eq!(config.persistence.backend, PersistenceBackend::Rest);
    assert_eq!(
        config.persistence.base_url.as_deref(),
        Some("https://db.example.com")
    );
    assert_eq!(config.persistence.access_token.as_deref(), Some("secret"));
    config.validate().unwrap();
}

#[test]
#[serial]
fn test_invalid_numeric_env_is_ignored() {
    clear_env();
    std::env::set_var("ASKGENIE_ANSWER_TIMEOUT_SECONDS", "soon");
    let config = Config::load("/nonexistent/askgenie/config.yaml").unwrap();
    clear_env();
    assert_eq!(config.answer.timeout_seconds, 60);
}

#[test]
#[serial]
fn test_rest_backend_without_url_fails_validation() {
    clear_env();
    std::env::set_var("ASKGENIE_PERSISTENCE_BACKEND", "rest");
    let config = Config::load("/nonexistent/askgenie/config.yaml").unwrap();
    clear_env();
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_access_token_is_not_serialized() {
    clear_env();
    let mut config = Config::default();
    config.persistence.access_token = Some("secret".to_string());
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(!yaml.contains("secret"));
}
