//! Configuration Loading Tests
//!
//! YAML loading, `${VAR}` expansion and the hosting environment's overrides.
//! Tests touching process environment run serially.

use aad_gateway::config::{Config, ConfigError};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

const OVERRIDE_VARS: [&str; 3] = ["AUDIENCES", "AAD_TENANT_NAME", "FUNCTIONS_CUSTOMHANDLER_PORT"];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_load_full_config() {
    clear_overrides();
    let file = write_config(
        r#"
server:
  address: "127.0.0.1:8080"
auth:
  tenant_id: "contoso"
  audience: "api://gateway"
  leeway_secs: 30
  jwks:
    authority: "http://127.0.0.1:9999"
    cache_ttl_secs: 0
    min_refresh_interval_secs: 10
    timeout_secs: 2
cors:
  allow_origin: "https://app.example.com"
metrics:
  enabled: false
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.server.address, "127.0.0.1:8080");
    assert_eq!(config.auth.leeway_secs, 30);
    assert_eq!(config.auth.jwks.cache_ttl_secs, 0);
    assert_eq!(config.cors.allow_origin, "https://app.example.com");
    assert!(!config.metrics.enabled);
    assert_eq!(
        config.auth.jwks_url(),
        "http://127.0.0.1:9999/contoso/discovery/v2.0/keys"
    );
}

#[test]
#[serial]
fn test_load_minimal_config_uses_defaults() {
    clear_overrides();
    let file = write_config(
        r#"
auth:
  tenant_id: "contoso"
  audience: "api://gateway"
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.server.address, "0.0.0.0:5000");
    assert_eq!(config.auth.jwks.authority, "https://login.microsoftonline.com");
    assert_eq!(config.auth.jwks.cache_ttl_secs, 300);
    assert_eq!(config.auth.issuer(), "https://sts.windows.net/contoso/");
}

#[test]
#[serial]
fn test_env_var_expansion() {
    clear_overrides();
    std::env::set_var("GATEWAY_TEST_TENANT", "fabrikam");
    let file = write_config(
        r#"
auth:
  tenant_id: "${GATEWAY_TEST_TENANT}"
  audience: "${GATEWAY_TEST_AUDIENCE:-api://default}"
"#,
    );

    let config = Config::load(file.path()).unwrap();
    std::env::remove_var("GATEWAY_TEST_TENANT");

    assert_eq!(config.auth.tenant_id, "fabrikam");
    assert_eq!(config.auth.audience, "api://default");
}

#[test]
#[serial]
fn test_unset_variable_without_default_is_rejected() {
    clear_overrides();
    std::env::remove_var("GATEWAY_UNSET_TENANT");
    let file = write_config(
        r#"
auth:
  tenant_id: "${GATEWAY_UNSET_TENANT}"
  audience: "api://gateway"
"#,
    );

    let err = Config::load(file.path()).unwrap_err();
    assert!(
        matches!(&err, ConfigError::ValidationError(msg) if msg.contains("GATEWAY_UNSET_TENANT")),
        "Expected validation error naming the variable, got {:?}",
        err
    );
}

#[test]
#[serial]
fn test_hosting_overrides_win_over_file() {
    clear_overrides();
    std::env::set_var("AUDIENCES", "api://from-env");
    std::env::set_var("AAD_TENANT_NAME", "env-tenant");
    std::env::set_var("FUNCTIONS_CUSTOMHANDLER_PORT", "7071");
    let file = write_config(
        r#"
auth:
  tenant_id: "file-tenant"
  audience: "api://from-file"
"#,
    );

    let result = Config::load(file.path());
    clear_overrides();
    let config = result.unwrap();

    assert_eq!(config.auth.audience, "api://from-env");
    assert_eq!(config.auth.tenant_id, "env-tenant");
    assert_eq!(config.server.address, "0.0.0.0:7071");
}

#[test]
#[serial]
fn test_from_env() {
    clear_overrides();
    std::env::set_var("AUDIENCES", "api://from-env");
    std::env::set_var("AAD_TENANT_NAME", "env-tenant");
    std::env::set_var("AAD_GATEWAY__AUTH__LEEWAY_SECS", "15");

    let result = Config::from_env();
    clear_overrides();
    std::env::remove_var("AAD_GATEWAY__AUTH__LEEWAY_SECS");
    let config = result.unwrap();

    assert_eq!(config.auth.audience, "api://from-env");
    assert_eq!(config.auth.tenant_id, "env-tenant");
    assert_eq!(config.auth.leeway_secs, 15);
    assert_eq!(config.server.address, "0.0.0.0:5000");
}

#[test]
#[serial]
fn test_from_env_requires_tenant() {
    clear_overrides();
    std::env::set_var("AUDIENCES", "api://from-env");

    let result = Config::from_env();
    clear_overrides();

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
#[serial]
fn test_invalid_yaml() {
    clear_overrides();
    let file = write_config("auth: [unclosed");
    assert!(matches!(
        Config::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        Config::load("/nonexistent/gateway.yaml"),
        Err(ConfigError::IoError(_))
    ));
}
