use clap::Parser;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use wecom_alert::cli::Cli;
use wecom_alert::config::{Config, ConfigError};

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    let path = file.path().to_path_buf();
    test_fn(path);
}

fn cli_for(path: &PathBuf, extra: &[&str]) -> Cli {
    let mut args = vec!["wecom-alert", "--config", path.to_str().unwrap()];
    args.extend_from_slice(extra);
    Cli::try_parse_from(args).unwrap()
}

const MINIMAL: &str = r#"
    [wechat]
    corp_id = "ww-corp"
    corp_secret = "s3cret"
    agent_id = 1000002
"#;

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [server]
        listen_address = "127.0.0.1:9100"
        [queue]
        capacity = 50
        [wechat]
        corp_id = "ww-corp"
        corp_secret = "s3cret"
        agent_id = 1000002
        api_base_url = "http://wecom.internal/cgi-bin"
        to_party = "2|3"
        to_tag = ""
        request_timeout_seconds = 15
        [levels]
        1 = "oncall"
        2 = "team"
        3 = "everyone"
        [dispatch]
        rate_limit_ms = 1500
        retry_backoff_seconds = 10
        token_ttl_seconds = 3600
        [metrics]
        enabled = true
        listen_address = "127.0.0.1:9191"
    "#;

    with_config_file(toml_content, |path| {
        let config = Config::load(&cli_for(&path, &[])).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.listen_address, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.queue.capacity, 50);
        assert_eq!(config.wechat.corp_id, "ww-corp");
        assert_eq!(config.wechat.corp_secret, "s3cret");
        assert_eq!(config.wechat.agent_id, 1000002);
        assert_eq!(config.wechat.api_base_url, "http://wecom.internal/cgi-bin");
        assert_eq!(config.wechat.to_party, "2|3");
        assert_eq!(config.wechat.to_tag, "");
        assert_eq!(config.wechat.request_timeout_seconds, Some(15));
        assert_eq!(config.levels.len(), 3);
        assert_eq!(config.levels.resolve("1"), "oncall");
        assert_eq!(config.levels.resolve("3"), "everyone");
        assert_eq!(config.dispatch.rate_limit_ms, 1500);
        assert_eq!(config.dispatch.retry_backoff_seconds, 10);
        assert_eq!(config.dispatch.token_ttl_seconds, 3600);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_address, "127.0.0.1:9191".parse().unwrap());
    });
}

#[test]
#[serial]
fn test_defaults_fill_unset_values() {
    with_config_file(MINIMAL, |path| {
        let config = Config::load(&cli_for(&path, &[])).unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.listen_address, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.queue.capacity, 1000);
        assert_eq!(config.wechat.api_base_url, "https://qyapi.weixin.qq.com/cgi-bin");
        assert_eq!(config.wechat.request_timeout_seconds, None);
        assert!(config.levels.is_empty());
        assert_eq!(config.dispatch.rate_limit_ms, 1000);
        assert_eq!(config.dispatch.retry_backoff_seconds, 5);
        assert_eq!(config.dispatch.token_ttl_seconds, 7200);
        assert!(!config.metrics.enabled);
    });
}

#[test]
#[serial]
fn test_missing_credentials_are_fatal() {
    let toml_content = r#"
        [wechat]
        corp_id = "ww-corp"
    "#;

    with_config_file(toml_content, |path| {
        let err = Config::load(&cli_for(&path, &[])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::Missing("wechat.corp_secret"))
        );
    });
}

#[test]
#[serial]
fn test_malformed_file_is_fatal() {
    with_config_file("[wechat\ncorp_id = ", |path| {
        assert!(Config::load(&cli_for(&path, &[])).is_err());
    });
}

#[test]
#[serial]
fn test_explicit_missing_file_is_fatal() {
    let cli = Cli::try_parse_from(["wecom-alert", "--config", "/nonexistent/wecom-alert.toml"])
        .unwrap();
    let err = Config::load(&cli).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::FileNotFound(_))
    ));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    with_config_file(MINIMAL, |path| {
        std::env::set_var("WECOM_ALERT_WECHAT__CORP_SECRET", "from-env");
        std::env::set_var("WECOM_ALERT_LEVELS__2", "env-team");
        let result = Config::load(&cli_for(&path, &[]));
        std::env::remove_var("WECOM_ALERT_WECHAT__CORP_SECRET");
        std::env::remove_var("WECOM_ALERT_LEVELS__2");

        let config = result.unwrap();
        assert_eq!(config.wechat.corp_secret, "from-env");
        assert_eq!(config.levels.resolve("2"), "env-team");
    });
}

#[test]
#[serial]
fn test_cli_overrides_file() {
    let toml_content = format!(
        "log_level = \"warn\"\n[server]\nlisten_address = \"0.0.0.0:9000\"\n{}",
        MINIMAL
    );

    with_config_file(&toml_content, |path| {
        let cli = cli_for(
            &path,
            &["--listen", "127.0.0.1:9999", "--log-level", "trace", "--queue-capacity", "7"],
        );
        let config = Config::load(&cli).unwrap();

        assert_eq!(config.server.listen_address, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.queue.capacity, 7);
        assert_eq!(config.wechat.corp_id, "ww-corp");
    });
}
