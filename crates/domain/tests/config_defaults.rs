use cc_domain::config::{Config, ConfigSeverity};

#[test]
fn default_bind_is_all_interfaces() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
}

#[test]
fn default_min_interval_derives_from_rpm() {
    let config = Config::default();
    // 30 rpm -> 2000ms spacing + 400ms headroom, floored at 2800ms.
    assert_eq!(config.model.rpm_limit, 30);
    assert_eq!(config.model.min_interval_ms(), 2_800);
}

#[test]
fn slow_rpm_raises_min_interval() {
    let mut config = Config::default();
    config.model.rpm_limit = 7;
    // ceil(60000 / 7) = 8572, + 400.
    assert_eq!(config.model.min_interval_ms(), 8_972);
}

#[test]
fn explicit_min_interval_wins() {
    let mut config = Config::default();
    config.model.min_interval_ms = Some(1_000);
    assert_eq!(config.model.min_interval_ms(), 1_000);
}

#[test]
fn transcript_limit_clamps() {
    let mut config = Config::default();
    config.live.transcript_limit = 9_999;
    assert_eq!(config.live.clamped_transcript_limit(), 500);
    config.live.transcript_limit = 0;
    assert_eq!(config.live.clamped_transcript_limit(), 1);
}

#[test]
fn zero_rpm_is_a_validation_error() {
    let mut config = Config::default();
    config.model.rpm_limit = 0;
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field == "model.rpm_limit"));
}

#[test]
fn skip_signature_validation_warns() {
    let mut config = Config::default();
    config.provider.skip_signature_validation = true;
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning
            && i.field == "provider.skip_signature_validation"));
}

#[test]
fn explicit_config_parses_from_json() {
    let config: Config = serde_json::from_str(
        r#"{
            "server": { "host": "127.0.0.1", "port": 3210 },
            "model": { "rpm_limit": 10 }
        }"#,
    )
    .unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3210);
    assert_eq!(config.model.rpm_limit, 10);
}
