use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_without_file_or_env() {
    let settings = resolve_settings(None, no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.gateway_ip(), Some(Ipv4Addr::new(192, 168, 0, 10)));
    assert_eq!(settings.command_timeout(), Duration::from_secs(5));
    assert_eq!(settings.user_agent, "OlympusCameraKit");
}

#[test]
fn file_values_override_defaults() {
    let raw = r#"
        gateway = "10.0.0.2:8080"
        command_timeout_ms = "750"
        live_view_quality = "0640x0480"
        unknown_key = "ignored"
    "#;
    let settings = resolve_settings(Some(raw), no_env);
    assert_eq!(settings.gateway, "10.0.0.2:8080");
    assert_eq!(settings.gateway_ip(), Some(Ipv4Addr::new(10, 0, 0, 2)));
    assert_eq!(settings.command_timeout_ms, 750);
    assert_eq!(settings.live_view_quality, "0640x0480");
    assert_eq!(settings.poll_tick_ms, 50);
}

#[test]
fn env_overrides_file() {
    let raw = "gateway = \"10.0.0.2\"\nproperty_poll_interval_ms = \"900\"";
    let settings = resolve_settings(Some(raw), |name| match name {
        "OLYCAM__GATEWAY" => Some("127.0.0.1:9000".into()),
        "OLYCAM__PROPERTY_POLL_INTERVAL_MS" => Some("not a number".into()),
        _ => None,
    });
    assert_eq!(settings.gateway, "127.0.0.1:9000");
    // Bad numbers keep the previous layer.
    assert_eq!(settings.property_poll_interval_ms, 900);
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let settings = resolve_settings(Some("gateway = ["), no_env);
    assert_eq!(settings.gateway, "192.168.0.10");
}

#[test]
fn host_name_gateway_has_no_ip() {
    let settings = Settings {
        gateway: "camera.local".into(),
        ..Settings::default()
    };
    assert_eq!(settings.gateway_ip(), None);
}

#[test]
fn loads_settings_from_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("olycam_config_test_{suffix}.toml"));
    fs::write(&path, "wifi_poll_interval_ms = \"1500\"\n").expect("write config");

    let settings = load_settings_from(&path);
    assert_eq!(settings.wifi_poll_interval(), Duration::from_millis(1500));

    fs::remove_file(&path).expect("cleanup");
}
