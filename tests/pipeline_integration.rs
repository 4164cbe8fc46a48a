use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use clashgen::clash::render;
use clashgen::links::{decode_subscription, split_links};
use clashgen::pipeline::build_proxies;
use clashgen::policy::{MockProber, Policy};
use clashgen::record::ProxyKind;
use clashgen::telemetry::Telemetry;

fn sample_feed() -> String {
    let vmess = STANDARD.encode(
        r#"{"ps":"[www.provider.com] SG vmess","add":"vm.example.com","port":"443","id":"8f7c3c6e-97f1-4b9c-a8a8-2f1dcaa27c40","aid":"0","net":"ws","tls":"tls","host":"cdn.example.com","path":"/vm"}"#,
    );
    let ss = STANDARD.encode("aes-256-gcm:pw");
    format!(
        "vmess://{}\n\
         vless://uuid123@vl.example.com:8443?type=ws&security=tls&path=%2Fvl#[www.provider.com] MY vless\n\
         trojan://secret@tr.example.com:443?type=ws&sni=sni.example#SG trojan\n\
         ss://{}@ss.example.com:80#US ss\n\
         vmess://not-valid-base64!!\n\
         wireguard://ignored\n",
        vmess, ss
    )
}

#[test]
fn encoded_feed_to_clash_yaml() {
    let body = STANDARD.encode(sample_feed());
    let links = split_links(&decode_subscription(&body));
    assert_eq!(links.len(), 6);

    let telemetry = Telemetry::new();
    let report = build_proxies(
        &links,
        &Policy::default(),
        &MockProber::default(),
        &telemetry,
    );
    assert_eq!(report.proxies.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.skipped_unknown, 1);

    let kinds: Vec<ProxyKind> = report.proxies.iter().map(|p| p.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ProxyKind::Vmess,
            ProxyKind::Vless,
            ProxyKind::Trojan,
            ProxyKind::Shadowsocks
        ]
    );

    let yaml = render(&report.proxies).expect("render");
    assert!(yaml.starts_with("proxies:"));
    assert!(yaml.contains("type: vmess"));
    assert!(yaml.contains("type: ss"));

    let snap = telemetry.snapshot();
    assert_eq!(snap.lines, 6);
    assert_eq!(snap.accepted, 4);
    assert_eq!(snap.parse_failures, 1);
    assert_eq!(snap.unknown_schemes, 1);
}

#[test]
fn policy_stack_filters_and_overrides() {
    let links = split_links(&sample_feed());
    let policy = Policy {
        server_override: Some("relay.example".to_string()),
        require_websocket: true,
        allowed_ports: Some([443, 8443].into_iter().collect()),
        require_region_tags: Some(vec!["SG".to_string(), "MY".to_string()]),
        name_strip: Some("[www.provider.com]".to_string()),
        relay_tag: Some("relay-out".to_string()),
        ..Policy::default()
    };
    let report = build_proxies(
        &links,
        &policy,
        &MockProber::default(),
        &Telemetry::new(),
    );

    // ss is tcp (dropped), everything retained is ws, in-allow-list,
    // and region tagged
    assert_eq!(report.proxies.len(), 3);
    for proxy in &report.proxies {
        assert_eq!(proxy.server, "relay.example");
        assert!(proxy.transport.is_ws());
        assert!(!proxy.name.contains("[www.provider.com]"));
        assert_eq!(proxy.dialer_proxy.as_deref(), Some("relay-out"));
    }
    assert_eq!(report.proxies[0].name, "SG vmess");
}

#[test]
fn liveness_gate_drops_everything_when_dead() {
    let links = split_links(&sample_feed());
    let policy = Policy {
        require_liveness: true,
        ..Policy::default()
    };
    let telemetry = Telemetry::new();
    let report = build_proxies(&links, &policy, &MockProber { alive: false }, &telemetry);
    assert!(report.proxies.is_empty());
    assert_eq!(report.dropped_by_policy, 4);
    assert_eq!(telemetry.snapshot().probe_failures, 4);
}

#[test]
fn repeated_runs_render_identical_yaml() {
    let links = split_links(&sample_feed());
    let policy = Policy {
        server_override: Some("relay.example".to_string()),
        ..Policy::default()
    };
    let first = build_proxies(&links, &policy, &MockProber::default(), &Telemetry::new());
    let second = build_proxies(&links, &policy, &MockProber::default(), &Telemetry::new());
    assert_eq!(
        render(&first.proxies).expect("render"),
        render(&second.proxies).expect("render")
    );
}
