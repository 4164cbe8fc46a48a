use crate::links::{parse_link, ParseError};
use crate::policy::{Policy, Prober};
use crate::record::ProxyRecord;
use crate::telemetry::Telemetry;

#[derive(Debug)]
pub struct LineFailure {
    pub line: String,
    pub error: ParseError,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub proxies: Vec<ProxyRecord>,
    pub failures: Vec<LineFailure>,
    pub skipped_unknown: usize,
    pub dropped_by_policy: usize,
}

/// Walk every line in order: dispatch, parse, filter, collect. A bad
/// line is recorded and skipped; it never aborts the rest of the
/// batch. Survivors keep their input order and duplicates are kept.
pub fn build_proxies(
    lines: &[String],
    policy: &Policy,
    prober: &dyn Prober,
    telemetry: &Telemetry,
) -> BuildReport {
    let mut report = BuildReport::default();
    for line in lines {
        telemetry.record_line();
        let record = match parse_link(line) {
            Ok(record) => {
                telemetry.record_parsed();
                record
            }
            Err(ParseError::UnsupportedScheme) => {
                telemetry.record_unknown_scheme();
                report.skipped_unknown += 1;
                continue;
            }
            Err(error) => {
                telemetry.record_parse_failure(format!("{:?} ({})", error, line));
                report.failures.push(LineFailure {
                    line: line.clone(),
                    error,
                });
                continue;
            }
        };
        match policy.apply(record, prober) {
            Ok(record) => {
                telemetry.record_accepted();
                report.proxies.push(record);
            }
            Err(reason) => {
                telemetry.record_policy_drop(reason);
                report.dropped_by_policy += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MockProber;
    use crate::record::ProxyKind;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn malformed_lines_do_not_abort_the_batch() {
        let input = lines(&[
            "vmess://not-valid-base64!!",
            "vless://uuid123@host.example:443?type=ws&security=tls#Good",
            "trojan://@missing-user.example:443#bad",
        ]);
        let telemetry = Telemetry::new();
        let report = build_proxies(
            &input,
            &Policy::default(),
            &MockProber::default(),
            &telemetry,
        );
        assert_eq!(report.proxies.len(), 1);
        assert_eq!(report.proxies[0].name, "Good");
        assert_eq!(report.failures.len(), 2);
        assert_eq!(telemetry.snapshot().parse_failures, 2);
    }

    #[test]
    fn unknown_schemes_are_skipped_silently() {
        let input = lines(&[
            "vless://uuid123@host.example:443?type=ws&security=tls&host=cdn.example&path=%2Fws#MyNode",
            "garbage-line",
        ]);
        let telemetry = Telemetry::new();
        let report = build_proxies(
            &input,
            &Policy::default(),
            &MockProber::default(),
            &telemetry,
        );
        assert_eq!(report.proxies.len(), 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.skipped_unknown, 1);

        let record = &report.proxies[0];
        assert_eq!(record.kind(), ProxyKind::Vless);
        assert_eq!(record.server, "host.example");
        assert_eq!(record.port, 443);
        assert!(record.tls);
        assert_eq!(record.sni, None);
        assert_eq!(record.name, "MyNode");
    }

    #[test]
    fn output_preserves_input_order_and_duplicates() {
        let link = "trojan://pw@tr.example.com:443#dup";
        let input = lines(&[
            link,
            "vless://uuid123@host.example:443#first",
            link,
        ]);
        let report = build_proxies(
            &input,
            &Policy::default(),
            &MockProber::default(),
            &Telemetry::new(),
        );
        assert_eq!(report.proxies.len(), 3);
        assert_eq!(report.proxies[0].name, "dup");
        assert_eq!(report.proxies[1].name, "first");
        assert_eq!(report.proxies[2], report.proxies[0]);
    }

    #[test]
    fn pipeline_is_deterministic() {
        let input = lines(&[
            "vless://uuid123@host.example:443?type=ws&security=tls#a",
            "trojan://pw@tr.example.com:443#b",
            "garbage",
        ]);
        let policy = Policy {
            server_override: Some("relay.example".to_string()),
            ..Policy::default()
        };
        let first = build_proxies(&input, &policy, &MockProber::default(), &Telemetry::new());
        let second = build_proxies(&input, &policy, &MockProber::default(), &Telemetry::new());
        assert_eq!(first.proxies, second.proxies);
        assert!(first.proxies.iter().all(|p| p.server == "relay.example"));
    }

    #[test]
    fn policy_drops_are_counted() {
        let input = lines(&[
            "vless://uuid123@host.example:80#low",
            "vless://uuid123@host.example:443#ok",
        ]);
        let policy = Policy {
            allowed_ports: Some([443].into_iter().collect()),
            ..Policy::default()
        };
        let telemetry = Telemetry::new();
        let report = build_proxies(&input, &policy, &MockProber::default(), &telemetry);
        assert_eq!(report.proxies.len(), 1);
        assert_eq!(report.dropped_by_policy, 1);
        assert_eq!(telemetry.snapshot().policy_drops, 1);
    }
}
