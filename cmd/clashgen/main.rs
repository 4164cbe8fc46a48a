use std::env;
use std::fs;

use serde::Serialize;

use clashgen::clash::render;
use clashgen::config::{parse_config, validate_config, GenConfig, PolicyConfig};
use clashgen::fetch::fetch_source;
use clashgen::links::{decode_subscription, parse_link, split_links};
use clashgen::pipeline::build_proxies;
use clashgen::policy::TcpProber;
use clashgen::telemetry::Telemetry;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "gen" => handle_gen(&args),
        "lint" => handle_lint(&args),
        _ => {
            print_help();
            std::process::exit(1);
        }
    }
}

fn handle_gen(args: &[String]) {
    let mut sources: Vec<String> = Vec::new();
    let mut config_path: Option<String> = None;
    let mut output: Option<String> = None;
    let mut fetch_timeout_secs: Option<u64> = None;
    let mut policy = PolicyConfig::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => config_path = Some(take_value(args, &mut i, "--config")),
            "--url" => sources.push(take_value(args, &mut i, "--url")),
            "--url-file" => {
                let path = take_value(args, &mut i, "--url-file");
                let content = match fs::read_to_string(&path) {
                    Ok(c) => c,
                    Err(err) => {
                        eprintln!("failed to read {}: {}", path, err);
                        std::process::exit(1);
                    }
                };
                for line in content.lines() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    sources.push(trimmed.to_string());
                }
            }
            "--output" => output = Some(take_value(args, &mut i, "--output")),
            "--fetch-timeout" => {
                fetch_timeout_secs = Some(take_number(args, &mut i, "--fetch-timeout"))
            }
            "--server-override" => {
                policy.server_override = Some(take_value(args, &mut i, "--server-override"))
            }
            "--ws-only" => policy.require_websocket = true,
            "--ports" => {
                let value = take_value(args, &mut i, "--ports");
                policy.allowed_ports = Some(parse_port_list(&value));
            }
            "--regions" => {
                let value = take_value(args, &mut i, "--regions");
                policy.require_region_tags = Some(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "--check-alive" => policy.require_liveness = true,
            "--probe-timeout-ms" => {
                policy.probe_timeout_ms = take_number(args, &mut i, "--probe-timeout-ms")
            }
            "--strip-name" => policy.name_strip = Some(take_value(args, &mut i, "--strip-name")),
            "--relay-tag" => policy.relay_tag = Some(take_value(args, &mut i, "--relay-tag")),
            other => {
                eprintln!("unknown flag: {}", other);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(err) => {
                    eprintln!("failed to read config {}: {}", path, err);
                    std::process::exit(1);
                }
            };
            match parse_config(&content) {
                Ok(c) => c,
                Err(err) => {
                    eprintln!("invalid config: {:?}", err);
                    std::process::exit(1);
                }
            }
        }
        None => {
            if sources.is_empty() {
                eprintln!(
                    "usage: clashgen gen (--config <cfg.yaml> | --url <sub-url-or-file> [--url ...] [--url-file <list>]) [--output proxies.yaml] [policy flags]"
                );
                std::process::exit(1);
            }
            GenConfig {
                sources: Vec::new(),
                output: "proxies.yaml".to_string(),
                interval_secs: 3600,
                fetch_timeout_secs: 10,
                policy: PolicyConfig::default(),
            }
        }
    };

    // command-line values win over the config file
    if !sources.is_empty() {
        config.sources = sources;
    }
    if let Some(output) = output {
        config.output = output;
    }
    if let Some(secs) = fetch_timeout_secs {
        config.fetch_timeout_secs = secs;
    }
    merge_policy(&mut config.policy, policy);

    if let Err(err) = validate_config(&config) {
        eprintln!("invalid configuration: {:?}", err);
        std::process::exit(1);
    }

    std::process::exit(run_generation(&config));
}

fn merge_policy(base: &mut PolicyConfig, cli: PolicyConfig) {
    if cli.server_override.is_some() {
        base.server_override = cli.server_override;
    }
    if cli.require_websocket {
        base.require_websocket = true;
    }
    if cli.allowed_ports.is_some() {
        base.allowed_ports = cli.allowed_ports;
    }
    if cli.require_region_tags.is_some() {
        base.require_region_tags = cli.require_region_tags;
    }
    if cli.require_liveness {
        base.require_liveness = true;
    }
    if cli.probe_timeout_ms != PolicyConfig::default().probe_timeout_ms {
        base.probe_timeout_ms = cli.probe_timeout_ms;
    }
    if cli.name_strip.is_some() {
        base.name_strip = cli.name_strip;
    }
    if cli.relay_tag.is_some() {
        base.relay_tag = cli.relay_tag;
    }
}

fn run_generation(config: &GenConfig) -> i32 {
    let telemetry = Telemetry::new();
    let mut all_links: Vec<String> = Vec::new();
    let mut fetched = 0usize;

    for source in &config.sources {
        println!("[*] fetching: {}", source);
        match fetch_source(source, config.fetch_timeout()) {
            Ok(body) => {
                let decoded = decode_subscription(&body);
                let links = split_links(&decoded);
                println!("[*] {} links from {}", links.len(), source);
                all_links.extend(links);
                fetched += 1;
            }
            Err(err) => {
                eprintln!("failed to fetch {}: {:?}", source, err);
            }
        }
    }

    if fetched == 0 {
        eprintln!("no subscription source could be fetched");
        return 1;
    }

    let policy = config.policy.to_policy();
    let report = build_proxies(&all_links, &policy, &TcpProber, &telemetry);
    for failure in &report.failures {
        eprintln!("skipping line {:?}: {:?}", failure.line, failure.error);
    }

    let yaml = match render(&report.proxies) {
        Ok(yaml) => yaml,
        Err(err) => {
            eprintln!("failed to render proxies: {:?}", err);
            return 1;
        }
    };
    if let Err(err) = fs::write(&config.output, yaml) {
        eprintln!("failed to write {}: {}", config.output, err);
        return 1;
    }

    let snap = telemetry.snapshot();
    println!(
        "[*] {} proxies written to {} ({} lines, {} parse failures, {} dropped by policy)",
        report.proxies.len(),
        config.output,
        snap.lines,
        snap.parse_failures,
        report.dropped_by_policy
    );
    0
}

fn handle_lint(args: &[String]) {
    if args.len() < 3 {
        eprintln!("usage: clashgen lint <subscription.txt> [--json]");
        std::process::exit(1);
    }
    let path = &args[2];
    let json = args.iter().any(|arg| arg == "--json");
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => {
            report_lint(
                json,
                path,
                LintCounts::default(),
                Some(format!("failed to read {}: {}", path, err)),
            );
            std::process::exit(1);
        }
    };

    let decoded = decode_subscription(&content);
    let links = split_links(&decoded);
    let mut counts = LintCounts {
        links: links.len(),
        ..LintCounts::default()
    };

    for line in &links {
        match parse_link(line) {
            Ok(_) => counts.parsed += 1,
            Err(err) if err.is_unsupported() => counts.unknown += 1,
            Err(err) => {
                counts.failed += 1;
                if !json {
                    eprintln!("bad line {:?}: {:?}", line, err);
                }
            }
        }
    }

    let ok = counts.failed == 0 && counts.parsed > 0;
    report_lint(json, path, counts, None);
    if !ok {
        std::process::exit(1);
    }
}

#[derive(Default, Clone, Copy)]
struct LintCounts {
    links: usize,
    parsed: usize,
    unknown: usize,
    failed: usize,
}

#[derive(Serialize)]
struct LintResponse {
    ok: bool,
    path: String,
    links: usize,
    parsed: usize,
    unknown: usize,
    failed: usize,
    error: Option<String>,
}

fn report_lint(json: bool, path: &str, counts: LintCounts, error: Option<String>) {
    let ok = counts.failed == 0 && counts.parsed > 0 && error.is_none();
    if json {
        let payload = LintResponse {
            ok,
            path: path.to_string(),
            links: counts.links,
            parsed: counts.parsed,
            unknown: counts.unknown,
            failed: counts.failed,
            error,
        };
        let out = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
        println!("{}", out);
    } else if let Some(error) = error {
        eprintln!("{}", error);
    } else if ok {
        println!(
            "lint ok: {} ({} links, {} parsed, {} unknown)",
            path, counts.links, counts.parsed, counts.unknown
        );
    } else {
        eprintln!(
            "lint failed: {} ({} links, {} parsed, {} unknown, {} failed)",
            path, counts.links, counts.parsed, counts.unknown, counts.failed
        );
    }
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> String {
    if *i + 1 >= args.len() {
        eprintln!("missing value for {}", flag);
        std::process::exit(1);
    }
    *i += 1;
    args[*i].clone()
}

fn take_number(args: &[String], i: &mut usize, flag: &str) -> u64 {
    let value = take_value(args, i, flag);
    match value.parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("invalid value for {}: {}", flag, value);
            std::process::exit(1);
        }
    }
}

fn parse_port_list(value: &str) -> Vec<u16> {
    let mut ports = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<u16>() {
            Ok(port) => ports.push(port),
            Err(_) => {
                eprintln!("invalid port: {}", token);
                std::process::exit(1);
            }
        }
    }
    ports
}

fn print_help() {
    eprintln!("usage:");
    eprintln!("  clashgen gen (--config <cfg.yaml> | --url <sub-url-or-file> [--url ...] [--url-file <list>])");
    eprintln!("               [--output proxies.yaml] [--fetch-timeout <secs>]");
    eprintln!("               [--server-override <host>] [--ws-only] [--ports 443,8443]");
    eprintln!("               [--regions SG,MY] [--check-alive] [--probe-timeout-ms <n>]");
    eprintln!("               [--strip-name <substring>] [--relay-tag <name>]");
    eprintln!("  clashgen lint <subscription.txt> [--json]");
}
