use std::env;
use std::fs;
use std::thread;

use clashgen::clash::render;
use clashgen::config::{parse_config, GenConfig};
use clashgen::fetch::fetch_source;
use clashgen::links::{decode_subscription, split_links};
use clashgen::pipeline::build_proxies;
use clashgen::policy::TcpProber;
use clashgen::telemetry::Telemetry;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<String> = None;
    let mut once = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("missing value for --config");
                    std::process::exit(1);
                }
                config_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--once" => once = true,
            _ => {}
        }
        i += 1;
    }

    let path = match config_path {
        Some(p) => p,
        None => {
            eprintln!("usage: clashgend --config <cfg.yaml> [--once]");
            std::process::exit(1);
        }
    };

    let telemetry = Telemetry::new();
    loop {
        // the config file is re-read each cycle so edits take effect
        // without a restart
        let config = match load_config(&path) {
            Some(c) => c,
            None if once => std::process::exit(1),
            None => {
                thread::sleep(std::time::Duration::from_secs(30));
                continue;
            }
        };

        let code = run_generation(&config, &telemetry);
        if once {
            std::process::exit(code);
        }
        thread::sleep(config.interval());
    }
}

fn load_config(path: &str) -> Option<GenConfig> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("failed to read config {}: {}", path, err);
            return None;
        }
    };
    match parse_config(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            eprintln!("invalid config: {:?}", err);
            None
        }
    }
}

fn run_generation(config: &GenConfig, telemetry: &Telemetry) -> i32 {
    let mut all_links: Vec<String> = Vec::new();
    let mut fetched = 0usize;

    for source in &config.sources {
        println!("[*] fetching: {}", source);
        match fetch_source(source, config.fetch_timeout()) {
            Ok(body) => {
                let decoded = decode_subscription(&body);
                all_links.extend(split_links(&decoded));
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
    let report = build_proxies(&all_links, &policy, &TcpProber, telemetry);
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

    println!(
        "[*] {} proxies written to {} ({} dropped by policy)",
        report.proxies.len(),
        config.output,
        report.dropped_by_policy
    );
    0
}
