#[path = "../core/record.rs"]
pub mod record;

#[path = "../core/links.rs"]
pub mod links;

#[path = "../core/policy.rs"]
pub mod policy;

#[path = "../core/pipeline.rs"]
pub mod pipeline;

#[path = "../core/clash.rs"]
pub mod clash;

#[path = "../core/config.rs"]
pub mod config;

#[path = "../core/fetch.rs"]
pub mod fetch;

#[path = "../core/telemetry.rs"]
pub mod telemetry;
