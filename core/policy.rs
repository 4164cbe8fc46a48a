use std::collections::HashSet;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::record::ProxyRecord;

/// Deployment policy applied to every parsed record, independent of
/// scheme. All predicates are optional and composable; the liveness
/// probe runs last because it is the only expensive check.
#[derive(Debug, Clone)]
pub struct Policy {
    pub server_override: Option<String>,
    pub require_websocket: bool,
    pub allowed_ports: Option<HashSet<u16>>,
    pub require_region_tags: Option<Vec<String>>,
    pub require_liveness: bool,
    pub probe_timeout: Duration,
    pub name_strip: Option<String>,
    pub relay_tag: Option<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            server_override: None,
            require_websocket: false,
            allowed_ports: None,
            require_region_tags: None,
            require_liveness: false,
            probe_timeout: Duration::from_millis(1500),
            name_strip: None,
            relay_tag: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Transport,
    Port,
    Region,
    Unreachable,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Transport => "transport",
            DropReason::Port => "port",
            DropReason::Region => "region",
            DropReason::Unreachable => "unreachable",
        }
    }
}

pub trait Prober {
    fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

#[derive(Debug, Default)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(_) => return false,
        };
        for addr in addrs {
            if TcpStream::connect_timeout(&addr, timeout).is_ok() {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Default)]
pub struct MockProber {
    pub alive: bool,
}

impl Prober for MockProber {
    fn probe(&self, _host: &str, _port: u16, _timeout: Duration) -> bool {
        self.alive
    }
}

impl Policy {
    /// Returns the (possibly overridden) record, or the reason it was
    /// rejected. A rejection is a normal outcome, not an error.
    pub fn apply(
        &self,
        mut record: ProxyRecord,
        prober: &dyn Prober,
    ) -> Result<ProxyRecord, DropReason> {
        if self.require_websocket && !record.transport.is_ws() {
            return Err(DropReason::Transport);
        }
        if let Some(ref ports) = self.allowed_ports {
            if !ports.contains(&record.port) {
                return Err(DropReason::Port);
            }
        }
        if let Some(ref tags) = self.require_region_tags {
            if !name_has_region(&record.name, tags) {
                return Err(DropReason::Region);
            }
        }
        // probe the parsed address, before any override redirects it
        if self.require_liveness && !prober.probe(&record.server, record.port, self.probe_timeout) {
            return Err(DropReason::Unreachable);
        }

        if let Some(ref strip) = self.name_strip {
            record.name = record.name.replace(strip.as_str(), "").trim().to_string();
        }
        if let Some(ref server) = self.server_override {
            record.server = server.clone();
        }
        if let Some(ref tag) = self.relay_tag {
            record.dialer_proxy = Some(tag.clone());
        }
        Ok(record)
    }
}

// Tag must appear in the upper-cased name with a non-alphanumeric
// boundary on at least one side, so "SG" matches "[SG] node" and
// "node-SG" but not "MSG".
fn name_has_region(name: &str, tags: &[String]) -> bool {
    let upper = name.to_uppercase();
    for tag in tags {
        let tag = tag.trim().to_uppercase();
        if tag.is_empty() {
            continue;
        }
        let mut start = 0;
        while let Some(pos) = upper[start..].find(&tag) {
            let at = start + pos;
            let end = at + tag.len();
            let before_ok = upper[..at]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_ascii_alphanumeric());
            let after_ok = upper[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_ascii_alphanumeric());
            if before_ok || after_ok {
                return true;
            }
            start = end;
        }
    }
    false
}
