use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;
use url::Url;

use crate::record::{Credential, ProxyRecord, Transport, WsOptions};

#[derive(Debug)]
pub enum ParseError {
    UnsupportedScheme,
    Decode(String),
    Parse(String),
}

impl ParseError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ParseError::UnsupportedScheme)
    }
}

/// Try to base64-decode the whole subscription body; feeds that are
/// already plain text come back unchanged. Never fails.
pub fn decode_subscription(raw: &str) -> String {
    match decode_base64(raw.trim()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => raw.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

pub fn split_links(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Dispatch on the exact scheme prefix. Lines with any other prefix
/// report `UnsupportedScheme`, which callers skip silently.
pub fn parse_link(line: &str) -> Result<ProxyRecord, ParseError> {
    if let Some(rest) = line.strip_prefix("vmess://") {
        parse_vmess(rest)
    } else if line.starts_with("vless://") {
        parse_vless(line)
    } else if line.starts_with("trojan://") {
        parse_trojan(line)
    } else if let Some(rest) = line.strip_prefix("ss://") {
        parse_shadowsocks(rest)
    } else {
        Err(ParseError::UnsupportedScheme)
    }
}

#[derive(Debug, Deserialize)]
struct VmessLink {
    #[serde(default)]
    ps: Option<String>,
    #[serde(default)]
    add: String,
    #[serde(default)]
    port: Option<NumberOrText>,
    #[serde(default)]
    id: String,
    #[serde(default)]
    aid: Option<NumberOrText>,
    #[serde(default)]
    net: Option<String>,
    #[serde(default)]
    tls: Option<String>,
    #[serde(default)]
    sni: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

// Subscription generators emit "port": 443 and "port": "443"
// interchangeably; the same goes for "aid".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn as_u64(&self) -> Option<u64> {
        match self {
            NumberOrText::Number(n) if *n >= 0 => Some(*n as u64),
            NumberOrText::Number(_) => None,
            NumberOrText::Text(s) => s.trim().parse::<u64>().ok(),
        }
    }
}

fn parse_vmess(encoded: &str) -> Result<ProxyRecord, ParseError> {
    if encoded.trim().is_empty() {
        return Err(ParseError::Decode("vmess link missing payload".to_string()));
    }
    let decoded = decode_base64(encoded).map_err(ParseError::Decode)?;
    let link: VmessLink =
        serde_json::from_slice(&decoded).map_err(|e| ParseError::Parse(e.to_string()))?;

    if link.add.trim().is_empty() {
        return Err(ParseError::Parse("vmess missing server".to_string()));
    }
    if link.id.trim().is_empty() {
        return Err(ParseError::Parse("vmess missing uuid".to_string()));
    }
    let port = link
        .port
        .as_ref()
        .and_then(NumberOrText::as_u64)
        .filter(|p| (1..=65535).contains(p))
        .ok_or_else(|| ParseError::Parse("invalid vmess port".to_string()))? as u16;
    let alter_id = link
        .aid
        .as_ref()
        .and_then(NumberOrText::as_u64)
        .unwrap_or(0) as u32;

    let transport = Transport::from_net(link.net.as_deref().unwrap_or("tcp"));
    let ws = if transport.is_ws() {
        Some(WsOptions {
            path: link.path.clone().unwrap_or_else(|| "/".to_string()),
            host: link.host.clone().unwrap_or_default(),
        })
    } else {
        None
    };
    let sni = link
        .sni
        .clone()
        .or_else(|| link.host.clone())
        .filter(|s| !s.is_empty());

    Ok(ProxyRecord {
        name: fallback_name(link.ps.as_deref(), "vmess-node"),
        server: link.add,
        port,
        transport,
        tls: link.tls.as_deref() == Some("tls"),
        sni,
        ws,
        udp: true,
        credential: Credential::Vmess {
            uuid: link.id,
            alter_id,
            cipher: "auto".to_string(),
        },
        dialer_proxy: None,
    })
}

fn parse_vless(raw: &str) -> Result<ProxyRecord, ParseError> {
    let url = parse_stream_url(raw)?;
    let uuid = url.username().to_string();
    if uuid.trim().is_empty() {
        return Err(ParseError::Parse("vless missing uuid".to_string()));
    }
    let (server, port) = host_and_port(&url, "vless")?;
    let query = stream_query(&url);

    let transport = Transport::from_net(query.net.as_deref().unwrap_or("tcp"));
    let ws = ws_options(&transport, &query);

    Ok(ProxyRecord {
        name: fallback_name(url.fragment(), "vless-node"),
        server,
        port,
        transport,
        tls: query.security.as_deref() == Some("tls"),
        sni: query.sni,
        ws,
        udp: true,
        credential: Credential::Vless { uuid },
        dialer_proxy: None,
    })
}

fn parse_trojan(raw: &str) -> Result<ProxyRecord, ParseError> {
    let url = parse_stream_url(raw)?;
    let password = url.username().to_string();
    if password.trim().is_empty() {
        return Err(ParseError::Parse("trojan missing password".to_string()));
    }
    let (server, port) = host_and_port(&url, "trojan")?;
    let query = stream_query(&url);

    let transport = Transport::from_net(query.net.as_deref().unwrap_or("tcp"));
    let ws = ws_options(&transport, &query);

    Ok(ProxyRecord {
        name: fallback_name(url.fragment(), "trojan-node"),
        server,
        port,
        transport,
        // trojan always rides TLS
        tls: true,
        sni: query.sni,
        ws,
        udp: true,
        credential: Credential::Trojan { password },
        dialer_proxy: None,
    })
}

fn parse_shadowsocks(rest: &str) -> Result<ProxyRecord, ParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ParseError::Decode("ss link missing payload".to_string()));
    }

    let (main, name) = match rest.split_once('#') {
        Some((main, fragment)) => (main, fallback_name(Some(fragment), "ss-node")),
        None => (rest, "ss-node".to_string()),
    };
    // plugin parameters after '?' are not carried into the output
    let main = main.split_once('?').map(|(m, _)| m).unwrap_or(main);

    let (cipher, password, server, port) = if let Some((left, host_port)) = main.split_once('@') {
        // form 1: base64(cipher:password)@host:port, with an unencoded
        // cipher:password fallback seen in the wild
        let decoded = decode_base64(left)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|text| text.contains(':'));
        let (cipher, password) = match decoded {
            Some(text) => split_credential(&text)?,
            None => split_credential(left)?,
        };
        let (server, port) = split_host_port(host_port)?;
        (cipher, password, server, port)
    } else {
        // legacy form 2: base64(cipher:password@host:port)
        let bytes = decode_base64(main).map_err(ParseError::Decode)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ParseError::Decode("ss payload is not utf-8".to_string()))?;
        let (creds, host_port) = text
            .split_once('@')
            .ok_or_else(|| ParseError::Parse("ss payload missing host".to_string()))?;
        let (cipher, password) = split_credential(creds)?;
        let (server, port) = split_host_port(host_port)?;
        (cipher, password, server, port)
    };

    Ok(ProxyRecord {
        name,
        server,
        port,
        transport: Transport::Tcp,
        tls: false,
        sni: None,
        ws: None,
        udp: true,
        credential: Credential::Shadowsocks { cipher, password },
        dialer_proxy: None,
    })
}

#[derive(Debug, Default)]
struct StreamQuery {
    net: Option<String>,
    security: Option<String>,
    sni: Option<String>,
    host: Option<String>,
    path: Option<String>,
}

// Some generators HTML-escape the query separator; undo that before
// handing the line to the URL parser.
fn parse_stream_url(raw: &str) -> Result<Url, ParseError> {
    let normalized = raw.replace("&amp;", "&");
    Url::parse(&normalized).map_err(|e| ParseError::Parse(e.to_string()))
}

fn stream_query(url: &Url) -> StreamQuery {
    let mut query = StreamQuery::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "type" => query.net = Some(value.to_string()),
            "security" => query.security = Some(value.to_string()),
            "sni" => query.sni = Some(value.to_string()),
            "host" => query.host = Some(value.to_string()),
            "path" => query.path = Some(value.to_string()),
            _ => {}
        }
    }
    query
}

fn ws_options(transport: &Transport, query: &StreamQuery) -> Option<WsOptions> {
    if !transport.is_ws() {
        return None;
    }
    Some(WsOptions {
        path: query.path.clone().unwrap_or_else(|| "/".to_string()),
        host: query.host.clone().unwrap_or_default(),
    })
}

fn host_and_port(url: &Url, scheme: &str) -> Result<(String, u16), ParseError> {
    let host = url
        .host_str()
        .ok_or_else(|| ParseError::Parse(format!("{} missing host", scheme)))?;
    let port = url
        .port()
        .filter(|p| *p != 0)
        .ok_or_else(|| ParseError::Parse(format!("{} missing port", scheme)))?;
    Ok((host.to_string(), port))
}

fn fallback_name(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => fallback.to_string(),
    }
}

fn split_credential(value: &str) -> Result<(String, String), ParseError> {
    let (cipher, password) = value
        .split_once(':')
        .ok_or_else(|| ParseError::Parse("ss credential missing ':'".to_string()))?;
    if cipher.is_empty() {
        return Err(ParseError::Parse("ss cipher is empty".to_string()));
    }
    Ok((cipher.to_string(), password.to_string()))
}

fn split_host_port(value: &str) -> Result<(String, u16), ParseError> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| ParseError::Parse("ss address missing port".to_string()))?;
    if host.trim().is_empty() {
        return Err(ParseError::Parse("ss host is empty".to_string()));
    }
    let port = port
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ParseError::Parse(format!("invalid ss port: {}", port)))?;
    Ok((host.trim().to_string(), port))
}

fn decode_base64(value: &str) -> Result<Vec<u8>, String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(&compact)
        .or_else(|_| STANDARD_NO_PAD.decode(&compact))
        .or_else(|_| URL_SAFE.decode(&compact))
        .or_else(|_| URL_SAFE_NO_PAD.decode(&compact))
        .map_err(|e| e.to_string())
}
