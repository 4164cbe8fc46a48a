use serde::Serialize;

use crate::record::{Credential, ProxyKind, ProxyRecord};

#[derive(Debug)]
pub enum RenderError {
    Yaml(String),
}

#[derive(Debug, Serialize)]
pub struct ProxyList {
    pub proxies: Vec<ClashProxy>,
}

#[derive(Debug, Serialize)]
pub struct ClashProxy {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub server: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    pub udp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
    #[serde(rename = "dialer-proxy", skip_serializing_if = "Option::is_none")]
    pub dialer_proxy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WsOpts {
    pub path: String,
    pub headers: WsHeaders,
}

#[derive(Debug, Serialize)]
pub struct WsHeaders {
    #[serde(rename = "Host")]
    pub host: String,
}

pub fn to_clash(record: &ProxyRecord) -> ClashProxy {
    let kind = record.kind();
    let (uuid, alter_id, cipher, password) = match record.credential {
        Credential::Vmess {
            ref uuid,
            alter_id,
            ref cipher,
        } => (
            Some(uuid.clone()),
            Some(alter_id),
            Some(cipher.clone()),
            None,
        ),
        Credential::Vless { ref uuid } => (Some(uuid.clone()), None, None, None),
        Credential::Trojan { ref password } => (None, None, None, Some(password.clone())),
        Credential::Shadowsocks {
            ref cipher,
            ref password,
        } => (None, None, Some(cipher.clone()), Some(password.clone())),
    };

    // Clash reads trojan as TLS-implicit and ss as plain TCP; only
    // vmess/vless carry explicit tls and network keys.
    let network = match kind {
        ProxyKind::Shadowsocks => None,
        ProxyKind::Trojan => record
            .transport
            .is_ws()
            .then(|| record.transport.as_str().to_string()),
        _ => Some(record.transport.as_str().to_string()),
    };
    let tls = match kind {
        ProxyKind::Vmess | ProxyKind::Vless => Some(record.tls),
        _ => None,
    };

    ClashProxy {
        name: record.name.clone(),
        kind: kind.as_str(),
        server: record.server.clone(),
        port: record.port,
        uuid,
        alter_id,
        cipher,
        password,
        tls,
        udp: record.udp,
        network,
        sni: record.sni.clone(),
        ws_opts: record.ws.as_ref().map(|ws| WsOpts {
            path: ws.path.clone(),
            headers: WsHeaders {
                host: ws.host.clone(),
            },
        }),
        dialer_proxy: record.dialer_proxy.clone(),
    }
}

pub fn render(records: &[ProxyRecord]) -> Result<String, RenderError> {
    let list = ProxyList {
        proxies: records.iter().map(to_clash).collect(),
    };
    serde_yaml::to_string(&list).map_err(|e| RenderError::Yaml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::parse_link;

    #[test]
    fn render_vless_ws_node() {
        let record = parse_link(
            "vless://uuid123@host.example:443?type=ws&security=tls&host=cdn.example&path=%2Fws#MyNode",
        )
        .expect("vless parses");
        let yaml = render(&[record]).expect("renders");
        assert!(yaml.starts_with("proxies:"));
        assert!(yaml.contains("name: MyNode"));
        assert!(yaml.contains("type: vless"));
        assert!(yaml.contains("server: host.example"));
        assert!(yaml.contains("port: 443"));
        assert!(yaml.contains("tls: true"));
        assert!(yaml.contains("network: ws"));
        assert!(yaml.contains("ws-opts:"));
        assert!(yaml.contains("path: /ws"));
        assert!(yaml.contains("Host: cdn.example"));
        assert!(!yaml.contains("sni:"));
        assert!(!yaml.contains("password:"));
    }

    #[test]
    fn render_trojan_omits_tls_and_tcp_network() {
        let record =
            parse_link("trojan://secret@tr.example.com:443#TR").expect("trojan parses");
        let yaml = render(&[record]).expect("renders");
        assert!(yaml.contains("type: trojan"));
        assert!(yaml.contains("password: secret"));
        assert!(!yaml.contains("tls:"));
        assert!(!yaml.contains("network:"));
    }

    #[test]
    fn render_ss_carries_cipher_and_password() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let link = format!(
            "ss://{}@ss.example.com:8388#node",
            STANDARD.encode("aes-256-gcm:pw")
        );
        let record = parse_link(&link).expect("ss parses");
        let yaml = render(&[record]).expect("renders");
        assert!(yaml.contains("type: ss"));
        assert!(yaml.contains("cipher: aes-256-gcm"));
        assert!(yaml.contains("password: pw"));
        assert!(yaml.contains("udp: true"));
        assert!(!yaml.contains("network:"));
    }

    #[test]
    fn render_includes_dialer_proxy_when_set() {
        let mut record =
            parse_link("vless://uuid123@host.example:443#n").expect("vless parses");
        record.dialer_proxy = Some("relay-out".to_string());
        let yaml = render(&[record]).expect("renders");
        assert!(yaml.contains("dialer-proxy: relay-out"));
    }

    #[test]
    fn render_is_stable_across_runs() {
        let record = parse_link("vless://uuid123@host.example:443#n").expect("vless parses");
        let a = render(std::slice::from_ref(&record)).expect("renders");
        let b = render(std::slice::from_ref(&record)).expect("renders");
        assert_eq!(a, b);
    }
}
