#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
}

impl ProxyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Vmess => "vmess",
            ProxyKind::Vless => "vless",
            ProxyKind::Trojan => "trojan",
            ProxyKind::Shadowsocks => "ss",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Ws,
    Other(String),
}

impl Transport {
    pub fn from_net(value: &str) -> Transport {
        match value {
            "tcp" => Transport::Tcp,
            "ws" => Transport::Ws,
            other => Transport::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Ws => "ws",
            Transport::Other(name) => name.as_str(),
        }
    }

    pub fn is_ws(&self) -> bool {
        matches!(self, Transport::Ws)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Vmess {
        uuid: String,
        alter_id: u32,
        cipher: String,
    },
    Vless {
        uuid: String,
    },
    Trojan {
        password: String,
    },
    Shadowsocks {
        cipher: String,
        password: String,
    },
}

impl Credential {
    pub fn kind(&self) -> ProxyKind {
        match self {
            Credential::Vmess { .. } => ProxyKind::Vmess,
            Credential::Vless { .. } => ProxyKind::Vless,
            Credential::Trojan { .. } => ProxyKind::Trojan,
            Credential::Shadowsocks { .. } => ProxyKind::Shadowsocks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsOptions {
    pub path: String,
    pub host: String,
}

/// One normalized proxy entry. Constructed only by the link parsers,
/// which guarantee a non-zero port, a credential matching the kind,
/// and websocket options whenever the transport is websocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub transport: Transport,
    pub tls: bool,
    pub sni: Option<String>,
    pub ws: Option<WsOptions>,
    pub udp: bool,
    pub credential: Credential,
    pub dialer_proxy: Option<String>,
}

impl ProxyRecord {
    pub fn kind(&self) -> ProxyKind {
        self.credential.kind()
    }
}
