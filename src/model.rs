use crate::error::ModelError;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PATH: &str = "/";
pub const DEFAULT_CIPHER: &str = "chacha20-ietf-poly1305";
pub const DEFAULT_FINGERPRINT: &str = "chrome";
pub const DEFAULT_XHTTP_MODE: &str = "auto";
pub const DEFAULT_ALLOWED_IPS: &str = "0.0.0.0/0, ::/0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Vless,
    Vmess,
    Trojan,
    Shadowsocks,
    Socks,
    Http,
    Mtproto,
    Wireguard,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Vless => "vless",
            Protocol::Vmess => "vmess",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::Socks => "socks",
            Protocol::Http => "http",
            Protocol::Mtproto => "mtproto",
            Protocol::Wireguard => "wireguard",
        }
    }
}

impl FromStr for Protocol {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vless" => Ok(Protocol::Vless),
            "vmess" => Ok(Protocol::Vmess),
            "trojan" => Ok(Protocol::Trojan),
            "shadowsocks" | "ss" => Ok(Protocol::Shadowsocks),
            "socks" | "socks5" => Ok(Protocol::Socks),
            "http" => Ok(Protocol::Http),
            "mtproto" => Ok(Protocol::Mtproto),
            "wireguard" => Ok(Protocol::Wireguard),
            _ => Err(ModelError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Ws,
    Grpc,
    Http,
    HttpUpgrade,
    Xhttp,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Ws => "ws",
            Network::Grpc => "grpc",
            Network::Http => "http",
            Network::HttpUpgrade => "httpupgrade",
            Network::Xhttp => "xhttp",
        }
    }
}

impl FromStr for Network {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" | "raw" => Ok(Network::Tcp),
            "ws" | "websocket" => Ok(Network::Ws),
            "grpc" => Ok(Network::Grpc),
            "http" | "h2" => Ok(Network::Http),
            "httpupgrade" => Ok(Network::HttpUpgrade),
            "xhttp" | "splithttp" => Ok(Network::Xhttp),
            _ => Err(ModelError::UnknownNetwork(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Security {
    None,
    Tls,
    Reality,
}

impl Security {
    pub fn as_str(&self) -> &'static str {
        match self {
            Security::None => "none",
            Security::Tls => "tls",
            Security::Reality => "reality",
        }
    }
}

impl FromStr for Security {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Security::None),
            "tls" => Ok(Security::Tls),
            "reality" => Ok(Security::Reality),
            _ => Err(ModelError::UnknownSecurity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub uuid: String,
    pub password: String,
    pub email: String,
}

impl Subscriber {
    pub fn new(uuid: impl Into<String>, password: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSettings {
    pub ws_path: Option<String>,
    pub ws_host: Option<String>,
    pub grpc_service_name: Option<String>,
    pub xhttp_mode: Option<String>,
}

static NO_TRANSPORT: TransportSettings = TransportSettings {
    ws_path: None,
    ws_host: None,
    grpc_service_name: None,
    xhttp_mode: None,
};

impl TransportSettings {
    pub fn path(&self) -> &str {
        self.ws_path.as_deref().unwrap_or(DEFAULT_PATH)
    }

    pub fn host(&self) -> Option<&str> {
        self.ws_host.as_deref()
    }

    pub fn service_name(&self) -> &str {
        self.grpc_service_name.as_deref().unwrap_or_default()
    }

    pub fn mode(&self) -> &str {
        self.xhttp_mode.as_deref().unwrap_or(DEFAULT_XHTTP_MODE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub server_name: Option<String>,
    pub alpn: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealitySettings {
    pub public_key: Option<String>,
    pub short_ids: Vec<String>,
    pub server_names: Vec<String>,
    pub fingerprint: Option<String>,
    pub spider_x: Option<String>,
}

impl RealitySettings {
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.as_deref().unwrap_or(DEFAULT_FINGERPRINT)
    }

    pub fn short_id(&self) -> Option<&str> {
        self.short_ids.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireGuardSettings {
    pub private_key: Option<String>,
    /// Already resolved: explicit peer key, else the endpoint's public key.
    pub peer_public_key: Option<String>,
    pub peer_endpoint: Option<String>,
    pub allowed_ips: Option<String>,
    pub mtu: Option<u16>,
    pub address: Option<String>,
}

impl WireGuardSettings {
    pub fn allowed_ips(&self) -> &str {
        self.allowed_ips.as_deref().unwrap_or(DEFAULT_ALLOWED_IPS)
    }
}

/// A validated inbound endpoint. Attribute groups are only present when they
/// apply to the endpoint's protocol and security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEndpoint {
    pub protocol: Protocol,
    pub network: Network,
    pub security: Security,
    pub server_address: String,
    pub port: u16,
    pub tag: String,
    pub remark: Option<String>,
    pub enabled: bool,
    pub transport: Option<TransportSettings>,
    pub tls: Option<TlsSettings>,
    pub reality: Option<RealitySettings>,
    pub wireguard: Option<WireGuardSettings>,
    pub cipher: Option<String>,
    pub flow: Option<String>,
}

impl InboundEndpoint {
    pub fn new(protocol: Protocol, server_address: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            network: Network::Tcp,
            security: Security::None,
            server_address: server_address.into(),
            port,
            tag: String::new(),
            remark: None,
            enabled: true,
            transport: None,
            tls: None,
            reality: None,
            wireguard: None,
            cipher: None,
            flow: None,
        }
    }

    pub fn transport(&self) -> &TransportSettings {
        self.transport.as_ref().unwrap_or(&NO_TRANSPORT)
    }

    /// Trojan is TLS-only no matter what the stored security says.
    pub fn uses_tls(&self) -> bool {
        self.security == Security::Tls || self.protocol == Protocol::Trojan
    }

    pub fn server_name(&self) -> Option<&str> {
        self.tls.as_ref().and_then(|tls| tls.server_name.as_deref())
    }

    pub fn sni(&self) -> &str {
        self.server_name().unwrap_or(&self.server_address)
    }

    pub fn alpn(&self) -> &[String] {
        self.tls.as_ref().map(|tls| tls.alpn.as_slice()).unwrap_or_default()
    }

    pub fn reality_server_name(&self) -> Option<&str> {
        self.reality
            .as_ref()
            .and_then(|r| r.server_names.first().map(String::as_str))
            .or_else(|| self.server_name())
    }

    pub fn cipher(&self) -> &str {
        self.cipher.as_deref().unwrap_or(DEFAULT_CIPHER)
    }

    pub fn display_name<'a>(&'a self, subscriber: &'a Subscriber) -> &'a str {
        self.remark.as_deref().unwrap_or(&subscriber.email)
    }
}

/// Subscriber-to-endpoint link carrying its own enabled flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub enabled: bool,
    pub endpoint: InboundEndpoint,
}

impl Assignment {
    pub fn new(endpoint: InboundEndpoint) -> Self {
        Self {
            enabled: true,
            endpoint,
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.endpoint.enabled
    }
}

pub fn active_endpoints(assignments: &[Assignment]) -> impl Iterator<Item = &InboundEndpoint> {
    assignments
        .iter()
        .filter(|a| a.is_active())
        .map(|a| &a.endpoint)
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberRecord {
    pub uuid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    pub protocol: String,
    pub network: Option<String>,
    pub security: Option<String>,
    #[serde(default)]
    pub server_address: String,
    pub port: u16,
    #[serde(default)]
    pub tag: String,
    pub remark: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub ws_path: Option<String>,
    pub ws_host: Option<String>,
    pub grpc_service_name: Option<String>,
    pub xhttp_mode: Option<String>,
    pub server_name: Option<String>,
    pub alpn: Option<Value>,
    pub public_key: Option<String>,
    pub reality_short_ids: Option<Value>,
    pub reality_server_names: Option<Value>,
    pub fingerprint: Option<String>,
    pub spider_x: Option<String>,
    pub private_key: Option<String>,
    pub peer_public_key: Option<String>,
    pub peer_endpoint: Option<String>,
    #[serde(rename = "allowedIPs", alias = "allowedIps")]
    pub allowed_ips: Option<String>,
    pub mtu: Option<u16>,
    pub address: Option<String>,
    pub cipher: Option<String>,
    pub flow: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRecord {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub endpoint: EndpointRecord,
}

/// One subscriber with all of their endpoint assignments, as handed over by
/// the storage layer.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub subscriber: SubscriberRecord,
    #[serde(default)]
    pub assignments: Vec<AssignmentRecord>,
}

impl Snapshot {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse subscriber snapshot")
    }

    pub fn into_model(self) -> (Subscriber, Vec<Assignment>) {
        let subscriber = Subscriber::from(self.subscriber);
        let mut assignments = Vec::new();

        for (idx, record) in self.assignments.into_iter().enumerate() {
            let tag = record.endpoint.tag.clone();
            match InboundEndpoint::try_from(record.endpoint) {
                Ok(endpoint) => assignments.push(Assignment {
                    enabled: record.enabled,
                    endpoint,
                }),
                Err(e) => {
                    warn!("Skipping assignment {} ({}): {}", idx + 1, tag, e);
                }
            }
        }

        (subscriber, assignments)
    }
}

impl From<SubscriberRecord> for Subscriber {
    fn from(record: SubscriberRecord) -> Self {
        if Uuid::try_parse(record.uuid.trim()).is_err() {
            warn!("Subscriber {} has a malformed uuid: {}", record.email, record.uuid);
        }
        Subscriber::new(record.uuid.trim(), record.password, record.email)
    }
}

impl TryFrom<EndpointRecord> for InboundEndpoint {
    type Error = ModelError;

    fn try_from(record: EndpointRecord) -> Result<Self, Self::Error> {
        let protocol: Protocol = record.protocol.parse()?;
        let network = match non_blank(record.network) {
            Some(network) => network.parse()?,
            None => Network::Tcp,
        };
        let security: Security = record.security.as_deref().unwrap_or("none").parse()?;

        if security == Security::Reality && protocol != Protocol::Vless {
            return Err(ModelError::RealityRequiresVless(protocol.to_string()));
        }

        let server_address = record.server_address.trim().to_string();
        if server_address.is_empty() {
            return Err(ModelError::EmptyServerAddress(record.tag));
        }

        let transport = if network == Network::Tcp {
            None
        } else {
            Some(TransportSettings {
                ws_path: non_blank(record.ws_path),
                ws_host: non_blank(record.ws_host),
                grpc_service_name: non_blank(record.grpc_service_name),
                xhttp_mode: non_blank(record.xhttp_mode),
            })
        };

        let public_key = non_blank(record.public_key);

        let tls = if security != Security::None || protocol == Protocol::Trojan {
            Some(TlsSettings {
                server_name: non_blank(record.server_name),
                alpn: string_list("alpn", record.alpn),
            })
        } else {
            None
        };

        let reality = if security == Security::Reality {
            Some(RealitySettings {
                public_key: public_key.clone(),
                short_ids: string_list("realityShortIds", record.reality_short_ids),
                server_names: string_list("realityServerNames", record.reality_server_names),
                fingerprint: non_blank(record.fingerprint),
                spider_x: non_blank(record.spider_x),
            })
        } else {
            None
        };

        let wireguard = if protocol == Protocol::Wireguard {
            Some(WireGuardSettings {
                private_key: non_blank(record.private_key),
                peer_public_key: non_blank(record.peer_public_key).or(public_key),
                peer_endpoint: non_blank(record.peer_endpoint),
                allowed_ips: non_blank(record.allowed_ips),
                mtu: record.mtu.filter(|mtu| *mtu > 0),
                address: non_blank(record.address),
            })
        } else {
            None
        };

        let cipher = if protocol == Protocol::Shadowsocks {
            non_blank(record.cipher)
        } else {
            None
        };

        Ok(InboundEndpoint {
            protocol,
            network,
            security,
            server_address,
            port: record.port,
            tag: record.tag,
            remark: non_blank(record.remark),
            enabled: record.enabled,
            transport,
            tls,
            reality,
            wireguard,
            cipher,
            flow: non_blank(record.flow),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// Lists arrive either as JSON arrays or as JSON-array text; anything else is
// dropped rather than failing the endpoint.
fn string_list(field: &str, value: Option<Value>) -> Vec<String> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Vec<Value>>(&text) {
                Ok(items) => items,
                Err(e) => {
                    debug!("Ignoring unparsable {} value {:?}: {}", field, text, e);
                    return Vec::new();
                }
            }
        }
        Some(other) => {
            debug!("Ignoring non-list {} value: {}", field, other);
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => non_blank(Some(s)),
            _ => None,
        })
        .collect()
}
