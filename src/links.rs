use crate::model::{InboundEndpoint, Network, Protocol, RealitySettings, Security, Subscriber};
use base64::prelude::*;
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use urlencoding::encode;

pub const REALITY_FLOW: &str = "xtls-rprx-vision";

static MTPROTO_SECRET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("static regex"));

/// Builds the share URI for one endpoint. Endpoints that have no URI form
/// (WireGuard) or whose credentials cannot be encoded yield `None`.
pub fn encode_link(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> Option<String> {
    match endpoint.protocol {
        Protocol::Vless => Some(encode_vless(subscriber, endpoint)),
        Protocol::Vmess => encode_vmess(subscriber, endpoint),
        Protocol::Trojan => Some(encode_trojan(subscriber, endpoint)),
        Protocol::Shadowsocks => Some(encode_shadowsocks(subscriber, endpoint)),
        Protocol::Socks => Some(encode_userpass("socks", subscriber, endpoint)),
        Protocol::Http => Some(encode_userpass("http", subscriber, endpoint)),
        Protocol::Mtproto => encode_mtproto(subscriber, endpoint),
        Protocol::Wireguard => None,
    }
}

// Ordered query string; values are percent-encoded on insert.
#[derive(Debug, Default)]
struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    fn push(&mut self, key: &'static str, value: &str) {
        self.pairs.push((key, encode(value).into_owned()));
    }

    fn push_opt(&mut self, key: &'static str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.push(key, value);
        }
    }

    fn finish(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn fragment(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> String {
    encode(endpoint.display_name(subscriber)).into_owned()
}

fn push_transport(query: &mut Query, endpoint: &InboundEndpoint) {
    let transport = endpoint.transport();
    match endpoint.network {
        Network::Tcp => {}
        Network::Ws | Network::Http | Network::HttpUpgrade => {
            query.push("path", transport.path());
            query.push_opt("host", transport.host());
        }
        Network::Grpc => {
            query.push_opt("serviceName", transport.grpc_service_name.as_deref());
        }
        Network::Xhttp => {
            query.push("path", transport.path());
            query.push_opt("host", transport.host());
            query.push("mode", transport.mode());
        }
    }
}

fn push_alpn(query: &mut Query, endpoint: &InboundEndpoint) {
    let alpn = endpoint.alpn();
    if !alpn.is_empty() {
        query.push("alpn", &alpn.join(","));
    }
}

fn encode_vless(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> String {
    let mut query = Query::default();
    query.push("type", endpoint.network.as_str());
    query.push("security", endpoint.security.as_str());

    match endpoint.security {
        Security::None => {}
        Security::Tls => {
            query.push("sni", endpoint.sni());
            push_alpn(&mut query, endpoint);
        }
        Security::Reality => {
            let fallback = RealitySettings::default();
            let reality = endpoint.reality.as_ref().unwrap_or(&fallback);
            query.push_opt("sni", endpoint.reality_server_name());
            query.push("fp", reality.fingerprint());
            query.push_opt("pbk", reality.public_key.as_deref());
            query.push_opt("sid", reality.short_id());
            query.push_opt("spx", reality.spider_x.as_deref());
            query.push("flow", REALITY_FLOW);
        }
    }

    push_transport(&mut query, endpoint);

    if endpoint.security != Security::Reality {
        query.push_opt("flow", endpoint.flow.as_deref());
    }

    format!(
        "vless://{}@{}:{}?{}#{}",
        subscriber.uuid,
        endpoint.server_address,
        endpoint.port,
        query.finish(),
        fragment(subscriber, endpoint)
    )
}

/// v2rayN share payload. Field order is the wire order.
#[derive(Debug, Serialize)]
struct VmessPayload<'a> {
    v: &'static str,
    ps: &'a str,
    add: &'a str,
    port: String,
    id: &'a str,
    aid: &'static str,
    scy: &'static str,
    net: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    host: &'a str,
    path: &'a str,
    tls: &'static str,
    sni: &'a str,
    alpn: String,
}

fn encode_vmess(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> Option<String> {
    let transport = endpoint.transport();
    let (net, kind, path) = match endpoint.network {
        Network::Tcp => ("tcp", "none", ""),
        Network::Ws => ("ws", "none", transport.path()),
        Network::Http => ("h2", "none", transport.path()),
        Network::Grpc => ("grpc", "gun", transport.service_name()),
        Network::HttpUpgrade => ("httpupgrade", "httpupgrade", transport.path()),
        Network::Xhttp => ("xhttp", transport.mode(), transport.path()),
    };

    let tls = endpoint.uses_tls();
    let payload = VmessPayload {
        v: "2",
        ps: endpoint.display_name(subscriber),
        add: &endpoint.server_address,
        port: endpoint.port.to_string(),
        id: &subscriber.uuid,
        aid: "0",
        scy: "auto",
        net,
        kind,
        host: transport.host().unwrap_or_default(),
        path,
        tls: if tls { "tls" } else { "" },
        sni: if tls { endpoint.sni() } else { "" },
        alpn: if tls { endpoint.alpn().join(",") } else { String::new() },
    };

    match serde_json::to_string(&payload) {
        Ok(json) => Some(format!("vmess://{}", BASE64_STANDARD.encode(json))),
        Err(e) => {
            debug!("Failed to serialize vmess payload for {}: {}", endpoint.tag, e);
            None
        }
    }
}

fn encode_trojan(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> String {
    let mut query = Query::default();
    query.push("type", endpoint.network.as_str());
    query.push("security", "tls");
    query.push("sni", endpoint.sni());
    push_alpn(&mut query, endpoint);
    push_transport(&mut query, endpoint);

    format!(
        "trojan://{}@{}:{}?{}#{}",
        encode(&subscriber.password),
        endpoint.server_address,
        endpoint.port,
        query.finish(),
        fragment(subscriber, endpoint)
    )
}

fn encode_shadowsocks(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> String {
    // SIP002: only method:password is encoded, host:port stays in the clear
    let userinfo = format!("{}:{}", endpoint.cipher(), subscriber.password);

    format!(
        "ss://{}@{}:{}#{}",
        BASE64_URL_SAFE_NO_PAD.encode(userinfo),
        endpoint.server_address,
        endpoint.port,
        fragment(subscriber, endpoint)
    )
}

fn encode_userpass(scheme: &str, subscriber: &Subscriber, endpoint: &InboundEndpoint) -> String {
    format!(
        "{}://{}:{}@{}:{}#{}",
        scheme,
        encode(&subscriber.email),
        encode(&subscriber.password),
        endpoint.server_address,
        endpoint.port,
        fragment(subscriber, endpoint)
    )
}

fn encode_mtproto(subscriber: &Subscriber, endpoint: &InboundEndpoint) -> Option<String> {
    let secret = subscriber.uuid.replace('-', "").to_ascii_lowercase();
    if !MTPROTO_SECRET.is_match(&secret) {
        debug!("Skipping mtproto endpoint {}: uuid is not a valid secret", endpoint.tag);
        return None;
    }

    Some(format!(
        "tg://proxy?server={}&port={}&secret={}",
        endpoint.server_address, endpoint.port, secret
    ))
}
