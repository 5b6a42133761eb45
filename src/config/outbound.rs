use crate::links::REALITY_FLOW;
use crate::model::{
    Assignment, InboundEndpoint, Network, Protocol, RealitySettings, Security, Subscriber,
    active_endpoints,
};
use crate::wireguard::{PeerProfile, collect_peers};
use log::{debug, warn};
use serde_json::{Value, json};
use std::collections::HashSet;

/// `<protocol>-<port>`, the tag clients see for an endpoint.
pub fn outbound_tag(endpoint: &InboundEndpoint) -> String {
    format!("{}-{}", endpoint.protocol.as_str(), endpoint.port)
}

/// One Sing-box outbound per active endpoint that has a Sing-box form.
/// Colliding tags are widened with the endpoint's own tag, then numbered.
pub fn generate_outbounds(subscriber: &Subscriber, assignments: &[Assignment]) -> Vec<Value> {
    let peers = collect_peers(assignments);
    let mut used_tags = HashSet::new();
    let mut outbounds = Vec::new();

    for endpoint in active_endpoints(assignments) {
        let peer = peers.iter().find(|p| std::ptr::eq(p.endpoint, endpoint));
        let Some(mut outbound) = build_outbound(subscriber, endpoint, peer) else {
            debug!(
                "Skipping {} endpoint {} on port {}: no outbound form",
                endpoint.protocol, endpoint.tag, endpoint.port
            );
            continue;
        };

        let tag = unique_tag(outbound_tag(endpoint), endpoint, &mut used_tags);
        outbound["tag"] = json!(tag);
        outbounds.push(outbound);
    }

    outbounds
}

fn unique_tag(base: String, endpoint: &InboundEndpoint, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }

    let suffix = sanitize_tag(&endpoint.tag);
    let widened = if suffix.is_empty() {
        base.clone()
    } else {
        format!("{}-{}", base, suffix)
    };

    let mut candidate = widened.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}-{}", widened, n);
        n += 1;
    }

    warn!("Outbound tag {} is already taken, using {}", base, candidate);
    candidate
}

fn sanitize_tag(tag: &str) -> String {
    let cleaned: String = tag
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == ' ')
        .collect();

    cleaned.trim().replace(' ', "-").to_lowercase()
}

fn build_outbound(
    subscriber: &Subscriber,
    endpoint: &InboundEndpoint,
    peer: Option<&PeerProfile<'_>>,
) -> Option<Value> {
    let mut outbound = match endpoint.protocol {
        Protocol::Vless => {
            let mut outbound = json!({
                "type": "vless",
                "server": endpoint.server_address,
                "server_port": endpoint.port,
                "uuid": subscriber.uuid,
                "packet_encoding": "xudp"
            });

            // Reality always runs with vision; a stored flow only applies otherwise
            if endpoint.security == Security::Reality {
                outbound["flow"] = json!(REALITY_FLOW);
            } else if let Some(ref flow) = endpoint.flow {
                outbound["flow"] = json!(flow);
            }
            outbound
        }
        Protocol::Vmess => json!({
            "type": "vmess",
            "server": endpoint.server_address,
            "server_port": endpoint.port,
            "uuid": subscriber.uuid,
            "security": "auto",
            "alter_id": 0
        }),
        Protocol::Trojan => json!({
            "type": "trojan",
            "server": endpoint.server_address,
            "server_port": endpoint.port,
            "password": subscriber.password
        }),
        Protocol::Shadowsocks => json!({
            "type": "shadowsocks",
            "server": endpoint.server_address,
            "server_port": endpoint.port,
            "method": endpoint.cipher(),
            "password": subscriber.password
        }),
        Protocol::Socks => json!({
            "type": "socks",
            "server": endpoint.server_address,
            "server_port": endpoint.port,
            "version": "5",
            "username": subscriber.email,
            "password": subscriber.password
        }),
        Protocol::Http => json!({
            "type": "http",
            "server": endpoint.server_address,
            "server_port": endpoint.port,
            "username": subscriber.email,
            "password": subscriber.password
        }),
        Protocol::Mtproto => return None,
        Protocol::Wireguard => return peer.map(wireguard_outbound),
    };

    // Shadowsocks and SOCKS outbounds have no tls field
    if matches!(
        endpoint.protocol,
        Protocol::Vless | Protocol::Vmess | Protocol::Trojan | Protocol::Http
    ) {
        if let Some(tls) = tls_block(endpoint) {
            outbound["tls"] = tls;
        }
    }

    if matches!(
        endpoint.protocol,
        Protocol::Vless | Protocol::Vmess | Protocol::Trojan
    ) {
        if let Some(transport) = transport_block(endpoint) {
            outbound["transport"] = transport;
        }
    }

    Some(outbound)
}

fn wireguard_outbound(peer: &PeerProfile<'_>) -> Value {
    let endpoint = peer.endpoint;
    let (server, port) = peer
        .peer_endpoint
        .rsplit_once(':')
        .and_then(|(host, port)| {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            Some((host.to_string(), port.parse::<u16>().ok()?))
        })
        .unwrap_or_else(|| (endpoint.server_address.clone(), endpoint.port));

    let mut outbound = json!({
        "type": "wireguard",
        "server": server,
        "server_port": port,
        "local_address": [peer.address],
        "private_key": peer.private_key,
        "peer_public_key": peer.peer_public_key
    });

    if let Some(mtu) = peer.mtu {
        outbound["mtu"] = json!(mtu);
    }

    outbound
}

/// TLS or REALITY block; `None` for plaintext endpoints.
pub fn tls_block(endpoint: &InboundEndpoint) -> Option<Value> {
    if endpoint.security == Security::Reality {
        let fallback = RealitySettings::default();
        let reality = endpoint.reality.as_ref().unwrap_or(&fallback);
        return Some(json!({
            "enabled": true,
            "server_name": endpoint.reality_server_name().unwrap_or_default(),
            "utls": {
                "enabled": true,
                "fingerprint": reality.fingerprint()
            },
            "reality": {
                "enabled": true,
                "public_key": reality.public_key.as_deref().unwrap_or_default(),
                "short_id": reality.short_id().unwrap_or_default()
            }
        }));
    }

    if !endpoint.uses_tls() {
        return None;
    }

    let mut tls = json!({
        "enabled": true,
        "server_name": endpoint.sni()
    });

    let alpn = endpoint.alpn();
    if !alpn.is_empty() {
        tls["alpn"] = json!(alpn);
    }

    Some(tls)
}

/// Shared WS/gRPC/HTTP/HTTPUpgrade/XHTTP block for VLESS, VMess and Trojan.
pub fn transport_block(endpoint: &InboundEndpoint) -> Option<Value> {
    let transport = endpoint.transport();

    let block = match endpoint.network {
        Network::Tcp => return None,
        Network::Ws => {
            let mut block = json!({
                "type": "ws",
                "path": transport.path()
            });
            if let Some(host) = transport.host() {
                block["headers"] = json!({ "Host": host });
            }
            block
        }
        Network::Grpc => json!({
            "type": "grpc",
            "service_name": transport.service_name()
        }),
        Network::Http => {
            let mut block = json!({
                "type": "http",
                "path": transport.path()
            });
            if let Some(host) = transport.host() {
                block["host"] = json!([host]);
            }
            block
        }
        Network::HttpUpgrade => {
            let mut block = json!({
                "type": "httpupgrade",
                "path": transport.path()
            });
            if let Some(host) = transport.host() {
                block["host"] = json!(host);
            }
            block
        }
        Network::Xhttp => {
            let mut block = json!({
                "type": "xhttp",
                "path": transport.path(),
                "mode": transport.mode()
            });
            if let Some(host) = transport.host() {
                block["host"] = json!(host);
            }
            block
        }
    };

    Some(block)
}
