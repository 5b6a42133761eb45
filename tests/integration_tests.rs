use base64::prelude::*;
use proxy_synth_rs::config::build_client_config;
use proxy_synth_rs::format::{FormatTag, classify};
use proxy_synth_rs::model::{Assignment, Snapshot, Subscriber};
use proxy_synth_rs::subscription::build_subscription;
use proxy_synth_rs::synth::{SynthesisOptions, render};
use proxy_synth_rs::wireguard::{PeerProfileOptions, build_profiles};
use proxy_synth_rs::{EmptyResultError, encode_link};
use serde_json::Value;

const SAMPLE_SNAPSHOT: &str = r#"{
  "subscriber": {
    "uuid": "11111111-1111-1111-1111-111111111111",
    "password": "s3cret",
    "email": "alice@example.com"
  },
  "assignments": [
    {
      "endpoint": {
        "protocol": "VLESS", "network": "WS", "security": "TLS",
        "serverAddress": "vpn.example.com", "port": 443, "tag": "vless-ws",
        "remark": "Frankfurt WS",
        "wsPath": "/vless", "wsHost": "vpn.example.com", "serverName": "vpn.example.com"
      }
    },
    {
      "endpoint": {
        "protocol": "VLESS", "network": "TCP", "security": "REALITY",
        "serverAddress": "203.0.113.10", "port": 8443, "tag": "vless-reality",
        "publicKey": "R3alityPubKey", "realityShortIds": "[\"6ba85179e30d4fc2\"]",
        "realityServerNames": ["www.microsoft.com"], "flow": "none"
      }
    },
    {
      "endpoint": {
        "protocol": "VMESS", "network": "GRPC", "security": "TLS",
        "serverAddress": "vm.example.com", "port": 2053, "tag": "vmess-grpc",
        "grpcServiceName": "vm-grpc", "alpn": "not json"
      }
    },
    {
      "endpoint": {
        "protocol": "TROJAN", "network": "TCP", "security": "NONE",
        "serverAddress": "tj.example.com", "port": 4443, "tag": "trojan"
      }
    },
    {
      "endpoint": {
        "protocol": "SHADOWSOCKS", "serverAddress": "ss.example.com",
        "port": 8388, "tag": "ss", "cipher": "aes-128-gcm"
      }
    },
    {
      "endpoint": {
        "protocol": "MTPROTO", "serverAddress": "tg.example.com", "port": 993, "tag": "mt"
      }
    },
    {
      "enabled": false,
      "endpoint": {
        "protocol": "SOCKS", "serverAddress": "socks.example.com", "port": 1080, "tag": "off"
      }
    },
    {
      "endpoint": {
        "protocol": "HTTP", "serverAddress": "http.example.com", "port": 3128,
        "tag": "http-off", "enabled": false
      }
    },
    {
      "endpoint": {
        "protocol": "WIREGUARD", "serverAddress": "wg.example.com", "port": 51820,
        "tag": "wg-1", "privateKey": "cHJpdmF0ZS1rZXk=", "peerPublicKey": "cGVlci1rZXk=",
        "mtu": 1420
      }
    },
    {
      "endpoint": {
        "protocol": "WIREGUARD", "serverAddress": "wg2.example.com", "port": 51820,
        "tag": "wg-broken"
      }
    }
  ]
}"#;

fn load() -> (Subscriber, Vec<Assignment>) {
    Snapshot::from_json(SAMPLE_SNAPSHOT)
        .expect("Failed to parse snapshot")
        .into_model()
}

fn decode_list(body: &str) -> Vec<String> {
    let raw = BASE64_STANDARD.decode(body).expect("body is base64");
    String::from_utf8(raw)
        .unwrap()
        .split('\n')
        .map(String::from)
        .collect()
}

#[test]
fn test_end_to_end_subscription_list() {
    let (subscriber, assignments) = load();
    assert_eq!(assignments.len(), 10);

    let result = build_subscription(&subscriber, &assignments);
    assert!(result.is_ok(), "Failed to build subscription");

    let links = decode_list(&result.unwrap());
    // 6 enabled non-wireguard endpoints, all encodable
    assert_eq!(links.len(), 6);

    assert_eq!(
        links[0],
        "vless://11111111-1111-1111-1111-111111111111@vpn.example.com:443?type=ws&security=tls&sni=vpn.example.com&path=%2Fvless&host=vpn.example.com#Frankfurt%20WS"
    );
    assert!(links[1].starts_with("vless://"));
    assert!(links[2].starts_with("vmess://"));
    assert!(links[3].starts_with("trojan://s3cret@tj.example.com:4443?type=tcp&security=tls&sni=tj.example.com#"));
    assert!(links[4].starts_with("ss://"));
    assert_eq!(
        links[5],
        "tg://proxy?server=tg.example.com&port=993&secret=11111111111111111111111111111111"
    );
}

#[test]
fn test_end_to_end_reality_link() {
    let (subscriber, assignments) = load();
    let reality = &assignments[1].endpoint;

    let link = encode_link(&subscriber, reality).expect("reality link");
    assert!(link.contains("security=reality"));
    assert!(link.contains("sni=www.microsoft.com"));
    assert!(link.contains("pbk=R3alityPubKey"));
    assert!(link.contains("sid=6ba85179e30d4fc2"));
    assert!(link.contains("flow=xtls-rprx-vision"));
    assert!(!link.contains("flow=none"));
    // remark falls back to the subscriber email
    assert!(link.ends_with("#alice%40example.com"));
}

#[test]
fn test_end_to_end_vmess_round_trip() {
    let (subscriber, assignments) = load();
    let link = encode_link(&subscriber, &assignments[2].endpoint).unwrap();

    let payload = BASE64_STANDARD
        .decode(link.strip_prefix("vmess://").unwrap())
        .unwrap();
    let json: Value = serde_json::from_slice(&payload).unwrap();

    assert_eq!(json["add"], "vm.example.com");
    assert_eq!(json["port"], "2053");
    assert_eq!(json["net"], "grpc");
    assert_eq!(json["type"], "gun");
    assert_eq!(json["path"], "vm-grpc");
    assert_eq!(json["tls"], "tls");
    assert_eq!(json["sni"], "vm.example.com");
    // unparsable alpn is dropped, not fatal
    assert_eq!(json["alpn"], "");
}

#[test]
fn test_end_to_end_singbox_config() {
    let (subscriber, assignments) = load();

    let result = build_client_config(&subscriber, &assignments);
    assert!(result.is_ok(), "Failed to build client config");

    let config = result.unwrap();
    let outbounds = config["outbounds"].as_array().unwrap();

    assert_eq!(outbounds.iter().filter(|o| o["type"] == "selector").count(), 1);
    assert_eq!(outbounds.iter().filter(|o| o["type"] == "urltest").count(), 1);
    assert_eq!(config["route"]["final"], "proxy");

    let tags: Vec<&str> = outbounds
        .iter()
        .filter_map(|o| o["tag"].as_str())
        .collect();
    // mtproto has no outbound form and the broken wireguard endpoint is dropped
    assert_eq!(
        tags,
        [
            "proxy",
            "auto",
            "vless-443",
            "vless-8443",
            "vmess-2053",
            "trojan-4443",
            "shadowsocks-8388",
            "wireguard-51820",
            "direct",
            "block",
            "dns-out"
        ]
    );

    let reality = &outbounds[3];
    assert_eq!(reality["flow"], "xtls-rprx-vision");
    assert_eq!(reality["tls"]["reality"]["short_id"], "6ba85179e30d4fc2");
}

#[test]
fn test_end_to_end_wireguard_profiles() {
    let (_, assignments) = load();
    let options = PeerProfileOptions::with_dns_list("1.1.1.1,1.0.0.1");

    let profile = build_profiles(&assignments, &options).expect("wireguard profile");
    assert_eq!(
        profile,
        "[Interface]\n\
         PrivateKey = cHJpdmF0ZS1rZXk=\n\
         Address = 10.66.2.2/32\n\
         DNS = 1.1.1.1, 1.0.0.1\n\
         MTU = 1420\n\
         \n\
         [Peer]\n\
         PublicKey = cGVlci1rZXk=\n\
         Endpoint = wg.example.com:51820\n\
         AllowedIPs = 0.0.0.0/0, ::/0\n\
         PersistentKeepalive = 25"
    );
}

#[test]
fn test_end_to_end_format_routing() {
    let (subscriber, assignments) = load();
    let options = SynthesisOptions::default();

    let format = classify(Some("SFI/1.9.3 (iOS)"));
    assert_eq!(format, FormatTag::Singbox);
    let rendered = render(format, &subscriber, &assignments, &options).unwrap();
    assert_eq!(rendered.file_extension, "json");
    assert!(serde_json::from_str::<Value>(&rendered.body).is_ok());

    let format = classify(None);
    let rendered = render(format, &subscriber, &assignments, &options).unwrap();
    assert_eq!(rendered.format, FormatTag::V2ray);
    assert_eq!(decode_list(&rendered.body).len(), 6);
}

#[test]
fn test_end_to_end_empty_results() {
    let (subscriber, _) = load();

    assert_eq!(
        build_subscription(&subscriber, &[]),
        Err(EmptyResultError::NoProxies)
    );
    assert_eq!(
        build_client_config(&subscriber, &[]),
        Err(EmptyResultError::NoProxies)
    );
    let err = build_profiles(&[], &PeerProfileOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "No active WireGuard configurations found");
}
