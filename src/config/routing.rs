use serde_json::{Value, json};

pub const SELECTOR_TAG: &str = "proxy";
pub const URLTEST_TAG: &str = "auto";
pub const URLTEST_URL: &str = "https://www.gstatic.com/generate_204";
pub const URLTEST_INTERVAL: &str = "3m";
pub const URLTEST_TOLERANCE: u32 = 50;

/// The `proxy` selector and the `auto` latency tester wrapping the endpoint
/// outbounds.
pub fn group_outbounds(endpoint_tags: &[String]) -> Vec<Value> {
    let mut members = vec![URLTEST_TAG.to_string()];
    members.extend(endpoint_tags.iter().cloned());

    vec![
        json!({
            "type": "selector",
            "tag": SELECTOR_TAG,
            "outbounds": members,
            "default": URLTEST_TAG
        }),
        json!({
            "type": "urltest",
            "tag": URLTEST_TAG,
            "outbounds": endpoint_tags,
            "url": URLTEST_URL,
            "interval": URLTEST_INTERVAL,
            "tolerance": URLTEST_TOLERANCE
        }),
    ]
}

pub fn utility_outbounds() -> Vec<Value> {
    vec![
        json!({ "type": "direct", "tag": "direct" }),
        json!({ "type": "block", "tag": "block" }),
        json!({ "type": "dns", "tag": "dns-out" }),
    ]
}

/// Remote resolver over the proxy, local resolver for `geosite:cn`.
pub fn generate_dns() -> Value {
    json!({
        "servers": [
            {
                "tag": "dns-remote",
                "address": "tls://8.8.8.8",
                "detour": SELECTOR_TAG
            },
            {
                "tag": "dns-local",
                "address": "223.5.5.5",
                "detour": "direct"
            }
        ],
        "rules": [
            {
                "geosite": ["cn"],
                "server": "dns-local"
            }
        ],
        "final": "dns-remote",
        "strategy": "prefer_ipv4"
    })
}

pub fn generate_route() -> Value {
    let rules = vec![
        // DNS queries are answered by the dns outbound
        json!({
            "protocol": "dns",
            "outbound": "dns-out"
        }),
        // Local IPs go direct
        json!({
            "ip_cidr": [
                "127.0.0.0/8",
                "10.0.0.0/8",
                "172.16.0.0/12",
                "192.168.0.0/16",
                "169.254.0.0/16",
                "::1/128",
                "fc00::/7",
                "fe80::/10"
            ],
            "outbound": "direct"
        }),
    ];

    json!({
        "rules": rules,
        "final": SELECTOR_TAG,
        "auto_detect_interface": true
    })
}
