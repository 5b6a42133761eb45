pub mod outbound;
pub mod routing;

use crate::error::EmptyResultError;
use crate::model::{Assignment, Subscriber};
use serde_json::{Value, json};

/// Builds the Sing-box client document for one subscriber:
/// `{log, dns, inbounds, outbounds, route}`.
pub fn build_client_config(
    subscriber: &Subscriber,
    assignments: &[Assignment],
) -> Result<Value, EmptyResultError> {
    let endpoint_outbounds = outbound::generate_outbounds(subscriber, assignments);
    if endpoint_outbounds.is_empty() {
        return Err(EmptyResultError::NoProxies);
    }

    let tags: Vec<String> = endpoint_outbounds
        .iter()
        .filter_map(|o| o["tag"].as_str().map(String::from))
        .collect();

    let mut outbounds = routing::group_outbounds(&tags);
    outbounds.extend(endpoint_outbounds);
    outbounds.extend(routing::utility_outbounds());

    Ok(json!({
        "log": {
            "level": "warn",
            "timestamp": true
        },
        "dns": routing::generate_dns(),
        "inbounds": generate_inbounds(),
        "outbounds": outbounds,
        "route": routing::generate_route()
    }))
}

fn generate_inbounds() -> Value {
    json!([
        {
            "type": "tun",
            "tag": "tun-in",
            "inet4_address": "172.19.0.1/30",
            "auto_route": true,
            "strict_route": true,
            "stack": "system",
            "sniff": true
        },
        {
            "type": "mixed",
            "tag": "mixed-in",
            "listen": "127.0.0.1",
            "listen_port": 2080,
            "sniff": true
        }
    ])
}
