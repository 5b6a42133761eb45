use crate::error::EmptyResultError;
use crate::model::{Assignment, InboundEndpoint, Protocol, active_endpoints};
use log::debug;

pub const PERSISTENT_KEEPALIVE: u16 = 25;

/// Settings injected by the caller rather than read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerProfileOptions {
    pub dns: Vec<String>,
}

impl PeerProfileOptions {
    /// Parses a comma-separated DNS server list such as `1.1.1.1, 8.8.8.8`.
    pub fn with_dns_list(list: &str) -> Self {
        Self {
            dns: list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Key material and addressing of one usable WireGuard endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerProfile<'a> {
    pub endpoint: &'a InboundEndpoint,
    pub private_key: &'a str,
    pub address: String,
    pub mtu: Option<u16>,
    pub peer_public_key: &'a str,
    pub peer_endpoint: String,
    pub allowed_ips: &'a str,
}

impl PeerProfile<'_> {
    pub fn render(&self, options: &PeerProfileOptions) -> String {
        let mut lines = vec![
            "[Interface]".to_string(),
            format!("PrivateKey = {}", self.private_key),
            format!("Address = {}", self.address),
        ];
        if !options.dns.is_empty() {
            lines.push(format!("DNS = {}", options.dns.join(", ")));
        }
        if let Some(mtu) = self.mtu {
            lines.push(format!("MTU = {}", mtu));
        }

        lines.push(String::new());
        lines.push("[Peer]".to_string());
        lines.push(format!("PublicKey = {}", self.peer_public_key));
        lines.push(format!("Endpoint = {}", self.peer_endpoint));
        lines.push(format!("AllowedIPs = {}", self.allowed_ips));
        lines.push(format!("PersistentKeepalive = {}", PERSISTENT_KEEPALIVE));

        lines.join("\n")
    }
}

/// Deterministic per-position interface address so bundled profiles do not
/// collide.
pub fn default_address(index: usize) -> String {
    format!("10.66.{}.2/32", (index % 250) + 2)
}

/// Active WireGuard endpoints with complete key material. `index` for the
/// default address counts every active WireGuard endpoint, including the
/// ones that get dropped.
pub fn collect_peers(assignments: &[Assignment]) -> Vec<PeerProfile<'_>> {
    active_endpoints(assignments)
        .filter(|endpoint| endpoint.protocol == Protocol::Wireguard)
        .enumerate()
        .filter_map(|(index, endpoint)| resolve_peer(endpoint, index))
        .collect()
}

fn resolve_peer(endpoint: &InboundEndpoint, index: usize) -> Option<PeerProfile<'_>> {
    let Some(wg) = endpoint.wireguard.as_ref() else {
        debug!("Skipping wireguard endpoint {}: no wireguard settings", endpoint.tag);
        return None;
    };

    let Some(private_key) = wg.private_key.as_deref() else {
        debug!("Skipping wireguard endpoint {}: missing private key", endpoint.tag);
        return None;
    };

    let Some(peer_public_key) = wg.peer_public_key.as_deref() else {
        debug!("Skipping wireguard endpoint {}: missing peer public key", endpoint.tag);
        return None;
    };

    let peer_endpoint = match wg.peer_endpoint.as_deref() {
        Some(explicit) => explicit.to_string(),
        None if !endpoint.server_address.is_empty() && endpoint.port > 0 => {
            format!("{}:{}", endpoint.server_address, endpoint.port)
        }
        None => {
            debug!("Skipping wireguard endpoint {}: no peer endpoint", endpoint.tag);
            return None;
        }
    };

    Some(PeerProfile {
        endpoint,
        private_key,
        address: wg.address.clone().unwrap_or_else(|| default_address(index)),
        mtu: wg.mtu,
        peer_public_key,
        peer_endpoint,
        allowed_ips: wg.allowed_ips(),
    })
}

/// All usable WireGuard profiles, one INI block each, separated by a blank line.
pub fn build_profiles(
    assignments: &[Assignment],
    options: &PeerProfileOptions,
) -> Result<String, EmptyResultError> {
    let blocks: Vec<String> = collect_peers(assignments)
        .iter()
        .map(|peer| peer.render(options))
        .collect();

    if blocks.is_empty() {
        return Err(EmptyResultError::NoWireGuard);
    }

    Ok(blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WireGuardSettings;

    fn wg_assignment(port: u16, settings: WireGuardSettings) -> Assignment {
        let mut endpoint = InboundEndpoint::new(Protocol::Wireguard, "wg.example.com", port);
        endpoint.tag = format!("wg-{}", port);
        endpoint.wireguard = Some(settings);
        Assignment::new(endpoint)
    }

    fn keys() -> WireGuardSettings {
        WireGuardSettings {
            private_key: Some("cHJpdmF0ZQ==".to_string()),
            peer_public_key: Some("cHVibGlj".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_profile_layout() {
        let assignments = vec![wg_assignment(51820, keys())];

        let result = build_profiles(&assignments, &PeerProfileOptions::default());
        assert!(result.is_ok());

        assert_eq!(
            result.unwrap(),
            "[Interface]\n\
             PrivateKey = cHJpdmF0ZQ==\n\
             Address = 10.66.2.2/32\n\
             \n\
             [Peer]\n\
             PublicKey = cHVibGlj\n\
             Endpoint = wg.example.com:51820\n\
             AllowedIPs = 0.0.0.0/0, ::/0\n\
             PersistentKeepalive = 25"
        );
    }

    #[test]
    fn test_optional_lines() {
        let settings = WireGuardSettings {
            address: Some("10.0.0.5/32".to_string()),
            mtu: Some(1280),
            peer_endpoint: Some("203.0.113.7:443".to_string()),
            allowed_ips: Some("10.0.0.0/8".to_string()),
            ..keys()
        };
        let assignments = vec![wg_assignment(51820, settings)];
        let options = PeerProfileOptions::with_dns_list("1.1.1.1, ,8.8.8.8");

        let profile = build_profiles(&assignments, &options).unwrap();
        assert!(profile.contains("Address = 10.0.0.5/32\nDNS = 1.1.1.1, 8.8.8.8\nMTU = 1280\n\n[Peer]"));
        assert!(profile.contains("Endpoint = 203.0.113.7:443"));
        assert!(profile.contains("AllowedIPs = 10.0.0.0/8"));
    }

    #[test]
    fn test_incomplete_endpoints_are_dropped() {
        let no_private = WireGuardSettings {
            private_key: None,
            ..keys()
        };
        let no_peer = WireGuardSettings {
            peer_public_key: None,
            ..keys()
        };
        let assignments = vec![
            wg_assignment(1, no_private),
            wg_assignment(2, no_peer),
            wg_assignment(3, keys()),
        ];

        let profile = build_profiles(&assignments, &PeerProfileOptions::default()).unwrap();
        assert_eq!(profile.matches("[Interface]").count(), 1);
        // position 2 in the filtered list
        assert!(profile.contains("Address = 10.66.4.2/32"));
    }

    #[test]
    fn test_blocks_are_separated_by_blank_line() {
        let assignments = vec![wg_assignment(1, keys()), wg_assignment(2, keys())];

        let profile = build_profiles(&assignments, &PeerProfileOptions::default()).unwrap();
        let blocks: Vec<&str> = profile.split("\n\n[Interface]").collect();
        assert_eq!(blocks.len(), 2);
        assert!(profile.contains("Address = 10.66.2.2/32"));
        assert!(profile.contains("Address = 10.66.3.2/32"));
    }

    #[test]
    fn test_non_wireguard_and_disabled_are_ignored() {
        let mut disabled = wg_assignment(51820, keys());
        disabled.enabled = false;
        let other = Assignment::new(InboundEndpoint::new(Protocol::Vless, "vpn.example.com", 443));

        assert_eq!(
            build_profiles(&[disabled, other], &PeerProfileOptions::default()),
            Err(EmptyResultError::NoWireGuard)
        );
    }

    #[test]
    fn test_default_address_wraps() {
        assert_eq!(default_address(0), "10.66.2.2/32");
        assert_eq!(default_address(249), "10.66.251.2/32");
        assert_eq!(default_address(250), "10.66.2.2/32");
    }
}
