use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    V2ray,
    Clash,
    Singbox,
    Wireguard,
    Mieru,
}

// Checked in order; the first group with a matching needle wins.
const SIGNATURES: &[(FormatTag, &[&str])] = &[
    (FormatTag::Clash, &["clash", "stash", "clashx"]),
    (
        FormatTag::Singbox,
        &["sing-box", "sfa", "sfi", "hiddify", "hiddifynext"],
    ),
    (
        FormatTag::V2ray,
        &["v2ray", "v2rayn", "v2rayng", "shadowrocket"],
    ),
    (FormatTag::Wireguard, &["wireguard"]),
    (FormatTag::Mieru, &["mieru"]),
];

/// Picks the output format for a client from its User-Agent.
pub fn classify(user_agent: Option<&str>) -> FormatTag {
    let ua = match user_agent.map(str::trim) {
        Some(ua) if !ua.is_empty() => ua.to_lowercase(),
        _ => return FormatTag::V2ray,
    };

    SIGNATURES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| ua.contains(needle)))
        .map(|(tag, _)| *tag)
        .unwrap_or(FormatTag::V2ray)
}

impl FormatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::V2ray => "v2ray",
            FormatTag::Clash => "clash",
            FormatTag::Singbox => "singbox",
            FormatTag::Wireguard => "wireguard",
            FormatTag::Mieru => "mieru",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FormatTag::V2ray | FormatTag::Wireguard => "text/plain; charset=utf-8",
            FormatTag::Clash => "text/yaml; charset=utf-8",
            FormatTag::Singbox | FormatTag::Mieru => "application/json; charset=utf-8",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            FormatTag::V2ray => "txt",
            FormatTag::Clash => "yaml",
            FormatTag::Singbox | FormatTag::Mieru => "json",
            FormatTag::Wireguard => "conf",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v2ray" => Ok(FormatTag::V2ray),
            "clash" => Ok(FormatTag::Clash),
            "singbox" | "sing-box" => Ok(FormatTag::Singbox),
            "wireguard" => Ok(FormatTag::Wireguard),
            "mieru" => Ok(FormatTag::Mieru),
            other => Err(format!("unknown format: {}", other)),
        }
    }
}
