use crate::config::build_client_config;
use crate::error::EmptyResultError;
use crate::format::FormatTag;
use crate::model::{Assignment, Subscriber};
use crate::subscription::build_subscription;
use crate::wireguard::{PeerProfileOptions, build_profiles};
use log::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub wireguard: PeerProfileOptions,
}

/// An encoded body plus the metadata the transport layer needs to serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub format: FormatTag,
    pub body: String,
    pub content_type: &'static str,
    pub file_extension: &'static str,
}

/// Runs the encoder for `format`. Formats without a native encoder are served
/// as the v2ray list.
pub fn render(
    format: FormatTag,
    subscriber: &Subscriber,
    assignments: &[Assignment],
    options: &SynthesisOptions,
) -> Result<Rendered, EmptyResultError> {
    let (format, body) = match format {
        FormatTag::V2ray => (format, build_subscription(subscriber, assignments)?),
        FormatTag::Singbox => {
            let config = build_client_config(subscriber, assignments)?;
            // Value serialization cannot fail: keys are always strings
            let body = serde_json::to_string_pretty(&config).unwrap_or_default();
            (format, body)
        }
        FormatTag::Wireguard => (format, build_profiles(assignments, &options.wireguard)?),
        FormatTag::Clash | FormatTag::Mieru => {
            debug!("No {} encoder, serving the v2ray list", format);
            (FormatTag::V2ray, build_subscription(subscriber, assignments)?)
        }
    };

    Ok(Rendered {
        format,
        body,
        content_type: format.content_type(),
        file_extension: format.file_extension(),
    })
}
