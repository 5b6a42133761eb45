use crate::error::EmptyResultError;
use crate::links::encode_link;
use crate::model::{Assignment, Subscriber, active_endpoints};
use base64::prelude::*;
use log::debug;

/// Share links for every active assignment, in assignment order.
pub fn collect_links(subscriber: &Subscriber, assignments: &[Assignment]) -> Vec<String> {
    let mut links = Vec::new();

    for endpoint in active_endpoints(assignments) {
        match encode_link(subscriber, endpoint) {
            Some(link) => links.push(link),
            None => debug!(
                "Skipping {} endpoint {} on port {}: no share link",
                endpoint.protocol, endpoint.tag, endpoint.port
            ),
        }
    }

    links
}

/// Generic "v2ray" subscription body: newline-joined links, base64-encoded as
/// a single blob.
pub fn build_subscription(
    subscriber: &Subscriber,
    assignments: &[Assignment],
) -> Result<String, EmptyResultError> {
    let links = collect_links(subscriber, assignments);
    if links.is_empty() {
        return Err(EmptyResultError::NoProxies);
    }

    Ok(BASE64_STANDARD.encode(links.join("\n")))
}
