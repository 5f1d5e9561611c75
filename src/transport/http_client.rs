//! Shared reqwest client construction for HTTP based transports.

use std::time::Duration;

use reqwest::Client;

use super::TransportError;

const USER_AGENT: &str = concat!("synapse-notification-service/", env!("CARGO_PKG_VERSION"));

/// Build a client with the per-attempt timeout and an optional proxy.
pub fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<Client, TransportError> {
    let mut builder = Client::builder().timeout(timeout).user_agent(USER_AGENT);

    // Only the channel's own proxy applies, never the process environment
    match proxy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| TransportError::InvalidProxy(format!("{}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        None => builder = builder.no_proxy(),
    }

    Ok(builder.build()?)
}

/// Keep error bodies short enough for a delivery log row
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
