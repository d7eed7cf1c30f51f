//! Outbound-request shaping and HTTP client construction (spec §4.5, §6).
//! The client-build shape — a `catch_unwind`-guarded builder falling back
//! to a no-proxy client — is lifted from
//! `rlm-core::llm::client::build_http_client`'s guard against the sandboxed
//! macOS proxy-autodetect panic, generalized here to also wire in the
//! crawl-traffic SOCKS upstream and the inspection-proxy TLS toggle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::dna::Dna;
use crate::error::{Error, Result};

/// Builds the shared `reqwest::Client` used for crawl traffic, honoring an
/// optional SOCKS5 upstream and the inspection-proxy TLS-verification
/// toggle (spec §6).
pub fn build_http_client(config: &EngineConfig) -> Result<Client> {
    let timeout = Duration::from_millis(config.request_timeout_ms);
    let accept_invalid_certs = config.inspection_proxy.is_some();
    let proxy_url = config.proxy.as_ref().map(|p| p.url());

    let build = || -> std::result::Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs);
        if let Some(url) = &proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        builder.build()
    };

    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(Error::Config(format!("failed to build HTTP client: {e}"))),
        Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| Error::Config(format!("failed to build fallback HTTP client: {e}"))),
    }
}

/// The ordered header set an outbound request carries (spec §6: "all
/// outbound requests carry the full DNA header set in the order defined by
/// `network.headerOrder`"). Returns both the `HeaderMap` reqwest needs and
/// an explicit ordered pair list for the `RequestLog`, since `HeaderMap`
/// itself does not preserve or guarantee wire order (documented in
/// DESIGN.md).
pub fn ordered_headers(dna: &Dna) -> (HeaderMap, Vec<(String, String)>) {
    let net = &dna.network;
    let mut by_name: std::collections::HashMap<&str, &str> =
        net.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let mut ordered_pairs: Vec<(String, String)> = Vec::with_capacity(net.headers.len() + 2);
    for name in &net.header_order {
        if let Some(value) = by_name.remove(name.as_str()) {
            ordered_pairs.push((name.clone(), value.to_string()));
        }
    }
    // Headers present but not named in header_order still go out, appended
    // after the ordered set, rather than silently dropped.
    for (k, v) in &net.headers {
        if ordered_pairs.iter().any(|(name, _)| name == k) {
            continue;
        }
        ordered_pairs.push((k.clone(), v.clone()));
    }

    if !ordered_pairs.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent")) {
        ordered_pairs.push(("User-Agent".to_string(), dna.identity.user_agent.clone()));
    }
    if !ordered_pairs.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept-language")) {
        ordered_pairs.push(("Accept-Language".to_string(), dna.identity.language.clone()));
    }

    let mut header_map = HeaderMap::with_capacity(ordered_pairs.len());
    for (name, value) in &ordered_pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            header_map.insert(name, value);
        }
    }

    (header_map, ordered_pairs)
}

/// JSON view of the request headers persisted on the `RequestLog`, plus the
/// TLS-fingerprint hint the wire protocol itself cannot carry (reqwest has
/// no JA3-shaping hook; recorded as metadata only, per DESIGN.md).
pub fn request_headers_json(dna: &Dna, ordered_pairs: &[(String, String)]) -> Value {
    serde_json::json!({
        "headers": ordered_pairs,
        "tls_fingerprint_hint": dna.network.tls_fingerprint,
        "http_version_hint": dna.network.http_version,
        "ja3_hash": dna.network.ja3_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_emit_in_header_order_first() {
        let dna = Dna::default();
        let (_, pairs) = ordered_headers(&dna);
        let names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(&names[..dna.network.header_order.len()], dna.network.header_order.as_slice());
    }

    #[test]
    fn user_agent_and_accept_language_always_present() {
        let dna = Dna::default();
        let (map, _) = ordered_headers(&dna);
        assert!(map.contains_key("user-agent"));
        assert!(map.contains_key("accept-language"));
    }

    #[test]
    fn headers_outside_order_still_go_out() {
        let mut dna = Dna::default();
        dna.network.headers.push(("X-Custom".to_string(), "1".to_string()));
        let (map, pairs) = ordered_headers(&dna);
        assert!(map.contains_key("x-custom"));
        assert!(pairs.iter().any(|(k, _)| k == "X-Custom"));
    }
}
