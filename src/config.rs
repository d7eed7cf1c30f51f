//! Engine configuration surface (spec §6).
//!
//! The core never reads environment variables or files itself — the
//! embedding host builds an [`EngineConfig`] and hands it in, the same
//! separation `rlm-core::llm::client::ClientConfig` draws between "how to
//! build a client" and "where the value came from."

use serde::{Deserialize, Serialize};

/// Upstream SOCKS proxy for outbound crawl traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
    Socks5,
}

impl ProxyConfig {
    /// Render as a `reqwest::Proxy`-compatible URL.
    pub fn url(&self) -> String {
        match self.kind {
            ProxyKind::Socks5 => format!("socks5://{}:{}", self.host, self.port),
        }
    }
}

/// Optional traffic-inspection backend. The core only carries the
/// connection details through; it has no opinion on the inspection
/// protocol itself (out of scope per spec §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionProxyConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
}

/// Advisor sampling and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Absent => the bridge operates in offline/fallback mode.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_ms: 30_000,
        }
    }
}

impl AdvisorConfig {
    /// Sampling temperature clamped to the spec's "low temperature (<= 0.3)" bound.
    pub fn clamped_temperature(&self) -> f64 {
        self.temperature.clamp(0.0, 0.3)
    }
}

/// Top-level configuration for the engine, covering every row of spec §6's
/// configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub advisor: AdvisorConfig,
    pub request_timeout_ms: u64,
    pub proxy: Option<ProxyConfig>,
    pub inspection_proxy: Option<InspectionProxyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            advisor: AdvisorConfig::default(),
            request_timeout_ms: 15_000,
            proxy: None,
            inspection_proxy: None,
        }
    }
}
