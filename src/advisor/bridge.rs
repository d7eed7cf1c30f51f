//! Ties the HTTP client, tool schemas, cache, and offline fallback together
//! into a single `analyze` entry point (spec §4.4).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::advisor::cache::AdvisorCache;
use crate::advisor::fallback;
use crate::advisor::protocol::{tool_definitions, AnthropicRequest, AnthropicResponse, ContentBlock, RequestMessage};
use crate::advisor::types::{
    AdvisorResponse, Context, StrategyAction, StrategyDetermination, SuggestedMutation,
    TrustStatusEvaluation,
};
use crate::config::AdvisorConfig;
use crate::dna::mutator::MutationSeverity;
use crate::dna::Gene;
use crate::error::{Error, Result};

const API_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Minimum capability tier the advisor model must advertise. A string-match
/// gate, as the spec allows: anything below "sonnet" or "opus" is rejected.
const CAPABLE_MODEL_MARKERS: &[&str] = &["sonnet", "opus"];

fn build_http_client(timeout_ms: u64) -> Client {
    let timeout = Duration::from_millis(timeout_ms);
    match catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build())) {
        Ok(Ok(client)) => client,
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .expect("failed to build fallback HTTP client"),
    }
}

fn check_model_capability(model: &str) -> Result<()> {
    let lower = model.to_lowercase();
    if CAPABLE_MODEL_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Ok(())
    } else {
        Err(Error::ModelUnsupported(format!(
            "model '{model}' does not meet the minimum capability tier"
        )))
    }
}

fn render_prompt(context: &Context) -> String {
    serde_json::to_string_pretty(context).unwrap_or_else(|_| context.target_summary.clone())
}

/// Invokes the external advisor and parses its structured tool calls, or
/// synthesizes a deterministic offline response when unconfigured.
pub struct AdvisorBridge {
    config: AdvisorConfig,
    http: Client,
    cache: AdvisorCache,
}

impl AdvisorBridge {
    pub fn new(config: AdvisorConfig) -> Self {
        let http = build_http_client(config.timeout_ms);
        Self {
            config,
            http,
            cache: AdvisorCache::with_default_ttl(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// `Analyze(context) -> Response`. Never fails the caller's loop: a
    /// network/API error surfaces as `AdvisorUnavailable`, which the Crawl
    /// Engine treats as non-fatal.
    #[instrument(skip(self, context), fields(model = %self.config.model, current_trust_score))]
    pub async fn analyze(&self, context: &Context, current_trust_score: i32) -> Result<AdvisorResponse> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            debug!("no advisor credentials configured, using offline fallback");
            return Ok(fallback::synthesize(current_trust_score, context.dna.timing.delay_range_ms));
        };

        check_model_capability(&self.config.model)?;

        let digest = AdvisorCache::digest(context);
        if let Some(cached) = self.cache.get(&digest) {
            debug!("advisor response served from cache");
            return Ok(cached);
        }

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.clamped_temperature(),
            system: "You advise an adaptive web crawler on trust status and DNA mutation. \
                     Use the provided tools to respond; do not write prose."
                .to_string(),
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: render_prompt(context),
            }],
            tools: tool_definitions(),
        };

        let url = format!("{API_BASE_URL}/v1/messages");
        let response = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::advisor_unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::advisor_unavailable(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(%status, "advisor returned a non-success status");
            return Err(Error::advisor_unavailable(format!(
                "advisor returned status {status}: {body}"
            )));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| Error::advisor_unavailable(format!("malformed advisor response: {e}")))?;

        let result = parse_tool_calls(&parsed)?;
        debug!(mutations = result.mutations.len(), "advisor response parsed");
        self.cache.put(digest, result.clone());
        Ok(result)
    }
}

/// Parses tool-use content blocks, validating each against its schema.
/// Schema violations discard only the offending call rather than the whole
/// response (spec §4.4).
fn parse_tool_calls(response: &AnthropicResponse) -> Result<AdvisorResponse> {
    let mut mutations = Vec::new();
    let mut trust_status = None;
    let mut strategy = None;

    for block in &response.content {
        let ContentBlock::ToolUse { name, input, .. } = block else {
            continue;
        };
        match name.as_str() {
            "suggest_dna_mutation" => match parse_mutation(input) {
                Ok(mutation) => mutations.push(mutation),
                Err(_) => continue,
            },
            "evaluate_trust_status" => match parse_trust_status(input) {
                Ok(eval) => trust_status = Some(eval),
                Err(_) => continue,
            },
            "determine_strategy" => match parse_strategy(input) {
                Ok(det) => strategy = Some(det),
                Err(_) => continue,
            },
            _ => continue,
        }
    }

    Ok(AdvisorResponse {
        mutations,
        trust_status,
        strategy,
        mock: false,
    })
}

fn parse_mutation(input: &serde_json::Value) -> Result<SuggestedMutation> {
    let gene = input
        .get("gene")
        .and_then(|v| v.as_str())
        .and_then(Gene::parse)
        .ok_or_else(|| Error::advisor_protocol_error("suggest_dna_mutation: missing or unknown gene"))?;
    let change = input
        .get("change")
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| Error::advisor_protocol_error("suggest_dna_mutation: missing change object"))?;
    let reason = input
        .get("reason")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::advisor_protocol_error("suggest_dna_mutation: missing reason"))?
        .to_string();
    let confidence = input
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| Error::advisor_protocol_error("suggest_dna_mutation: missing confidence"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(Error::advisor_protocol_error("suggest_dna_mutation: confidence out of range"));
    }
    let risk_level = input
        .get("riskLevel")
        .and_then(|v| v.as_str())
        .and_then(MutationSeverity::parse)
        .ok_or_else(|| Error::advisor_protocol_error("suggest_dna_mutation: missing or unknown riskLevel"))?;

    Ok(SuggestedMutation {
        gene,
        change,
        reason,
        confidence,
        risk_level,
    })
}

fn parse_trust_status(input: &serde_json::Value) -> Result<TrustStatusEvaluation> {
    let trust_score = input
        .get("trustScore")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::advisor_protocol_error("evaluate_trust_status: missing trustScore"))?
        as i32;
    if !(0..=100).contains(&trust_score) {
        return Err(Error::advisor_protocol_error("evaluate_trust_status: trustScore out of range"));
    }
    let signals = input
        .get("signals")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let recommendation = input
        .get("recommendation")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::advisor_protocol_error("evaluate_trust_status: missing recommendation"))?
        .to_string();
    let should_continue = input
        .get("shouldContinue")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| Error::advisor_protocol_error("evaluate_trust_status: missing shouldContinue"))?;

    Ok(TrustStatusEvaluation {
        trust_score,
        signals,
        recommendation,
        should_continue,
    })
}

fn parse_strategy(input: &serde_json::Value) -> Result<StrategyDetermination> {
    let action = input
        .get("action")
        .and_then(|v| v.as_str())
        .and_then(StrategyAction::parse)
        .ok_or_else(|| Error::advisor_protocol_error("determine_strategy: missing or unknown action"))?;
    let reason = input
        .get("reason")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::advisor_protocol_error("determine_strategy: missing reason"))?
        .to_string();
    let parameters = input.get("parameters").cloned();

    Ok(StrategyDetermination {
        action,
        reason,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_gate_rejects_haiku() {
        assert!(check_model_capability("claude-3-5-haiku-20241022").is_err());
    }

    #[test]
    fn capability_gate_accepts_sonnet_and_opus() {
        assert!(check_model_capability("claude-3-5-sonnet-20241022").is_ok());
        assert!(check_model_capability("claude-3-opus-20240229").is_ok());
    }

    #[test]
    fn parses_a_well_formed_mutation_tool_call() {
        let input = serde_json::json!({
            "gene": "network",
            "change": {"headers": {"Accept-Language": "en-US"}},
            "reason": "blend in",
            "confidence": 0.8,
            "riskLevel": "low"
        });
        let mutation = parse_mutation(&input).unwrap();
        assert_eq!(mutation.gene, Gene::Network);
        assert_eq!(mutation.risk_level, MutationSeverity::Low);
    }

    #[test]
    fn rejects_mutation_with_confidence_out_of_range() {
        let input = serde_json::json!({
            "gene": "network",
            "change": {},
            "reason": "x",
            "confidence": 1.5,
            "riskLevel": "low"
        });
        assert!(parse_mutation(&input).is_err());
    }

    #[test]
    fn discards_only_the_offending_tool_call() {
        let response = AnthropicResponse {
            stop_reason: crate::advisor::protocol::StopReason::ToolUse,
            content: vec![
                ContentBlock::ToolUse {
                    id: "1".to_string(),
                    name: "suggest_dna_mutation".to_string(),
                    input: serde_json::json!({
                        "gene": "timing",
                        "change": {},
                        "reason": "slow down",
                        "confidence": 0.6,
                        "riskLevel": "low"
                    }),
                },
                ContentBlock::ToolUse {
                    id: "2".to_string(),
                    name: "evaluate_trust_status".to_string(),
                    input: serde_json::json!({ "trustScore": 999 }),
                },
            ],
        };
        let parsed = parse_tool_calls(&response).unwrap();
        assert_eq!(parsed.mutations.len(), 1);
        assert!(parsed.trust_status.is_none());
    }
}
