//! Anthropic-style chat-completion wire format, grounded on
//! `rlm-core::llm::client`'s `AnthropicRequest`/`AnthropicResponse` shapes,
//! extended with the `tools` array and `tool_use` content-block parsing the
//! teacher's `StopReason::ToolUse` variant anticipated but never consumed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system: String,
    pub messages: Vec<RequestMessage>,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

/// The three tool schemas the advisor may invoke, in the shape Anthropic's
/// `tools` field expects (`name` + JSON Schema `input_schema`).
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "suggest_dna_mutation".to_string(),
            description: "Propose a shallow patch to one gene of the target's behavioral DNA.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "gene": {"type": "string", "enum": ["identity", "timing", "network", "interaction", "capabilities"]},
                    "change": {"type": "object"},
                    "reason": {"type": "string"},
                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "riskLevel": {"type": "string", "enum": ["low", "medium", "high"]}
                },
                "required": ["gene", "change", "reason", "confidence", "riskLevel"]
            }),
        },
        Tool {
            name: "evaluate_trust_status".to_string(),
            description: "Report the advisor's own read of the target's current trust status.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "trustScore": {"type": "integer", "minimum": 0, "maximum": 100},
                    "signals": {"type": "array", "items": {"type": "string"}},
                    "recommendation": {"type": "string"},
                    "shouldContinue": {"type": "boolean"}
                },
                "required": ["trustScore", "signals", "recommendation", "shouldContinue"]
            }),
        },
        Tool {
            name: "determine_strategy".to_string(),
            description: "Recommend the next course of action for the crawl session.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["continue", "pause", "adapt", "retreat", "accelerate"]},
                    "reason": {"type": "string"},
                    "parameters": {"type": "object"}
                },
                "required": ["action", "reason"]
            }),
        },
    ]
}
