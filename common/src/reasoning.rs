//! Optional read-side split of a model's "thinking" preamble from its answer.
//!
//! Reasoning models emit their chain of thought inside `<think>...</think>`
//! before the answer. Nothing here touches stored text: callers apply it to a
//! finished response when presenting it.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*<think>(.*?)</think>\s*").expect("think block pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub answer: String,
}

pub fn split_reasoning(text: &str) -> SplitResponse {
    match THINK_BLOCK.captures(text) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let reasoning = caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            SplitResponse {
                reasoning,
                answer: text[whole..].to_string(),
            }
        }
        None => SplitResponse {
            reasoning: None,
            answer: text.to_string(),
        },
    }
}
