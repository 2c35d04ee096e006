//! LLM-based complexity classification for ambiguous requests.
//!
//! Invoked only when the heuristics are not confident. Every failure mode
//! (no model, network error, bad JSON) collapses into
//! [`ClassifierOutcome::Unavailable`]; this path never returns an error.

use std::time::Duration;

use crate::api::ChatMessage;
use crate::backend::BackendClient;
use crate::config::RouterConfig;
use crate::registry::{ModelRegistry, Tier};

/// Bound on the classifier call so a misbehaving model cannot stall the
/// routing decision.
const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// Transcript cap in characters; beyond it the opening context and the
/// most recent turns are kept.
const MAX_TRANSCRIPT_CHARS: usize = 2000;
const TRANSCRIPT_HEAD_CHARS: usize = 500;
const TRANSCRIPT_TAIL_CHARS: usize = 1500;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are a request complexity classifier. Given a user's conversation with an AI assistant, \
classify the complexity of the LATEST user request into one of three tiers:

1 = SIMPLE: Short factual questions, translations, simple formatting, yes/no questions, \
basic lookups, trivial code fixes.
2 = MEDIUM: Standard coding tasks, summarization of longer texts, moderate analysis, \
explanations of concepts, typical chat interactions.
3 = COMPLEX: Multi-step reasoning, architecture design, complex debugging, in-depth analysis, \
creative writing with specific constraints, tasks requiring deep domain expertise.

Respond with ONLY a JSON object: {\"tier\": 1|2|3, \"reason\": \"brief explanation\"}";

/// Outcome of a classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierOutcome {
    /// The classifier model returned a tier judgment.
    Classified { tier: Tier, reason: String },
    /// Classification could not be performed; callers treat this as
    /// MEDIUM.
    Unavailable { reason: String },
}

impl ClassifierOutcome {
    /// Resolve to a tier, mapping `Unavailable` to the safe default.
    pub fn tier(&self) -> Tier {
        match self {
            Self::Classified { tier, .. } => *tier,
            Self::Unavailable { .. } => Tier::Medium,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Classified { reason, .. } | Self::Unavailable { reason } => reason,
        }
    }
}

/// Ask a small backend model to classify the complexity of a request.
pub async fn classify_complexity(
    messages: &[ChatMessage],
    registry: &ModelRegistry,
    backend: &BackendClient,
    cfg: &RouterConfig,
) -> ClassifierOutcome {
    let Some(classifier_model) = select_classifier_model(registry, cfg) else {
        tracing::warn!("no models available for classification, defaulting to MEDIUM");
        return ClassifierOutcome::Unavailable {
            reason: "no classifier model available".to_string(),
        };
    };

    let condensed = condense_messages(messages);
    let body = serde_json::json!({
        "model": classifier_model,
        "messages": [
            {"role": "system", "content": CLASSIFIER_SYSTEM_PROMPT},
            {"role": "user", "content": condensed},
        ],
        "temperature": 0.0,
        "max_tokens": 100,
    });

    let reply = match backend.chat_completion(&body, CLASSIFY_TIMEOUT).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(model = %classifier_model, error = %e, "classifier call failed, defaulting to MEDIUM");
            return ClassifierOutcome::Unavailable {
                reason: "classifier error, defaulting to medium".to_string(),
            };
        }
    };

    let content = reply["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default();
    match parse_classifier_reply(content) {
        Some((tier, reason)) => {
            tracing::info!(model = %classifier_model, tier = %tier, reason = %reason, "classifier result");
            ClassifierOutcome::Classified { tier, reason }
        }
        None => {
            tracing::error!(model = %classifier_model, content, "unparseable classifier reply, defaulting to MEDIUM");
            ClassifierOutcome::Unavailable {
                reason: "classifier error, defaulting to medium".to_string(),
            }
        }
    }
}

/// Pick the classifier model: configured id, else the smallest SMALL-tier
/// model, else the smallest model overall.
fn select_classifier_model(registry: &ModelRegistry, cfg: &RouterConfig) -> Option<String> {
    if let Some(configured) = &cfg.routing.classifier_model {
        return Some(configured.clone());
    }

    let smallest = |models: Vec<&crate::registry::ModelInfo>| {
        models
            .into_iter()
            .min_by(|a, b| {
                a.effective_params()
                    .partial_cmp(&b.effective_params())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|m| m.id.clone())
    };

    smallest(registry.by_tier(Tier::Small)).or_else(|| smallest(registry.models().collect()))
}

/// Parse the classifier's JSON reply, tolerating a wrapping code fence.
fn parse_classifier_reply(content: &str) -> Option<(Tier, String)> {
    let mut text = content.trim();
    if text.starts_with("```") {
        text = text.trim_matches('`').trim();
        text = text.strip_prefix("json").unwrap_or(text).trim();
    }

    #[derive(serde::Deserialize)]
    struct Reply {
        tier: i64,
        #[serde(default)]
        reason: String,
    }

    let reply: Reply = serde_json::from_str(text).ok()?;
    Some((Tier::from_index(reply.tier), reply.reason))
}

/// Condense a conversation into a `role: text` transcript, bounded to
/// [`MAX_TRANSCRIPT_CHARS`] by keeping the head and the most recent tail.
fn condense_messages(messages: &[ChatMessage]) -> String {
    let full_text = messages
        .iter()
        .map(|m| {
            let role = if m.role.is_empty() { "unknown" } else { &m.role };
            format!("{}: {}", role, m.text().replace("[IMAGE]", "[image]"))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let chars: Vec<char> = full_text.chars().collect();
    if chars.len() <= MAX_TRANSCRIPT_CHARS {
        return full_text;
    }

    let head: String = chars[..TRANSCRIPT_HEAD_CHARS].iter().collect();
    let tail: String = chars[chars.len() - TRANSCRIPT_TAIL_CHARS..].iter().collect();
    format!("{head}\n...\n{tail}")
}
