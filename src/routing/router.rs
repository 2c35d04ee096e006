//! Routing orchestrator: picks a backend model for a request.
//!
//! Explicit model requests bypass scoring entirely; otherwise the
//! heuristic score decides the tier, escalating to the LLM classifier when
//! the score sits too close to a threshold.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::api::ChatMessage;
use crate::backend::BackendClient;
use crate::config::RouterConfig;
use crate::error::RoutingError;
use crate::registry::{ModelInfo, ModelRegistry, Tier};
use crate::routing::classifier::{ClassifierOutcome, classify_complexity};
use crate::routing::heuristics::score_request;

lazy_static! {
    // Code-related indicators, checked against the last three user
    // messages to decide coder preference.
    static ref CODE_INDICATORS: Regex = Regex::new(concat!(
        r"(?i)\b(code|function|class|implement|bug|error|exception|stacktrace|",
        r"api|endpoint|database|query|sql|html|css|javascript|python|",
        r"typescript|rust|golang|java|refactor|test|unittest|",
        r"implementiere|debugge|Quellcode|Quelltext|Programmier|kompilier|",
        r"Algorithmus|Algorithmen|Skript)\b"
    ))
    .unwrap();
    static ref CODE_FENCE: Regex = Regex::new(r"```").unwrap();
}

/// How the routing decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMethod {
    /// Caller named a model that exists; scoring was bypassed.
    Explicit,
    /// Heuristic score was confident.
    Heuristic,
    /// Heuristics were inconclusive; the LLM classifier decided.
    Classifier,
}

impl RoutingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Heuristic => "heuristic",
            Self::Classifier => "classifier",
        }
    }
}

/// Audit record for one routing decision. Output-only, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    #[serde(rename = "routing")]
    pub method: RoutingMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_model: Option<String>,
    #[serde(rename = "heuristic_score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "heuristic_reasons", skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_coder: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_reason: Option<String>,
}

impl RoutingDecision {
    /// Tier name for the response header; empty for explicit routing.
    pub fn tier_header(&self) -> &str {
        self.tier.as_deref().unwrap_or("")
    }
}

/// Map a confident heuristic score to a tier.
fn score_to_tier(score: f64, cfg: &RouterConfig) -> Tier {
    if score <= cfg.routing.heuristic_low_threshold {
        Tier::Small
    } else if score >= cfg.routing.heuristic_high_threshold {
        Tier::Large
    } else {
        Tier::Medium
    }
}

/// Whether the request looks programming-related: a code indicator keyword
/// or fenced code block in any of the last three user messages.
fn is_coding_request(messages: &[ChatMessage]) -> bool {
    messages
        .iter()
        .filter(|m| m.role == "user")
        .rev()
        .take(3)
        .map(ChatMessage::text)
        .any(|text| CODE_INDICATORS.is_match(&text) || CODE_FENCE.is_match(&text))
}

/// Determine the best model for a request against a registry snapshot.
///
/// Returns the selected model and the audit record. The only error is an
/// empty registry; classifier failures degrade to MEDIUM internally.
pub async fn route_request(
    messages: &[ChatMessage],
    tools: Option<&[serde_json::Value]>,
    requested_model: Option<&str>,
    registry: &ModelRegistry,
    backend: &BackendClient,
    cfg: &RouterConfig,
) -> Result<(ModelInfo, RoutingDecision), RoutingError> {
    // Explicitly requested models that exist are honored unconditionally.
    if let Some(requested) = requested_model {
        if let Some(model) = registry.get(requested) {
            return Ok((
                model.clone(),
                RoutingDecision {
                    method: RoutingMethod::Explicit,
                    requested_model: Some(requested.to_string()),
                    score: None,
                    reasons: Vec::new(),
                    tier: None,
                    selected_model: None,
                    prefer_coder: None,
                    classifier_reason: None,
                },
            ));
        }
    }

    let heuristic = score_request(messages, tools, &cfg.routing);
    tracing::info!(
        score = heuristic.score,
        confident = heuristic.confident,
        reasons = ?heuristic.reasons,
        "heuristic score"
    );

    let (tier, method, classifier_reason) = if heuristic.confident {
        (score_to_tier(heuristic.score, cfg), RoutingMethod::Heuristic, None)
    } else {
        let outcome = classify_complexity(messages, registry, backend, cfg).await;
        let reason = match &outcome {
            ClassifierOutcome::Classified { reason, .. } if !reason.is_empty() => {
                Some(reason.clone())
            }
            ClassifierOutcome::Unavailable { reason } => Some(reason.clone()),
            _ => None,
        };
        (outcome.tier(), RoutingMethod::Classifier, reason)
    };

    let prefer_coder = is_coding_request(messages);

    let model = registry
        .get_model_for_tier(tier, prefer_coder)
        .ok_or(RoutingError::NoModelsAvailable)?;

    tracing::info!(
        model = %model.id,
        tier = %tier,
        method = method.as_str(),
        prefer_coder,
        "routed request"
    );

    Ok((
        model.clone(),
        RoutingDecision {
            method,
            requested_model: None,
            score: Some(heuristic.score),
            reasons: heuristic.reasons,
            tier: Some(tier.as_str().to_string()),
            selected_model: Some(model.id.clone()),
            prefer_coder: Some(prefer_coder),
            classifier_reason,
        },
    ))
}
