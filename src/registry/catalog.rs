//! Model catalog types: parameter extraction from identifiers and tiering.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::RoutingConfig;

lazy_static! {
    static ref EMBEDDING_PATTERNS: Regex = Regex::new(r"(?i)embed|embedding").unwrap();
    static ref EXCLUDE_PATTERNS: Regex = Regex::new(r"(?i)ocr|whisper|tts|rerank").unwrap();
    // Parameter counts like "27b", "3.2-24B", "7b", "80b"
    static ref PARAM_PATTERN: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*[bB]\b").unwrap();
    // MoE active parameter markers like "A3B" (3B active per token)
    static ref MOE_ACTIVE_PATTERN: Regex = Regex::new(r"[Aa](\d+(?:\.\d+)?)[bB]").unwrap();
    static ref CODER_PATTERN: Regex = Regex::new(r"(?i)coder|code").unwrap();
}

/// Capability tier of a backend model, ordered by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Small = 1,
    Medium = 2,
    Large = 3,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Small, Tier::Medium, Tier::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Small => "SMALL",
            Tier::Medium => "MEDIUM",
            Tier::Large => "LARGE",
        }
    }

    /// Parse a tier name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "small" => Some(Tier::Small),
            "medium" => Some(Tier::Medium),
            "large" => Some(Tier::Large),
            _ => None,
        }
    }

    /// Map a classifier integer to a tier, clamping to [1, 3].
    pub fn from_index(index: i64) -> Self {
        match index.clamp(1, 3) {
            1 => Tier::Small,
            2 => Tier::Medium,
            _ => Tier::Large,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One backend model and what the router knows about it.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    /// Total parameter count in billions, if extractable from the id.
    pub total_params: Option<f64>,
    /// Active parameter count in billions, for mixture-of-experts models.
    pub active_params: Option<f64>,
    pub tier: Tier,
    pub is_coder: bool,
}

impl ModelInfo {
    /// Parameter count used for tiering: total if known, else active, else 0.
    pub fn effective_params(&self) -> f64 {
        self.total_params.or(self.active_params).unwrap_or(0.0)
    }
}

/// Extract (total, active) parameter counts from a model identifier.
///
/// All `<n>[.<n>]B` tokens are candidates and the largest wins as the
/// total; an `A<n>B` token supplies the MoE active count. When the total
/// resolves to the same value as the active count and another candidate
/// exists, the total is re-selected from the remaining candidates so the
/// active figure cannot masquerade as the total.
pub fn extract_params(model_id: &str) -> (Option<f64>, Option<f64>) {
    let active_params = MOE_ACTIVE_PATTERN
        .captures(model_id)
        .and_then(|c| c[1].parse::<f64>().ok());

    let candidates: Vec<f64> = PARAM_PATTERN
        .captures_iter(model_id)
        .filter_map(|c| c[1].parse::<f64>().ok())
        .collect();

    let mut total_params = candidates.iter().copied().fold(None, max_opt);
    if let (Some(total), Some(active)) = (total_params, active_params) {
        if total == active && candidates.len() > 1 {
            let without_active = candidates
                .iter()
                .copied()
                .filter(|&p| p != active)
                .fold(None, max_opt);
            if let Some(reselected) = without_active {
                total_params = Some(reselected);
            }
        }
    }

    (total_params, active_params)
}

fn max_opt(acc: Option<f64>, v: f64) -> Option<f64> {
    match acc {
        Some(a) if a >= v => Some(a),
        _ => Some(v),
    }
}

/// Map an effective parameter count to a tier using the configured
/// boundaries.
pub fn classify_tier(effective_params: f64, cfg: &RoutingConfig) -> Tier {
    if effective_params <= cfg.tier1_max_params {
        Tier::Small
    } else if effective_params <= cfg.tier2_max_params {
        Tier::Medium
    } else {
        Tier::Large
    }
}

/// Whether the id names a chat-capable model. Embedding and non-chat
/// capability models (OCR, speech, reranking) never enter the registry.
pub fn is_chat_model(model_id: &str) -> bool {
    !EMBEDDING_PATTERNS.is_match(model_id) && !EXCLUDE_PATTERNS.is_match(model_id)
}

/// Whether the id suggests a code-specialized model.
pub fn is_coder(model_id: &str) -> bool {
    CODER_PATTERN.is_match(model_id)
}

/// Build a [`ModelInfo`] from a raw model id, or None for non-chat models.
///
/// Models with no extractable parameter count default to MEDIUM.
pub fn build_model_info(model_id: &str, cfg: &RoutingConfig) -> Option<ModelInfo> {
    if !is_chat_model(model_id) {
        return None;
    }

    let (total_params, active_params) = extract_params(model_id);
    let tier = match total_params.or(active_params) {
        Some(effective) => classify_tier(effective, cfg),
        None => Tier::Medium,
    };

    Some(ModelInfo {
        id: model_id.to_string(),
        total_params,
        active_params,
        tier,
        is_coder: is_coder(model_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_param_count() {
        assert_eq!(extract_params("gemma-3-27b"), (Some(27.0), None));
        assert_eq!(extract_params("qwen-3-4b"), (Some(4.0), None));
    }

    #[test]
    fn moe_model() {
        assert_eq!(extract_params("Qwen3-30B-A3B"), (Some(30.0), Some(3.0)));
    }

    #[test]
    fn moe_large() {
        assert_eq!(extract_params("qwen3-next-80b-a3b"), (Some(80.0), Some(3.0)));
    }

    #[test]
    fn active_never_masquerades_as_total() {
        // The "4B" in "A4B" is also a total candidate; with a second
        // distinct candidate the total re-selects away from the active.
        let (total, active) = extract_params("mini-2b-a4b");
        assert_eq!(active, Some(4.0));
        assert_eq!(total, Some(2.0));
    }

    #[test]
    fn decimal_params() {
        // Only B-suffixed tokens are candidates; "3.3" has no B suffix.
        assert_eq!(extract_params("granite-vision-3.3-2b"), (Some(2.0), None));
    }

    #[test]
    fn attached_suffix() {
        assert_eq!(extract_params("gpt-oss20b"), (Some(20.0), None));
    }

    #[test]
    fn coder_model_params() {
        assert_eq!(extract_params("qwen2.5-coder-32b"), (Some(32.0), None));
    }

    #[test]
    fn no_params() {
        assert_eq!(extract_params("mistral-nemo"), (None, None));
    }

    #[test]
    fn embedding_excluded() {
        assert!(!is_chat_model("nomic-embed-text:latest"));
        assert!(!is_chat_model("snowflake-arctic-embed2:latest"));
        assert!(!is_chat_model("qwen3-embedding:8b"));
    }

    #[test]
    fn capability_models_excluded() {
        assert!(!is_chat_model("vllm-deepseek-ocr"));
        assert!(!is_chat_model("whisper-large-v3"));
        assert!(!is_chat_model("kokoro-tts"));
        assert!(!is_chat_model("bge-reranker-v2"));
    }

    #[test]
    fn chat_model_included() {
        assert!(is_chat_model("gemma-3-27b"));
        assert!(is_chat_model("qwen2.5-coder-32b"));
    }

    #[test]
    fn tier_boundaries_are_monotonic() {
        let cfg = RoutingConfig::default();
        assert_eq!(classify_tier(4.0, &cfg), Tier::Small);
        assert_eq!(classify_tier(8.0, &cfg), Tier::Small);
        assert_eq!(classify_tier(27.0, &cfg), Tier::Medium);
        assert_eq!(classify_tier(32.0, &cfg), Tier::Large);
    }

    #[test]
    fn tier_assignment() {
        let cfg = RoutingConfig::default();
        assert_eq!(build_model_info("gemma-3-4b", &cfg).unwrap().tier, Tier::Small);
        assert_eq!(build_model_info("gemma-3-27b", &cfg).unwrap().tier, Tier::Medium);
        assert_eq!(
            build_model_info("qwen2.5-coder-32b", &cfg).unwrap().tier,
            Tier::Large
        );
    }

    #[test]
    fn moe_tier_uses_total_params() {
        let cfg = RoutingConfig::default();
        let info = build_model_info("Qwen3-30B-A3B", &cfg).unwrap();
        assert_eq!(info.tier, Tier::Large);
        assert_eq!(info.total_params, Some(30.0));
        assert_eq!(info.active_params, Some(3.0));
    }

    #[test]
    fn unknown_params_default_to_medium() {
        let cfg = RoutingConfig::default();
        let info = build_model_info("mistral-nemo", &cfg).unwrap();
        assert_eq!(info.tier, Tier::Medium);
        assert_eq!(info.effective_params(), 0.0);
    }

    #[test]
    fn coder_flag() {
        let cfg = RoutingConfig::default();
        assert!(build_model_info("qwen2.5-coder-32b", &cfg).unwrap().is_coder);
        assert!(!build_model_info("gemma-3-27b", &cfg).unwrap().is_coder);
    }

    #[test]
    fn non_chat_model_builds_nothing() {
        let cfg = RoutingConfig::default();
        assert!(build_model_info("nomic-embed-text", &cfg).is_none());
    }

    #[test]
    fn tier_name_round_trip() {
        assert_eq!(Tier::from_name("small"), Some(Tier::Small));
        assert_eq!(Tier::from_name("MEDIUM"), Some(Tier::Medium));
        assert_eq!(Tier::from_name("Large"), Some(Tier::Large));
        assert_eq!(Tier::from_name("huge"), None);
        assert_eq!(Tier::Large.as_str(), "LARGE");
    }

    #[test]
    fn classifier_index_clamps() {
        assert_eq!(Tier::from_index(0), Tier::Small);
        assert_eq!(Tier::from_index(2), Tier::Medium);
        assert_eq!(Tier::from_index(7), Tier::Large);
    }
}
