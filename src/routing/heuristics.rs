//! Rule-based complexity scoring for incoming requests.
//!
//! Produces a score in [0.0, 1.0] from independent additive signals plus a
//! confidence flag; scores close to a tier threshold are not confident and
//! trigger the LLM classifier escalation.
//!
//! Keyword matching is data-driven: per-language pattern lists grouped by
//! category, compiled once into a single case-insensitive alternation each.
//! Adding a language or category means extending a table, not the scoring
//! code.

use lazy_static::lazy_static;
use regex::Regex;

use crate::api::{ChatMessage, IMAGE_SENTINEL, extract_text};
use crate::config::RoutingConfig;

/// Scoring distance a score must keep from a tier threshold to count as
/// confident.
const CONFIDENCE_MARGIN: f64 = 0.1;

/// Result of heuristic scoring for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicResult {
    /// Complexity score, clamped to [0.0, 1.0], rounded to 3 decimals.
    pub score: f64,
    /// Human-readable contributing factors, for observability only.
    pub reasons: Vec<String>,
    /// Whether the heuristics alone can decide the tier.
    pub confident: bool,
}

/// Per-language pattern lists for one keyword category.
struct PatternTable {
    en: &'static [&'static str],
    de: &'static [&'static str],
}

impl PatternTable {
    /// Compile all languages into one case-insensitive word-bounded
    /// alternation.
    fn compile(&self) -> Regex {
        let alternation = self
            .en
            .iter()
            .chain(self.de.iter())
            .copied()
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("keyword table must compile")
    }
}

/// Keywords that suggest moderate complexity.
static MODERATE_TABLE: PatternTable = PatternTable {
    en: &[
        "analy[sz]e",
        "compare",
        "contrast",
        "explain",
        "evaluate",
        "discuss",
        "review",
        "trade[- ]?offs?",
        r"pros?\s+and\s+cons?",
        r"advantages?\s+and\s+disadvantages?",
    ],
    de: &[
        "analysiere",
        "vergleiche",
        "erkl[äa]re",
        "bewerte",
        "diskutiere",
        "[üu]berpr[üu]fe",
        r"Vor-?\s*und\s+Nachteile",
        "Abw[äa]gung",
        r"Pro\s+und\s+Contra",
    ],
};

/// Keywords that suggest high complexity.
static COMPLEX_TABLE: PatternTable = PatternTable {
    en: &[
        r"explain\s+in\s+detail",
        "step[- ]by[- ]step",
        "implement",
        "architect",
        "design",
        "refactor",
        "optimize",
        "debug",
        r"write\s+(?:a\s+)?(?:complete|full|entire)",
        "multi[- ]step",
        "comprehensive",
        "thorough",
        "in[- ]depth",
    ],
    de: &[
        r"Schritt\s+f[üu]r\s+Schritt",
        r"im\s+Detail",
        "implementiere",
        "entwirf",
        "entwerfe",
        "optimiere",
        "debugge",
        r"schreib[e ].*(?:komplett|vollst[äa]ndig|ganz)",
        "umfassend",
        "gr[üu]ndlich",
        "ausf[üu]hrlich",
        "detailliert",
        "tiefgehend",
        "mehrschrittig",
        "mehrstufig",
        "Architektur",
        r"Konzept\s+erstell",
    ],
};

/// Keywords that suggest simple lookup-style tasks.
static SIMPLE_TABLE: PatternTable = PatternTable {
    en: &[
        "translate",
        "summarize",
        "summarise",
        "tldr",
        "tl;dr",
        r"yes\s+or\s+no",
        r"true\s+or\s+false",
        r"what\s+is",
        r"who\s+is",
        r"when\s+did",
        r"where\s+is",
        "define",
        "list",
        "name",
        "count",
        r"fix\s+(?:this|the)\s+(?:typo|spelling|grammar)",
        "convert",
        "format",
        "reformat",
    ],
    de: &[
        "[üu]bersetz[e ]",
        "zusammenfass",
        r"fass[e ].*zusammen",
        r"ja\s+oder\s+nein",
        r"richtig\s+oder\s+falsch",
        r"was\s+ist",
        r"wer\s+ist",
        r"wann\s+war",
        r"wo\s+ist",
        r"wie\s+hei[ßs]t",
        "definiere",
        "z[äa]hl[e ]",
        "nenne",
        "auflisten",
        r"korrigiere\s+(?:den|die|das)\s+(?:Tippfehler|Rechtschreibung|Grammatik)",
        "konvertiere",
        "formatiere",
        "umwandeln",
    ],
};

lazy_static! {
    static ref MODERATE_KEYWORDS: Regex = MODERATE_TABLE.compile();
    static ref COMPLEX_KEYWORDS: Regex = COMPLEX_TABLE.compile();
    static ref SIMPLE_KEYWORDS: Regex = SIMPLE_TABLE.compile();
    static ref CODE_BLOCK_PATTERN: Regex = Regex::new(r"```[\s\S]*?```").unwrap();
}

/// Rough token estimate: ~4 characters per token.
fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// First few distinct matched keywords, for the reasons list.
fn sample_matches(re: &Regex, text: &str, limit: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for m in re.find_iter(text) {
        let s = m.as_str().to_string();
        if !seen.contains(&s) {
            seen.push(s);
            if seen.len() == limit {
                break;
            }
        }
    }
    seen
}

/// Score a conversation (plus optional tool list) for complexity.
///
/// Pure and deterministic given fixed configuration.
pub fn score_request(
    messages: &[ChatMessage],
    tools: Option<&[serde_json::Value]>,
    cfg: &RoutingConfig,
) -> HeuristicResult {
    let mut reasons: Vec<String> = Vec::new();
    let mut score: f64 = 0.0;

    let full_text = extract_text(messages);
    let total_tokens = estimate_tokens(&full_text);
    let num_turns = messages.len();

    // Overall length
    if total_tokens < 50 {
        reasons.push(format!("very short ({total_tokens} est. tokens)"));
    } else if total_tokens < 200 {
        score += 0.1;
    } else if total_tokens < 800 {
        score += 0.25;
        reasons.push(format!("medium length ({total_tokens} est. tokens)"));
    } else if total_tokens < 2000 {
        score += 0.4;
        reasons.push(format!("long ({total_tokens} est. tokens)"));
    } else {
        score += 0.5;
        reasons.push(format!("very long ({total_tokens} est. tokens)"));
    }

    // Conversation depth
    if num_turns > 10 {
        score += 0.15;
        reasons.push(format!("deep conversation ({num_turns} turns)"));
    } else if num_turns > 4 {
        score += 0.08;
        reasons.push(format!("multi-turn ({num_turns} turns)"));
    }

    // Tool/function calling
    if let Some(tools) = tools.filter(|t| !t.is_empty()) {
        let tool_count = tools.len();
        if tool_count > 3 {
            score += 0.2;
            reasons.push(format!("many tools ({tool_count})"));
        } else {
            score += 0.1;
            reasons.push(format!("tool use ({tool_count} tools)"));
        }
    }

    // System prompt weight
    let system_msgs: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.role == "system")
        .cloned()
        .collect();
    if !system_msgs.is_empty() {
        let system_tokens = estimate_tokens(&extract_text(&system_msgs));
        if system_tokens > 500 {
            score += 0.15;
            reasons.push(format!("complex system prompt ({system_tokens} est. tokens)"));
        } else if system_tokens > 100 {
            score += 0.05;
        }
    }

    // Fenced code blocks
    let code_blocks = CODE_BLOCK_PATTERN.find_iter(&full_text).count();
    if code_blocks > 2 {
        score += 0.15;
        reasons.push(format!("multiple code blocks ({code_blocks})"));
    } else if code_blocks > 0 {
        score += 0.05;
    }

    // Images
    if full_text.contains(IMAGE_SENTINEL) {
        score += 0.1;
        reasons.push("contains images".to_string());
    }

    // Keyword analysis on the last user message only
    let last_user_text = messages
        .iter()
        .filter(|m| m.role == "user")
        .next_back()
        .map(ChatMessage::text)
        .unwrap_or_default();

    let complex_count = COMPLEX_KEYWORDS.find_iter(&last_user_text).count();
    if complex_count > 0 {
        score += f64::min(0.7, 0.2 + 0.15 * complex_count as f64);
        reasons.push(format!(
            "complex keywords ({complex_count}): {}",
            sample_matches(&COMPLEX_KEYWORDS, &last_user_text, 3).join(", ")
        ));
    }

    let moderate_count = MODERATE_KEYWORDS.find_iter(&last_user_text).count();
    if moderate_count > 0 {
        score += f64::min(0.2, 0.1 * moderate_count as f64);
        reasons.push(format!(
            "moderate keywords ({moderate_count}): {}",
            sample_matches(&MODERATE_KEYWORDS, &last_user_text, 3).join(", ")
        ));
    }

    if complex_count == 0 && moderate_count == 0 {
        let simple = sample_matches(&SIMPLE_KEYWORDS, &last_user_text, 3);
        if !simple.is_empty() {
            score -= 0.15;
            reasons.push(format!("simple keywords: {}", simple.join(", ")));
        }
    }

    let score = (score.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;

    // Confident only when clearly inside one tier's score band.
    let low = cfg.heuristic_low_threshold;
    let high = cfg.heuristic_high_threshold;
    let confident = score < low - CONFIDENCE_MARGIN
        || (low + CONFIDENCE_MARGIN <= score && score <= high - CONFIDENCE_MARGIN)
        || score > high + CONFIDENCE_MARGIN;

    HeuristicResult {
        score,
        reasons,
        confident,
    }
}
