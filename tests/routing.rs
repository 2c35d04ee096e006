//! End-to-end routing scenarios through the public crate API.
//!
//! These build a registry from realistic model id lists plus a parsed TOML
//! config, then drive `route_request` with no live backend. The classifier
//! endpoint points at a closed port, so escalation paths exercise the
//! degraded default rather than hanging.

use pretty_assertions::assert_eq;

use smart_router::api::ChatMessage;
use smart_router::backend::BackendClient;
use smart_router::config::RouterConfig;
use smart_router::registry::{ModelRegistry, Tier};
use smart_router::routing::route_request;

fn offline_config(extra: &str) -> RouterConfig {
    let doc = format!(
        r#"
[connection]
base_url = "http://127.0.0.1:9/v1"
{extra}
"#
    );
    RouterConfig::parse(&doc).expect("test config parses")
}

fn backend(cfg: &RouterConfig) -> BackendClient {
    BackendClient::new(&cfg.connection)
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn user(text: &str) -> ChatMessage {
    ChatMessage::user(text)
}

#[tokio::test]
async fn simple_greeting_lands_on_smallest_model() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "qwen2.5-14b-instruct", "llama-3.1-70b"]),
        &cfg,
    );

    let messages = vec![user("hi, what time is it?")];
    let (model, decision) = route_request(&messages, None, None, &registry, &backend(&cfg), &cfg)
        .await
        .unwrap();

    assert_eq!(model.id, "llama-3.2-3b-instruct");
    assert_eq!(decision.tier_header(), "SMALL");
}

#[tokio::test]
async fn detailed_design_request_lands_on_largest_model() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "qwen2.5-14b-instruct", "llama-3.1-70b"]),
        &cfg,
    );

    let text = "Please explain in detail, step by step, how to design and \
                implement a distributed microservices architecture with full \
                scalability analysis and a comprehensive migration plan."
        .repeat(8);
    let messages = vec![user(&text)];
    let (model, decision) = route_request(&messages, None, None, &registry, &backend(&cfg), &cfg)
        .await
        .unwrap();

    assert_eq!(model.id, "llama-3.1-70b");
    assert_eq!(decision.tier_header(), "LARGE");
}

#[tokio::test]
async fn coding_request_prefers_coder_in_matching_tier() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(
        &ids(&[
            "qwen2.5-14b-instruct",
            "qwen2.5-coder-14b-instruct",
            "llama-3.2-3b-instruct",
        ]),
        &cfg,
    );

    // German coding vocabulary counts the same as English.
    let text = "Bitte implementiere Schritt für Schritt einen Algorithmus zum \
                Sortieren und debugge anschließend den Quellcode. Erkläre die \
                Architektur und optimiere die Performance der Implementierung."
        .repeat(4);
    let messages = vec![user(&text)];
    let (model, decision) = route_request(&messages, None, None, &registry, &backend(&cfg), &cfg)
        .await
        .unwrap();

    assert!(model.is_coder, "expected a coder model, got {}", model.id);
    assert_eq!(model.id, "qwen2.5-coder-14b-instruct");
    assert_eq!(decision.prefer_coder, Some(true));
}

#[tokio::test]
async fn explicit_known_model_bypasses_scoring() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "llama-3.1-70b"]),
        &cfg,
    );

    let messages = vec![user("hello")];
    let (model, decision) = route_request(
        &messages,
        None,
        Some("llama-3.1-70b"),
        &registry,
        &backend(&cfg),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(model.id, "llama-3.1-70b");
    assert_eq!(decision.tier_header(), "");
    let audit = serde_json::to_value(&decision).unwrap();
    assert_eq!(audit["routing"], "explicit");
    assert!(audit.get("heuristic_score").is_none());
}

#[tokio::test]
async fn aggregate_name_is_not_an_explicit_request() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "llama-3.1-70b"]),
        &cfg,
    );

    // The virtual model name never exists in the registry, so scoring runs.
    let messages = vec![user("hi there")];
    let (model, decision) = route_request(
        &messages,
        None,
        Some("smart-router"),
        &registry,
        &backend(&cfg),
        &cfg,
    )
    .await
    .unwrap();

    assert_eq!(model.id, "llama-3.2-3b-instruct");
    assert_ne!(decision.tier_header(), "");
}

#[tokio::test]
async fn ambiguous_request_degrades_to_medium_when_classifier_is_down() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "qwen2.5-14b-instruct", "llama-3.1-70b"]),
        &cfg,
    );

    // Around 210 filler words puts the token score alone in the uncertain
    // band with a moderate keyword, forcing the classifier escalation.
    let mut text = "word ".repeat(210);
    text.push_str(" compare these options");
    let messages = vec![user(&text)];
    let (model, decision) = route_request(&messages, None, None, &registry, &backend(&cfg), &cfg)
        .await
        .unwrap();

    assert_eq!(model.tier, Tier::Medium);
    let audit = serde_json::to_value(&decision).unwrap();
    assert_eq!(audit["routing"], "classifier");
    assert!(audit["classifier_reason"].as_str().is_some());
    assert_eq!(model.id, "qwen2.5-14b-instruct");
}

#[tokio::test]
async fn missing_tier_falls_back_to_next_higher() {
    let cfg = offline_config("");
    // No SMALL model in the fleet; simple requests ride the medium one.
    let registry = ModelRegistry::build(&ids(&["qwen2.5-14b-instruct"]), &cfg);

    let messages = vec![user("hello!")];
    let (model, decision) = route_request(&messages, None, None, &registry, &backend(&cfg), &cfg)
        .await
        .unwrap();

    assert_eq!(model.id, "qwen2.5-14b-instruct");
    // The decision records the requested tier, not the fallback one.
    assert_eq!(decision.tier_header(), "SMALL");
}

#[tokio::test]
async fn empty_registry_is_a_routing_error() {
    let cfg = offline_config("");
    let registry = ModelRegistry::build(&[], &cfg);

    let messages = vec![user("hello")];
    let err = route_request(&messages, None, None, &registry, &backend(&cfg), &cfg)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No models available for routing");
}

#[tokio::test]
async fn blocklist_filter_removes_models_before_routing() {
    let cfg = offline_config(
        r#"
[filter]
excluded = ["llama-3.1-70b"]
"#,
    );
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "llama-3.1-70b", "text-embedding-3-small"]),
        &cfg,
    );

    assert!(registry.get("llama-3.1-70b").is_none());
    assert!(registry.get("text-embedding-3-small").is_none());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn tier_grouped_config_overrides_extraction() {
    let cfg = offline_config(
        r#"
[filter]
mode = "allowlist"

[models]
small = ["mystery-model-v1"]
large = ["llama-3.2-3b-instruct"]
"#,
    );
    let registry = ModelRegistry::build(
        &ids(&["mystery-model-v1", "llama-3.2-3b-instruct", "qwen2.5-14b-instruct"]),
        &cfg,
    );

    // In allowlist mode the grouping doubles as the allowlist; the tier
    // assignment overrides name-based extraction either way.
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("mystery-model-v1").unwrap().tier, Tier::Small);
    assert_eq!(
        registry.get("llama-3.2-3b-instruct").unwrap().tier,
        Tier::Large
    );
}

#[tokio::test]
async fn custom_tier_boundaries_reclassify_models() {
    let cfg = offline_config(
        r#"
[routing.tier_boundaries]
small_max = 4.0
medium_max = 15.0
"#,
    );
    let registry = ModelRegistry::build(
        &ids(&["llama-3.2-3b-instruct", "qwen2.5-14b-instruct", "mistral-24b"]),
        &cfg,
    );

    assert_eq!(registry.get("llama-3.2-3b-instruct").unwrap().tier, Tier::Small);
    assert_eq!(registry.get("qwen2.5-14b-instruct").unwrap().tier, Tier::Medium);
    assert_eq!(registry.get("mistral-24b").unwrap().tier, Tier::Large);
}
