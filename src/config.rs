//! Configuration for the smart router.
//!
//! Loaded wholesale from a TOML file; a missing or invalid file falls back
//! to built-in defaults and is never fatal. The file is re-read on every
//! registry refresh so filter and override edits take effect without a
//! restart.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::registry::Tier;

/// Resolved router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub connection: ConnectionConfig,
    pub server: ServerConfig,
    pub routing: RoutingConfig,
    pub filter: ModelFilter,
    /// Per-model forced tiers, keyed by model id.
    pub tier_overrides: HashMap<String, Tier>,
}

/// Upstream backend connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base URL including the `/v1` prefix, e.g. `http://localhost:4000/v1`.
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub log_level: String,
    /// Virtual aggregate model name exposed on `/v1/models`.
    pub model_name: String,
}

/// Routing decision settings.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Score at or below which a confident request is SMALL.
    pub heuristic_low_threshold: f64,
    /// Score at or above which a confident request is LARGE.
    pub heuristic_high_threshold: f64,
    /// Designated classifier model; auto-selects the smallest model if None.
    pub classifier_model: Option<String>,
    /// Minimum interval between backend model-list refreshes.
    pub model_cache_ttl: Duration,
    /// Effective params at or below this are SMALL (billions).
    pub tier1_max_params: f64,
    /// Effective params at or below this are MEDIUM (billions).
    pub tier2_max_params: f64,
}

/// Model allow/block filtering.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub mode: FilterMode,
    pub allowed: HashSet<String>,
    pub excluded: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Allowlist,
    #[default]
    Blocklist,
}

impl ModelFilter {
    /// Whether a model passes the configured filter.
    pub fn is_enabled(&self, model_id: &str) -> bool {
        match self.mode {
            FilterMode::Allowlist => self.allowed.contains(model_id),
            FilterMode::Blocklist => !self.excluded.contains(model_id),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/v1".to_string(),
            api_key: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            log_level: "info".to_string(),
            model_name: "smart-router".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            heuristic_low_threshold: 0.3,
            heuristic_high_threshold: 0.7,
            classifier_model: None,
            model_cache_ttl: Duration::from_secs(300),
            tier1_max_params: 8.0,
            tier2_max_params: 27.0,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            server: ServerConfig::default(),
            routing: RoutingConfig::default(),
            filter: ModelFilter::default(),
            tier_overrides: HashMap::new(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// Any failure (missing file, parse error) logs and returns defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config file not readable, using defaults");
                return Self::default();
            }
        };
        match Self::parse(&raw) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "config loaded");
                cfg
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                Self::default()
            }
        }
    }

    /// Parse a TOML document into a resolved configuration.
    pub fn parse(raw: &str) -> Result<Self, crate::error::ConfigError> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| crate::error::ConfigError::ParseError(e.to_string()))?;
        Ok(file.resolve())
    }

    pub fn tier_override(&self, model_id: &str) -> Option<Tier> {
        self.tier_overrides.get(model_id).copied()
    }
}

// ---------------------------------------------------------------------------
// TOML schema
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    connection: ConnectionSection,
    server: ServerSection,
    routing: RoutingSection,
    filter: FilterSection,
    models: Option<ModelsSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConnectionSection {
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    port: Option<u16>,
    log_level: Option<String>,
    model_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoutingSection {
    heuristic_low_threshold: Option<f64>,
    heuristic_high_threshold: Option<f64>,
    classifier_model: Option<String>,
    model_cache_ttl_secs: Option<u64>,
    tier_boundaries: TierBoundariesSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TierBoundariesSection {
    small_max: Option<f64>,
    medium_max: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterSection {
    mode: Option<FilterMode>,
    excluded: Vec<String>,
}

/// The `models` section: either a flat allowlist or a tier-grouped table.
/// Tier-grouped entries both allow the model and force its tier.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelsSection {
    Flat(Vec<String>),
    Grouped(HashMap<String, Vec<String>>),
}

impl ConfigFile {
    fn resolve(self) -> RouterConfig {
        let defaults = RouterConfig::default();

        let connection = ConnectionConfig {
            base_url: self
                .connection
                .base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.connection.base_url),
            api_key: self
                .connection
                .api_key
                .or_else(|| std::env::var("SMART_ROUTER_API_KEY").ok())
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let server = ServerConfig {
            port: self.server.port.unwrap_or(defaults.server.port),
            log_level: self.server.log_level.unwrap_or(defaults.server.log_level),
            model_name: self.server.model_name.unwrap_or(defaults.server.model_name),
        };

        let routing = RoutingConfig {
            heuristic_low_threshold: self
                .routing
                .heuristic_low_threshold
                .unwrap_or(defaults.routing.heuristic_low_threshold),
            heuristic_high_threshold: self
                .routing
                .heuristic_high_threshold
                .unwrap_or(defaults.routing.heuristic_high_threshold),
            classifier_model: self.routing.classifier_model.filter(|m| !m.is_empty()),
            model_cache_ttl: self
                .routing
                .model_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.routing.model_cache_ttl),
            tier1_max_params: self
                .routing
                .tier_boundaries
                .small_max
                .unwrap_or(defaults.routing.tier1_max_params),
            tier2_max_params: self
                .routing
                .tier_boundaries
                .medium_max
                .unwrap_or(defaults.routing.tier2_max_params),
        };

        let mut filter = ModelFilter {
            mode: self.filter.mode.unwrap_or_default(),
            allowed: HashSet::new(),
            excluded: self.filter.excluded.into_iter().collect(),
        };
        let mut tier_overrides = HashMap::new();
        if let Some(models) = self.models {
            parse_models_section(models, &mut filter.allowed, &mut tier_overrides);
        }

        RouterConfig {
            connection,
            server,
            routing,
            filter,
            tier_overrides,
        }
    }
}

/// Populate the allowlist and tier overrides from the `models` section.
///
/// Tier keys are matched case-insensitively; a grouped key that is not a
/// tier name is itself treated as an allowed model id.
fn parse_models_section(
    models: ModelsSection,
    allowed: &mut HashSet<String>,
    tier_overrides: &mut HashMap<String, Tier>,
) {
    match models {
        ModelsSection::Flat(ids) => {
            allowed.extend(ids);
        }
        ModelsSection::Grouped(groups) => {
            for (key, ids) in groups {
                if let Some(tier) = Tier::from_name(&key) {
                    for id in ids {
                        allowed.insert(id.clone());
                        tier_overrides.insert(id, tier);
                    }
                } else {
                    allowed.insert(key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn allowlist_mode() {
        let mut filter = ModelFilter {
            mode: FilterMode::Allowlist,
            ..Default::default()
        };
        filter.allowed.insert("model-a".to_string());
        filter.allowed.insert("model-b".to_string());

        assert!(filter.is_enabled("model-a"));
        assert!(filter.is_enabled("model-b"));
        assert!(!filter.is_enabled("model-c"));
    }

    #[test]
    fn blocklist_mode() {
        let mut filter = ModelFilter::default();
        filter.excluded.insert("model-bad".to_string());

        assert!(filter.is_enabled("model-a"));
        assert!(!filter.is_enabled("model-bad"));
    }

    #[test]
    fn default_allows_all() {
        let filter = ModelFilter::default();
        assert!(filter.is_enabled("anything"));
    }

    #[test]
    fn tier_override_lookup() {
        let mut cfg = RouterConfig::default();
        cfg.tier_overrides.insert("model-x".to_string(), Tier::Large);

        assert_eq!(cfg.tier_override("model-x"), Some(Tier::Large));
        assert_eq!(cfg.tier_override("model-y"), None);
    }

    #[test]
    fn parse_full_document() {
        let cfg = RouterConfig::parse(
            r#"
            [connection]
            base_url = "http://backend:4000/v1/"
            api_key = "sk-test"

            [server]
            port = 9000
            model_name = "router"

            [routing]
            heuristic_low_threshold = 0.25
            classifier_model = "tiny-1b"
            model_cache_ttl_secs = 60

            [routing.tier_boundaries]
            small_max = 9.0
            medium_max = 30.0

            [filter]
            mode = "blocklist"
            excluded = ["bad-model"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.connection.base_url, "http://backend:4000/v1");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.model_name, "router");
        assert_eq!(cfg.routing.heuristic_low_threshold, 0.25);
        assert_eq!(cfg.routing.heuristic_high_threshold, 0.7);
        assert_eq!(cfg.routing.classifier_model.as_deref(), Some("tiny-1b"));
        assert_eq!(cfg.routing.model_cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.routing.tier1_max_params, 9.0);
        assert_eq!(cfg.routing.tier2_max_params, 30.0);
        assert!(!cfg.filter.is_enabled("bad-model"));
    }

    #[test]
    fn parse_flat_models_list() {
        let cfg = RouterConfig::parse(r#"models = ["model-a", "model-b"]"#).unwrap();
        assert!(cfg.filter.allowed.contains("model-a"));
        assert!(cfg.filter.allowed.contains("model-b"));
        assert!(cfg.tier_overrides.is_empty());
    }

    #[test]
    fn parse_tier_grouped_models() {
        let cfg = RouterConfig::parse(
            r#"
            [models]
            small = ["model-s1", "model-s2"]
            medium = ["model-m1"]
            large = ["model-l1"]
            "#,
        )
        .unwrap();
        for id in ["model-s1", "model-s2", "model-m1", "model-l1"] {
            assert!(cfg.filter.allowed.contains(id));
        }
        assert_eq!(cfg.tier_overrides["model-s1"], Tier::Small);
        assert_eq!(cfg.tier_overrides["model-s2"], Tier::Small);
        assert_eq!(cfg.tier_overrides["model-m1"], Tier::Medium);
        assert_eq!(cfg.tier_overrides["model-l1"], Tier::Large);
    }

    #[test]
    fn tier_keys_case_insensitive() {
        let cfg = RouterConfig::parse(
            r#"
            [models]
            Small = ["model-a"]
            LARGE = ["model-b"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tier_overrides["model-a"], Tier::Small);
        assert_eq!(cfg.tier_overrides["model-b"], Tier::Large);
    }

    #[test]
    fn non_tier_group_key_is_allowed_model() {
        let cfg = RouterConfig::parse(
            r#"
            [models]
            "my-model" = []
            "#,
        )
        .unwrap();
        assert!(cfg.filter.allowed.contains("my-model"));
        assert!(cfg.tier_overrides.is_empty());
    }

    #[test]
    fn invalid_document_is_error() {
        assert!(RouterConfig::parse("routing = 5").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = RouterConfig::load(Path::new("/nonexistent/smart-router.toml"));
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.routing.tier1_max_params, 8.0);
    }
}
