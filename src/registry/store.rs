//! Model registry: catalog snapshot, tier-based selection, atomic refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::config::RouterConfig;
use crate::registry::catalog::{ModelInfo, Tier, build_model_info};

/// An immutable snapshot of the available backend models.
///
/// Rebuilt wholesale on each refresh; readers always see either the old
/// complete snapshot or the new one, never a mix.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelInfo>,
    refreshed_at: Option<Instant>,
}

impl ModelRegistry {
    /// Build a registry from raw backend model ids, applying the chat-model
    /// filter, the configured allow/block filter, and tier overrides.
    pub fn build(model_ids: &[String], cfg: &RouterConfig) -> Self {
        let mut models = HashMap::new();
        let mut skipped: Vec<&str> = Vec::new();

        for id in model_ids {
            let Some(mut info) = build_model_info(id, &cfg.routing) else {
                continue;
            };
            if !cfg.filter.is_enabled(id) {
                skipped.push(id);
                continue;
            }
            if let Some(tier) = cfg.tier_override(id) {
                tracing::info!(model = %id, tier = %tier, "tier overridden by config");
                info.tier = tier;
            }

            tracing::info!(
                model = %id,
                params = info.effective_params(),
                active = info.active_params.is_some(),
                tier = %info.tier,
                coder = info.is_coder,
                "registered model"
            );
            models.insert(id.clone(), info);
        }

        if !skipped.is_empty() {
            tracing::info!(count = skipped.len(), models = ?skipped, "skipped models filtered by config");
        }

        Self {
            models,
            refreshed_at: Some(Instant::now()),
        }
    }

    /// Construct a registry from already-built model infos. Test seam and
    /// admin tooling; production refreshes go through [`Self::build`].
    pub fn from_models(models: Vec<ModelInfo>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
            refreshed_at: Some(Instant::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelInfo> {
        self.models.get(model_id)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.values()
    }

    /// All models assigned to a tier. Order is not significant.
    pub fn by_tier(&self, tier: Tier) -> Vec<&ModelInfo> {
        self.models.values().filter(|m| m.tier == tier).collect()
    }

    /// Whether this snapshot is younger than the given TTL.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.refreshed_at
            .is_some_and(|at| at.elapsed() < ttl)
    }

    /// Select a model for the given tier.
    ///
    /// Tier correctness dominates: the tier (or its nearest non-empty
    /// neighbour, higher first) is fixed before coder preference is applied
    /// as a secondary refinement within it.
    pub fn get_model_for_tier(&self, tier: Tier, prefer_coder: bool) -> Option<&ModelInfo> {
        let mut candidates = self.by_tier(tier);
        if candidates.is_empty() {
            // Next higher tier first: never under-serve a request.
            for fallback in Tier::ALL.iter().filter(|t| **t > tier) {
                candidates = self.by_tier(*fallback);
                if !candidates.is_empty() {
                    break;
                }
            }
        }
        if candidates.is_empty() {
            for fallback in Tier::ALL.iter().rev().filter(|t| **t < tier) {
                candidates = self.by_tier(*fallback);
                if !candidates.is_empty() {
                    break;
                }
            }
        }
        if candidates.is_empty() {
            return None;
        }

        if prefer_coder {
            if let Some(coder) = largest(candidates.iter().copied().filter(|m| m.is_coder)) {
                return Some(coder);
            }
        } else {
            if let Some(general) = largest(candidates.iter().copied().filter(|m| !m.is_coder)) {
                return Some(general);
            }
            // Only coders in this tier: look for a general model anywhere else.
            for other in Tier::ALL.iter().filter(|t| **t != tier) {
                let adjacent = self.by_tier(*other);
                if let Some(general) = largest(adjacent.into_iter().filter(|m| !m.is_coder)) {
                    return Some(general);
                }
            }
        }

        // Last resort: largest model in the tier regardless of coder status.
        largest(candidates.into_iter())
    }
}

fn largest<'a>(models: impl Iterator<Item = &'a ModelInfo>) -> Option<&'a ModelInfo> {
    models.max_by(|a, b| {
        a.effective_params()
            .partial_cmp(&b.effective_params())
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Shared handle to the current registry snapshot.
///
/// The publish step is a single atomic replace; concurrent refreshes
/// serialize on [`Self::refresh_guard`] and re-check freshness after
/// acquiring it.
#[derive(Debug)]
pub struct SharedRegistry {
    current: RwLock<Arc<ModelRegistry>>,
    refresh_lock: Mutex<()>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ModelRegistry::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<ModelRegistry> {
        self.current.read().await.clone()
    }

    /// Atomically publish a new snapshot.
    pub async fn publish(&self, registry: ModelRegistry) -> Arc<ModelRegistry> {
        let registry = Arc::new(registry);
        *self.current.write().await = registry.clone();
        registry
    }

    /// Serialize refresh attempts. Callers must re-check freshness after
    /// acquiring the guard; a concurrent refresh may have just published.
    pub async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new()
    }
}
