//! Routing decision engine.
//!
//! ```text
//! Inbound request
//!      │
//!      ▼
//! ┌─────────────────┐  explicit model in registry
//! │  Orchestrator   │ ───────────────────────────► honor it
//! └───────┬─────────┘
//!         ▼
//! ┌─────────────────┐  confident
//! │ Heuristic score │ ───────────► tier
//! └───────┬─────────┘
//!         │ inconclusive
//!         ▼
//! ┌─────────────────┐  any failure
//! │ LLM classifier  │ ───────────► MEDIUM
//! └───────┬─────────┘
//!         ▼
//!   Registry.get_model_for_tier(tier, prefer_coder)
//! ```

pub mod classifier;
pub mod heuristics;
mod router;

pub use classifier::{ClassifierOutcome, classify_complexity};
pub use heuristics::{HeuristicResult, score_request};
pub use router::{RoutingDecision, RoutingMethod, route_request};
