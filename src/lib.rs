//! Smart Router: a model-routing proxy for OpenAI-compatible LLM backends.
//!
//! Sits in front of a multi-model serving endpoint, estimates how hard each
//! chat request is, and forwards it to a model of matching size. Clients talk
//! to one virtual model; routing happens per request from cheap heuristics,
//! escalating to a small LLM classifier only when the heuristics are unsure.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod registry;
pub mod routing;
pub mod server;

pub use config::RouterConfig;
pub use error::{Error, Result};
pub use registry::{ModelInfo, ModelRegistry, Tier};
pub use routing::{RoutingDecision, route_request};
pub use server::{AppState, app};
