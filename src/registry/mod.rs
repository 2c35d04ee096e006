//! Model catalog and registry.
//!
//! The catalog maps raw backend model identifiers to [`ModelInfo`]
//! (parameter counts, tier, coder flag); the store holds the current
//! registry snapshot and answers tier-based selection queries.

mod catalog;
mod store;

pub use catalog::{
    ModelInfo, Tier, build_model_info, classify_tier, extract_params, is_chat_model, is_coder,
};
pub use store::{ModelRegistry, SharedRegistry};
