//! Model-type to family mapping

use crate::config::{ConfigError, ModelConfig, ServerArgs};
use crate::layers::ffn::FfnRouting;
use crate::model::estimator::Model;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelFamily {
    /// Plain per-field resolution, no family overrides
    Default,
    DeepSeek,
    Qwen,
    Qwen3Next,
}

impl ModelFamily {
    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::Default => "default",
            ModelFamily::DeepSeek => "deepseek",
            ModelFamily::Qwen => "qwen",
            ModelFamily::Qwen3Next => "qwen3_next",
        }
    }

    pub fn ffn_routing(self) -> FfnRouting {
        match self {
            ModelFamily::DeepSeek => FfnRouting::FirstKDense,
            ModelFamily::Qwen3Next => FfnRouting::QwenNext,
            ModelFamily::Default | ModelFamily::Qwen => FfnRouting::Standard,
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// Built once on first use, read-only afterwards
pub static MODEL_REGISTRY: Lazy<HashMap<&'static str, ModelFamily>> = Lazy::new(|| {
    let mut registry = HashMap::new();

    registry.insert("deepseek_v2", ModelFamily::DeepSeek);
    registry.insert("deepseek_v3", ModelFamily::DeepSeek);
    registry.insert("deepseek_v32", ModelFamily::DeepSeek);
    registry.insert("qwen3", ModelFamily::Qwen);
    registry.insert("qwen3_moe", ModelFamily::Qwen);
    registry.insert("qwen3_next", ModelFamily::Qwen3Next);

    registry
});

pub struct ModelRegistry;

impl ModelRegistry {
    /// Family for `model_type`; unknown types fall back to `Default`
    pub fn lookup(model_type: &str) -> ModelFamily {
        MODEL_REGISTRY
            .get(model_type)
            .copied()
            .unwrap_or(ModelFamily::Default)
    }

    pub fn is_registered(model_type: &str) -> bool {
        MODEL_REGISTRY.contains_key(model_type)
    }

    pub fn registered_types() -> Vec<&'static str> {
        let mut types: Vec<_> = MODEL_REGISTRY.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn create(server: &ServerArgs, config: ModelConfig) -> Result<Model, ConfigError> {
        Model::new(server, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_registered_types() {
        assert_eq!(ModelRegistry::lookup("deepseek_v3"), ModelFamily::DeepSeek);
        assert_eq!(ModelRegistry::lookup("deepseek_v32"), ModelFamily::DeepSeek);
        assert_eq!(ModelRegistry::lookup("qwen3_moe"), ModelFamily::Qwen);
        assert_eq!(ModelRegistry::lookup("qwen3_next"), ModelFamily::Qwen3Next);
    }

    #[test]
    fn test_unknown_type_falls_back_to_default() {
        assert!(!ModelRegistry::is_registered("llama"));
        assert_eq!(ModelRegistry::lookup("llama"), ModelFamily::Default);
        assert_eq!(ModelRegistry::lookup(""), ModelFamily::Default);
    }

    #[test]
    fn test_registered_types_sorted() {
        let types = ModelRegistry::registered_types();
        assert_eq!(types.first(), Some(&"deepseek_v2"));
        assert!(types.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_family_routing() {
        assert_eq!(ModelFamily::DeepSeek.ffn_routing(), FfnRouting::FirstKDense);
        assert_eq!(ModelFamily::Qwen3Next.ffn_routing(), FfnRouting::QwenNext);
        assert_eq!(ModelFamily::Default.ffn_routing(), FfnRouting::Standard);
    }
}
