//! Model architecture configuration
//!
//! Resolves a HuggingFace-style `config.json` into a typed description of the
//! decoder: which attention mechanism each layer family uses, the feed-forward
//! (dense or mixture-of-experts) shape, and the hybrid layer layout.

use crate::config::aliases;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// `model_type` used when the config does not declare one
pub const DEFAULT_MODEL_TYPE: &str = "default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model config must be a JSON object")]
    NotAnObject,

    #[error("missing field `{field}` required by {shape} config")]
    MissingField { field: String, shape: &'static str },

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("model type `{model_type}` requires first_k_dense_replace > 0")]
    FirstKDenseRequired { model_type: String },
}

/// Standard (grouped-query) multi-head attention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MhaConfig {
    pub num_attention_heads: usize,
    pub num_key_value_heads: usize,
    pub head_dim: usize,
}

/// Multi-head latent attention (low-rank compressed KV)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlaConfig {
    pub num_attention_heads: usize,
    /// `None` when the query is projected directly from the hidden state
    pub q_lora_rank: Option<usize>,
    pub kv_lora_rank: usize,
    pub qk_nope_head_dim: usize,
    pub qk_rope_head_dim: usize,
    pub qk_head_dim: usize,
    pub v_head_dim: usize,
}

/// Linear (recurrent-state) attention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearAttnConfig {
    pub conv_kernel_dim: usize,
    pub key_head_dim: usize,
    pub num_key_heads: usize,
    pub value_head_dim: usize,
    pub num_value_heads: usize,
}

/// Full-attention member of a hybrid layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FullAttnConfig {
    Mha(MhaConfig),
    Mla(MlaConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridAttnConfig {
    pub full_attn_config: FullAttnConfig,
    pub linear_attn_config: LinearAttnConfig,
    pub full_attention_interval: usize,
}

impl HybridAttnConfig {
    /// Layers at multiples of the interval use full attention, the rest are linear
    pub fn is_full_attn_layer(&self, layer_idx: usize) -> bool {
        layer_idx % self.full_attention_interval == 0
    }

    /// Declared full-attention layer count: `num_layers / interval`, rounded down.
    /// Per-layer dispatch still follows [`Self::is_full_attn_layer`].
    pub fn num_full_attn_layers(&self, num_layers: usize) -> usize {
        num_layers / self.full_attention_interval
    }
}

/// Attention shape of a model; exactly one applies per model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttnConfig {
    Mha(MhaConfig),
    Mla(MlaConfig),
    Linear(LinearAttnConfig),
    Hybrid(HybridAttnConfig),
}

impl AttnConfig {
    pub fn name(&self) -> &'static str {
        match self {
            AttnConfig::Mha(_) => "MHA",
            AttnConfig::Mla(_) => "MLA",
            AttnConfig::Linear(_) => "Linear",
            AttnConfig::Hybrid(_) => "Hybrid",
        }
    }
}

/// Feed-forward shape. Dense models use `num_routed_experts = 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoeConfig {
    pub num_routed_experts: usize,
    pub num_experts_per_tok: usize,
    pub intermediate_size: usize,
    #[serde(default)]
    pub num_shared_experts: usize,
}

impl MoeConfig {
    /// Single-expert representation of a dense feed-forward block
    pub fn dense(intermediate_size: usize) -> Self {
        Self {
            num_routed_experts: 1,
            num_experts_per_tok: 1,
            intermediate_size,
            num_shared_experts: 0,
        }
    }

    pub fn is_moe(&self) -> bool {
        self.num_routed_experts > 1
    }
}

/// Model configuration resolved from `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    /// Family discriminator used for registry and feed-forward routing
    pub model_type: String,
    pub attn_config: AttnConfig,
    pub moe_config: Option<MoeConfig>,
    /// Width of the dense feed-forward blocks (falls back to the MoE width)
    pub intermediate_size: usize,
    pub is_hybrid: bool,
    pub num_full_attn_layers: usize,
    pub num_linear_attn_layers: usize,
    /// Layers below this index always use a dense feed-forward block
    pub first_k_dense_replace: usize,
    /// Original JSON object, for architecture-specific fields
    #[serde(skip)]
    pub raw_config: Map<String, Value>,
}

impl ModelConfig {
    /// Load from a `config.json` file
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Build from an already parsed JSON value
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(raw) => Self::from_map(raw),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    fn from_map(raw: Map<String, Value>) -> Result<Self, ConfigError> {
        let hidden_size = require_positive(&raw, "hidden_size", "model")?;
        let num_hidden_layers = require_positive(&raw, "num_hidden_layers", "model")?;

        let attn_config = resolve_attn_config(&raw, hidden_size)?;
        let moe_config = resolve_moe_config(&raw)?;
        let intermediate_size =
            optional(&raw, "intermediate_size")?.unwrap_or(moe_config.intermediate_size);

        let (is_hybrid, num_full_attn_layers, num_linear_attn_layers) = match &attn_config {
            AttnConfig::Hybrid(hybrid) => {
                let num_full = hybrid.num_full_attn_layers(num_hidden_layers);
                (true, num_full, num_hidden_layers - num_full)
            }
            _ => (false, 0, 0),
        };

        let model_type = raw
            .get("model_type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MODEL_TYPE)
            .to_string();

        debug!(
            model_type = %model_type,
            attention = attn_config.name(),
            routed_experts = moe_config.num_routed_experts,
            shared_experts = moe_config.num_shared_experts,
            "resolved model config"
        );

        Ok(Self {
            hidden_size,
            num_hidden_layers,
            model_type,
            attn_config,
            moe_config: Some(moe_config),
            intermediate_size,
            is_hybrid,
            num_full_attn_layers,
            num_linear_attn_layers,
            first_k_dense_replace: optional(&raw, "first_k_dense_replace")?.unwrap_or(0),
            raw_config: raw,
        })
    }

    /// Integer field from the original JSON; `None` when absent or not a non-negative integer
    pub fn raw_usize(&self, key: &str) -> Option<usize> {
        self.raw_config
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
    }

    pub fn is_moe(&self) -> bool {
        self.moe_config.as_ref().is_some_and(MoeConfig::is_moe)
    }
}

impl FromStr for ModelConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

fn as_usize(field: &str, value: &Value) -> Result<usize, ConfigError> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| ConfigError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a non-negative integer, got {}", value),
        })
}

fn optional(raw: &Map<String, Value>, field: &str) -> Result<Option<usize>, ConfigError> {
    aliases::lookup(raw, field)
        .map(|value| as_usize(field, value))
        .transpose()
}

fn require(
    raw: &Map<String, Value>,
    field: &str,
    shape: &'static str,
) -> Result<usize, ConfigError> {
    optional(raw, field)?.ok_or_else(|| ConfigError::MissingField {
        field: field.to_string(),
        shape,
    })
}

fn require_positive(
    raw: &Map<String, Value>,
    field: &str,
    shape: &'static str,
) -> Result<usize, ConfigError> {
    match require(raw, field, shape)? {
        0 => Err(ConfigError::InvalidField {
            field: field.to_string(),
            reason: "must be greater than 0".to_string(),
        }),
        value => Ok(value),
    }
}

/// Field that must be present but may be `null`
fn nullable(
    raw: &Map<String, Value>,
    field: &str,
    shape: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match raw.get(field) {
        None => Err(ConfigError::MissingField {
            field: field.to_string(),
            shape,
        }),
        Some(Value::Null) => Ok(None),
        Some(value) => as_usize(field, value).map(Some),
    }
}

fn resolve_mha_config(
    raw: &Map<String, Value>,
    hidden_size: usize,
) -> Result<Option<MhaConfig>, ConfigError> {
    if !aliases::contains(raw, "num_attention_heads") {
        return Ok(None);
    }

    let num_attention_heads = require_positive(raw, "num_attention_heads", "MHA")?;
    let num_key_value_heads =
        optional(raw, "num_key_value_heads")?.unwrap_or(num_attention_heads);
    let head_dim = optional(raw, "head_dim")?.unwrap_or(hidden_size / num_attention_heads);

    Ok(Some(MhaConfig {
        num_attention_heads,
        num_key_value_heads,
        head_dim,
    }))
}

fn resolve_mla_config(raw: &Map<String, Value>) -> Result<Option<MlaConfig>, ConfigError> {
    if !aliases::contains(raw, "kv_lora_rank") {
        return Ok(None);
    }

    let qk_nope_head_dim = require(raw, "qk_nope_head_dim", "MLA")?;
    let qk_rope_head_dim = require(raw, "qk_rope_head_dim", "MLA")?;

    Ok(Some(MlaConfig {
        num_attention_heads: require_positive(raw, "num_attention_heads", "MLA")?,
        q_lora_rank: nullable(raw, "q_lora_rank", "MLA")?,
        kv_lora_rank: require(raw, "kv_lora_rank", "MLA")?,
        qk_nope_head_dim,
        qk_rope_head_dim,
        qk_head_dim: qk_nope_head_dim + qk_rope_head_dim,
        v_head_dim: require(raw, "v_head_dim", "MLA")?,
    }))
}

fn resolve_linear_config(
    raw: &Map<String, Value>,
) -> Result<Option<LinearAttnConfig>, ConfigError> {
    if !aliases::contains(raw, "linear_key_head_dim") {
        return Ok(None);
    }

    Ok(Some(LinearAttnConfig {
        conv_kernel_dim: require(raw, "linear_conv_kernel_dim", "linear attention")?,
        key_head_dim: require(raw, "linear_key_head_dim", "linear attention")?,
        num_key_heads: require(raw, "linear_num_key_heads", "linear attention")?,
        value_head_dim: require(raw, "linear_value_head_dim", "linear attention")?,
        num_value_heads: require(raw, "linear_num_value_heads", "linear attention")?,
    }))
}

fn resolve_attn_config(
    raw: &Map<String, Value>,
    hidden_size: usize,
) -> Result<AttnConfig, ConfigError> {
    let mha = resolve_mha_config(raw, hidden_size)?;
    let mla = resolve_mla_config(raw)?;
    let linear = resolve_linear_config(raw)?;

    let interval = optional(raw, "full_attention_interval")?;
    if interval == Some(0) {
        return Err(ConfigError::InvalidField {
            field: "full_attention_interval".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    // MLA takes precedence over MHA as the full-attention member
    let full = mla
        .map(FullAttnConfig::Mla)
        .or_else(|| mha.map(FullAttnConfig::Mha));

    match (interval, full, linear) {
        (Some(full_attention_interval), Some(full_attn_config), Some(linear_attn_config)) => {
            Ok(AttnConfig::Hybrid(HybridAttnConfig {
                full_attn_config,
                linear_attn_config,
                full_attention_interval,
            }))
        }
        (_, Some(FullAttnConfig::Mla(mla)), _) => Ok(AttnConfig::Mla(mla)),
        (_, _, Some(linear)) => Ok(AttnConfig::Linear(linear)),
        (_, Some(FullAttnConfig::Mha(mha)), None) => Ok(AttnConfig::Mha(mha)),
        (_, None, None) => Err(ConfigError::MissingField {
            field: "num_attention_heads".to_string(),
            shape: "attention",
        }),
    }
}

fn resolve_moe_config(raw: &Map<String, Value>) -> Result<MoeConfig, ConfigError> {
    match optional(raw, "num_routed_experts")? {
        Some(num_routed_experts) => Ok(MoeConfig {
            num_routed_experts,
            num_experts_per_tok: require(raw, "num_experts_per_tok", "MoE")?,
            intermediate_size: require_positive(raw, "moe_intermediate_size", "MoE")?,
            num_shared_experts: optional(raw, "num_shared_experts")?.unwrap_or(0),
        }),
        None => Ok(MoeConfig::dense(require_positive(
            raw,
            "intermediate_size",
            "dense FFN",
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<ModelConfig, ConfigError> {
        ModelConfig::from_value(value)
    }

    #[test]
    fn test_mha_defaults() {
        let config = parse(json!({
            "hidden_size": 4096,
            "num_hidden_layers": 32,
            "num_attention_heads": 32,
            "intermediate_size": 14336,
        }))
        .unwrap();

        assert_eq!(config.model_type, DEFAULT_MODEL_TYPE);
        assert_eq!(config.first_k_dense_replace, 0);
        assert_eq!(
            config.attn_config,
            AttnConfig::Mha(MhaConfig {
                num_attention_heads: 32,
                num_key_value_heads: 32,
                head_dim: 128,
            })
        );
        assert_eq!(config.moe_config, Some(MoeConfig::dense(14336)));
        assert!(!config.is_moe());
        assert!(!config.is_hybrid);
    }

    #[test]
    fn test_explicit_head_dim_wins() {
        let config = parse(json!({
            "hidden_size": 2048,
            "num_hidden_layers": 4,
            "num_attention_heads": 16,
            "num_key_value_heads": 2,
            "head_dim": 256,
            "intermediate_size": 5120,
        }))
        .unwrap();

        match config.attn_config {
            AttnConfig::Mha(mha) => {
                assert_eq!(mha.head_dim, 256);
                assert_eq!(mha.num_key_value_heads, 2);
            }
            other => panic!("expected MHA, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_mla_is_an_error() {
        let err = parse(json!({
            "hidden_size": 7168,
            "num_hidden_layers": 4,
            "num_attention_heads": 128,
            "kv_lora_rank": 512,
            "q_lora_rank": 1536,
            "qk_rope_head_dim": 64,
            "v_head_dim": 128,
            "intermediate_size": 18432,
        }))
        .unwrap_err();

        match err {
            ConfigError::MissingField { field, shape } => {
                assert_eq!(field, "qk_nope_head_dim");
                assert_eq!(shape, "MLA");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_null_q_lora_rank() {
        let config = parse(json!({
            "hidden_size": 2048,
            "num_hidden_layers": 27,
            "num_attention_heads": 16,
            "kv_lora_rank": 512,
            "q_lora_rank": null,
            "qk_nope_head_dim": 128,
            "qk_rope_head_dim": 64,
            "v_head_dim": 128,
            "intermediate_size": 10944,
        }))
        .unwrap();

        match config.attn_config {
            AttnConfig::Mla(mla) => {
                assert_eq!(mla.q_lora_rank, None);
                assert_eq!(mla.qk_head_dim, 192);
            }
            other => panic!("expected MLA, got {:?}", other),
        }
    }

    #[test]
    fn test_hybrid_layout() {
        let config = parse(json!({
            "hidden_size": 2048,
            "num_hidden_layers": 8,
            "num_attention_heads": 16,
            "num_key_value_heads": 2,
            "head_dim": 256,
            "full_attention_interval": 4,
            "linear_conv_kernel_dim": 4,
            "linear_key_head_dim": 128,
            "linear_num_key_heads": 16,
            "linear_value_head_dim": 128,
            "linear_num_value_heads": 32,
            "intermediate_size": 5120,
        }))
        .unwrap();

        assert!(config.is_hybrid);
        assert_eq!(config.num_full_attn_layers, 2);
        assert_eq!(config.num_linear_attn_layers, 6);
        assert!(matches!(config.attn_config, AttnConfig::Hybrid(_)));
    }

    #[test]
    fn test_hybrid_layer_count_rounds_down() {
        let config = parse(json!({
            "hidden_size": 2048,
            "num_hidden_layers": 10,
            "num_attention_heads": 16,
            "num_key_value_heads": 2,
            "head_dim": 256,
            "full_attention_interval": 4,
            "linear_conv_kernel_dim": 4,
            "linear_key_head_dim": 128,
            "linear_num_key_heads": 16,
            "linear_value_head_dim": 128,
            "linear_num_value_heads": 32,
            "intermediate_size": 5120,
        }))
        .unwrap();

        assert_eq!(config.num_full_attn_layers, 2);
        assert_eq!(config.num_linear_attn_layers, 8);

        // dispatch still puts layer 8 on full attention
        let AttnConfig::Hybrid(hybrid) = &config.attn_config else {
            panic!("expected hybrid attention");
        };
        let full: Vec<usize> = (0..10).filter(|&l| hybrid.is_full_attn_layer(l)).collect();
        assert_eq!(full, vec![0, 4, 8]);
    }

    #[test]
    fn test_raw_usize_ignores_non_integers() {
        let config = parse(json!({
            "hidden_size": 1024,
            "num_hidden_layers": 2,
            "num_attention_heads": 8,
            "intermediate_size": 4096,
            "rope_theta": 1000000.5,
            "vocab_size": 32000,
        }))
        .unwrap();

        assert_eq!(config.raw_usize("vocab_size"), Some(32000));
        assert_eq!(config.raw_usize("rope_theta"), None);
        assert_eq!(config.raw_usize("missing"), None);
    }

    #[test]
    fn test_interval_without_linear_fields_is_not_hybrid() {
        let config = parse(json!({
            "hidden_size": 1024,
            "num_hidden_layers": 8,
            "num_attention_heads": 8,
            "full_attention_interval": 4,
            "intermediate_size": 4096,
        }))
        .unwrap();

        assert!(!config.is_hybrid);
        assert!(matches!(config.attn_config, AttnConfig::Mha(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = parse(json!({
            "hidden_size": 1024,
            "num_hidden_layers": 8,
            "num_attention_heads": 8,
            "full_attention_interval": 0,
            "intermediate_size": 4096,
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn test_moe_aliases() {
        let config = parse(json!({
            "hidden_size": 7168,
            "num_hidden_layers": 61,
            "num_attention_heads": 128,
            "n_routed_experts": 256,
            "n_shared_experts": 1,
            "num_experts_per_tok": 8,
            "moe_intermediate_size": 2048,
            "intermediate_size": 18432,
            "first_k_dense_replace": 3,
        }))
        .unwrap();

        assert_eq!(
            config.moe_config,
            Some(MoeConfig {
                num_routed_experts: 256,
                num_experts_per_tok: 8,
                intermediate_size: 2048,
                num_shared_experts: 1,
            })
        );
        assert_eq!(config.intermediate_size, 18432);
        assert_eq!(config.first_k_dense_replace, 3);
        assert!(config.is_moe());
    }

    #[test]
    fn test_moe_intermediate_falls_back() {
        let config = parse(json!({
            "hidden_size": 4096,
            "num_hidden_layers": 32,
            "num_attention_heads": 32,
            "num_experts": 8,
            "num_experts_per_tok": 2,
            "intermediate_size": 14336,
        }))
        .unwrap();

        let moe = config.moe_config.unwrap();
        assert_eq!(moe.intermediate_size, 14336);
        assert_eq!(moe.num_shared_experts, 0);
    }

    #[test]
    fn test_missing_attention_fields() {
        let err = parse(json!({
            "hidden_size": 4096,
            "num_hidden_layers": 32,
            "intermediate_size": 14336,
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_rejects_non_object_and_bad_types() {
        assert!(matches!(parse(json!([1, 2, 3])), Err(ConfigError::NotAnObject)));

        let err = parse(json!({
            "hidden_size": -1,
            "num_hidden_layers": 32,
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn test_raw_fields_are_kept() {
        let config: ModelConfig = r#"{
            "hidden_size": 4096,
            "num_hidden_layers": 32,
            "num_attention_heads": 32,
            "intermediate_size": 14336,
            "vocab_size": 128256
        }"#
        .parse()
        .unwrap();

        assert_eq!(config.raw_usize("vocab_size"), Some(128256));
        assert_eq!(config.raw_usize("missing"), None);
    }
}
