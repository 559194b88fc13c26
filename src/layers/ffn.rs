//! Feed-forward variants (dense MLP and mixture-of-experts)

use crate::config::{ConfigError, ModelConfig, MoeConfig, ServerArgs};
use crate::model::registry::ModelRegistry;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FfnKind {
    #[serde(rename = "DenseMLP")]
    DenseMlp,
    #[serde(rename = "MoE")]
    Moe,
}

impl FfnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FfnKind::DenseMlp => "DenseMLP",
            FfnKind::Moe => "MoE",
        }
    }
}

impl fmt::Display for FfnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// gate / up / down projections
#[derive(Debug, Clone)]
pub struct DenseMlp {
    hidden_size: u64,
    intermediate_size: u64,
    weight_bytes: u64,
}

impl DenseMlp {
    pub fn new(server: &ServerArgs, hidden_size: usize, intermediate_size: usize) -> Self {
        Self {
            hidden_size: hidden_size as u64,
            intermediate_size: intermediate_size as u64,
            weight_bytes: server.weight_precision().bytes_per_element(),
        }
    }

    pub fn num_elements(&self) -> u64 {
        3 * self.hidden_size * self.intermediate_size
    }

    pub fn weights_size(&self) -> u64 {
        self.num_elements() * self.weight_bytes
    }
}

/// Mixture of experts. Routed experts are spread over the expert-parallel
/// group, shared experts are replicated on every device.
#[derive(Debug, Clone)]
pub struct Moe {
    config: MoeConfig,
    expert: DenseMlp,
    ep: u64,
}

impl Moe {
    pub fn new(server: &ServerArgs, hidden_size: usize, config: MoeConfig) -> Self {
        let expert = DenseMlp::new(server, hidden_size, config.intermediate_size);
        Self {
            config,
            expert,
            ep: server.ep(),
        }
    }

    pub fn config(&self) -> &MoeConfig {
        &self.config
    }

    pub fn ep_size(&self) -> u64 {
        self.ep
    }

    pub fn single_expert_weights_size(&self) -> u64 {
        self.expert.weights_size()
    }

    /// Experts held by one device; fractional when routed experts do not divide evenly
    pub fn experts_per_device(&self) -> f64 {
        self.config.num_routed_experts as f64 / self.ep as f64
            + self.config.num_shared_experts as f64
    }

    pub fn routed_weights_size(&self) -> u64 {
        self.config.num_routed_experts as u64 * self.single_expert_weights_size() / self.ep
    }

    pub fn shared_weights_size(&self) -> u64 {
        self.config.num_shared_experts as u64 * self.single_expert_weights_size()
    }

    pub fn weights_size(&self) -> u64 {
        self.routed_weights_size() + self.shared_weights_size()
    }
}

/// Qwen3-Next MoE block. Same formula as [`Moe`].
#[derive(Debug, Clone)]
pub struct QwenNextFfn(Moe);

impl QwenNextFfn {
    pub fn new(moe: Moe) -> Self {
        Self(moe)
    }

    pub fn as_moe(&self) -> &Moe {
        &self.0
    }
}

/// How a model family picks its feed-forward block per layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfnRouting {
    /// MoE when more than one routed expert is configured, dense otherwise
    Standard,
    /// Dense below `first_k_dense_replace`, standard routing above it
    FirstKDense,
    /// Qwen3-Next MoE block when experts are configured, dense otherwise
    QwenNext,
}

impl FfnRouting {
    pub fn for_model_type(model_type: &str) -> Self {
        ModelRegistry::lookup(model_type).ffn_routing()
    }
}

/// Feed-forward block of one decoder layer
#[derive(Debug, Clone)]
pub enum Ffn {
    Dense(DenseMlp),
    Moe(Moe),
    QwenNext(QwenNextFfn),
}

impl Ffn {
    /// Resolve the feed-forward variant used by `layer_idx`
    pub fn create(
        server: &ServerArgs,
        config: &ModelConfig,
        layer_idx: usize,
    ) -> Result<Self, ConfigError> {
        match FfnRouting::for_model_type(&config.model_type) {
            FfnRouting::FirstKDense => {
                if config.first_k_dense_replace == 0 {
                    return Err(ConfigError::FirstKDenseRequired {
                        model_type: config.model_type.clone(),
                    });
                }
                if layer_idx < config.first_k_dense_replace {
                    Ok(Self::dense(server, config))
                } else {
                    Ok(Self::standard(server, config))
                }
            }
            FfnRouting::QwenNext => Ok(match &config.moe_config {
                Some(moe) if moe.is_moe() => Self::QwenNext(QwenNextFfn::new(Moe::new(
                    server,
                    config.hidden_size,
                    moe.clone(),
                ))),
                _ => Self::dense(server, config),
            }),
            FfnRouting::Standard => Ok(Self::standard(server, config)),
        }
    }

    fn standard(server: &ServerArgs, config: &ModelConfig) -> Self {
        match &config.moe_config {
            Some(moe) if moe.is_moe() => {
                Self::Moe(Moe::new(server, config.hidden_size, moe.clone()))
            }
            _ => Self::dense(server, config),
        }
    }

    fn dense(server: &ServerArgs, config: &ModelConfig) -> Self {
        Self::Dense(DenseMlp::new(
            server,
            config.hidden_size,
            config.intermediate_size,
        ))
    }

    pub fn kind(&self) -> FfnKind {
        match self {
            Ffn::Dense(_) => FfnKind::DenseMlp,
            Ffn::Moe(_) | Ffn::QwenNext(_) => FfnKind::Moe,
        }
    }

    /// The MoE formula behind this block, if any
    pub fn as_moe(&self) -> Option<&Moe> {
        match self {
            Ffn::Dense(_) => None,
            Ffn::Moe(moe) => Some(moe),
            Ffn::QwenNext(ffn) => Some(ffn.as_moe()),
        }
    }

    pub fn weights_size(&self) -> u64 {
        match self {
            Ffn::Dense(mlp) => mlp.weights_size(),
            Ffn::Moe(moe) => moe.weights_size(),
            Ffn::QwenNext(ffn) => ffn.as_moe().weights_size(),
        }
    }
}
