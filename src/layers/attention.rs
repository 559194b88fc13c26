//! Attention variants and their memory formulas
//!
//! Every variant answers two questions for a single decoder layer on a single
//! device: how many bytes its weights take, and how many bytes its KV cache
//! (or recurrent state) takes at a given context length.

use crate::config::{
    AttnConfig, FullAttnConfig, LinearAttnConfig, MhaConfig, MlaConfig, ModelConfig, ServerArgs,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AttnKind {
    #[serde(rename = "MHA")]
    Mha,
    #[serde(rename = "MLA")]
    Mla,
    Linear,
}

impl AttnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttnKind::Mha => "MHA",
            AttnKind::Mla => "MLA",
            AttnKind::Linear => "Linear",
        }
    }

    /// Full attention keeps one cache entry per token
    pub fn is_full_attention(self) -> bool {
        !matches!(self, AttnKind::Linear)
    }
}

impl fmt::Display for AttnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Grouped-query multi-head attention
#[derive(Debug, Clone)]
pub struct MhaAttn {
    config: MhaConfig,
    hidden_size: u64,
    weight_bytes: u64,
    kv_bytes: u64,
    tp: u64,
}

impl MhaAttn {
    pub fn new(server: &ServerArgs, hidden_size: usize, config: MhaConfig) -> Self {
        Self {
            config,
            hidden_size: hidden_size as u64,
            weight_bytes: server.weight_precision().bytes_per_element(),
            kv_bytes: server.kv_precision().bytes_per_element(),
            tp: server.tp(),
        }
    }

    pub fn config(&self) -> &MhaConfig {
        &self.config
    }

    /// q/o projections scale with attention heads, k/v with key/value heads
    pub fn num_elements(&self) -> u64 {
        let h = self.hidden_size;
        let head_dim = self.config.head_dim as u64;
        let heads = self.config.num_attention_heads as u64;
        let kv_heads = self.config.num_key_value_heads as u64;

        2 * h * heads * head_dim + 2 * h * kv_heads * head_dim
    }

    /// Rounded up per device after sharding, so fp8 is exactly half only when TP divides the bytes
    pub fn weights_size(&self) -> u64 {
        (self.num_elements() * self.weight_bytes).div_ceil(self.tp)
    }

    /// KV heads held by one device; heads are replicated when TP exceeds them
    pub fn kv_heads_per_device(&self) -> u64 {
        (self.config.num_key_value_heads as u64).div_ceil(self.tp)
    }

    pub fn kvcache_bytes(&self, context_length: u64) -> u64 {
        2 * self.kv_heads_per_device()
            * self.config.head_dim as u64
            * context_length
            * self.kv_bytes
    }
}

/// Multi-head latent attention
#[derive(Debug, Clone)]
pub struct MlaAttn {
    config: MlaConfig,
    hidden_size: u64,
    weight_bytes: u64,
    kv_bytes: u64,
    tp: u64,
}

impl MlaAttn {
    pub fn new(server: &ServerArgs, hidden_size: usize, config: MlaConfig) -> Self {
        Self {
            config,
            hidden_size: hidden_size as u64,
            weight_bytes: server.weight_precision().bytes_per_element(),
            kv_bytes: server.kv_precision().bytes_per_element(),
            tp: server.tp(),
        }
    }

    pub fn config(&self) -> &MlaConfig {
        &self.config
    }

    /// Latent down-projections and the decoupled rope key; replicated on every device
    pub fn replicated_elements(&self) -> u64 {
        let h = self.hidden_size;
        let q_down = self.config.q_lora_rank.map_or(0, |rank| h * rank as u64);
        let kv_down = h * (self.config.kv_lora_rank + self.config.qk_rope_head_dim) as u64;
        q_down + kv_down
    }

    /// Per-head up-projections and the output projection; sharded across TP ranks
    pub fn sharded_elements(&self) -> u64 {
        let h = self.hidden_size;
        let heads = self.config.num_attention_heads as u64;
        let qk_head_dim = self.config.qk_head_dim as u64;
        let v_head_dim = self.config.v_head_dim as u64;

        let q_in = self.config.q_lora_rank.map_or(h, |rank| rank as u64);
        let q_up = q_in * heads * qk_head_dim;
        let kv_up = self.config.kv_lora_rank as u64
            * heads
            * (self.config.qk_nope_head_dim as u64 + v_head_dim);
        let o_proj = heads * v_head_dim * h;

        q_up + kv_up + o_proj
    }

    pub fn num_elements(&self) -> u64 {
        self.replicated_elements() + self.sharded_elements()
    }

    /// Replicated part plus the sharded part rounded up per device
    pub fn weights_size(&self) -> u64 {
        self.replicated_elements() * self.weight_bytes
            + (self.sharded_elements() * self.weight_bytes).div_ceil(self.tp)
    }

    /// Compressed latent plus rope key per token; not sharded by TP
    pub fn kvcache_bytes(&self, context_length: u64) -> u64 {
        (self.config.kv_lora_rank + self.config.qk_rope_head_dim) as u64
            * context_length
            * self.kv_bytes
    }
}

/// Linear attention with a fixed-size recurrent state
#[derive(Debug, Clone)]
pub struct LinearAttn {
    config: LinearAttnConfig,
    hidden_size: u64,
    weight_bytes: u64,
    kv_bytes: u64,
    tp: u64,
}

impl LinearAttn {
    pub fn new(server: &ServerArgs, hidden_size: usize, config: LinearAttnConfig) -> Self {
        Self {
            config,
            hidden_size: hidden_size as u64,
            weight_bytes: server.weight_precision().bytes_per_element(),
            kv_bytes: server.kv_precision().bytes_per_element(),
            tp: server.tp(),
        }
    }

    pub fn config(&self) -> &LinearAttnConfig {
        &self.config
    }

    fn key_dim(&self) -> u64 {
        (self.config.num_key_heads * self.config.key_head_dim) as u64
    }

    fn value_dim(&self) -> u64 {
        (self.config.num_value_heads * self.config.value_head_dim) as u64
    }

    fn conv_elements(&self) -> u64 {
        self.config.conv_kernel_dim as u64 * (self.key_dim() + self.value_dim())
    }

    pub fn num_elements(&self) -> u64 {
        let h = self.hidden_size;
        // q, k from the key width; v and the output gate from the value width
        let in_proj = h * (2 * self.key_dim() + 2 * self.value_dim());
        let out_proj = self.value_dim() * h;
        self.conv_elements() + in_proj + out_proj
    }

    /// Rounded up per device after sharding, so fp8 is exactly half only when TP divides the bytes
    pub fn weights_size(&self) -> u64 {
        (self.num_elements() * self.weight_bytes).div_ceil(self.tp)
    }

    /// Convolution window plus one key x value state matrix per value head
    pub fn state_elements(&self) -> u64 {
        let recurrent = (self.config.num_value_heads
            * self.config.key_head_dim
            * self.config.value_head_dim) as u64;
        self.conv_elements() + recurrent
    }

    /// Independent of `context_length`
    pub fn kvcache_bytes(&self, _context_length: u64) -> u64 {
        (self.state_elements() * self.kv_bytes).div_ceil(self.tp)
    }
}

/// Attention mechanism of one decoder layer
#[derive(Debug, Clone)]
pub enum Attention {
    Mha(MhaAttn),
    Mla(MlaAttn),
    Linear(LinearAttn),
}

impl Attention {
    /// Resolve the attention variant used by `layer_idx`
    pub fn create(server: &ServerArgs, config: &ModelConfig, layer_idx: usize) -> Self {
        let hidden_size = config.hidden_size;
        match &config.attn_config {
            AttnConfig::Mha(mha) => Self::Mha(MhaAttn::new(server, hidden_size, mha.clone())),
            AttnConfig::Mla(mla) => Self::Mla(MlaAttn::new(server, hidden_size, mla.clone())),
            AttnConfig::Linear(linear) => {
                Self::Linear(LinearAttn::new(server, hidden_size, linear.clone()))
            }
            AttnConfig::Hybrid(hybrid) => {
                if hybrid.is_full_attn_layer(layer_idx) {
                    Self::full(server, hidden_size, &hybrid.full_attn_config)
                } else {
                    Self::Linear(LinearAttn::new(
                        server,
                        hidden_size,
                        hybrid.linear_attn_config.clone(),
                    ))
                }
            }
        }
    }

    fn full(server: &ServerArgs, hidden_size: usize, config: &FullAttnConfig) -> Self {
        match config {
            FullAttnConfig::Mha(mha) => Self::Mha(MhaAttn::new(server, hidden_size, mha.clone())),
            FullAttnConfig::Mla(mla) => Self::Mla(MlaAttn::new(server, hidden_size, mla.clone())),
        }
    }

    pub fn kind(&self) -> AttnKind {
        match self {
            Attention::Mha(_) => AttnKind::Mha,
            Attention::Mla(_) => AttnKind::Mla,
            Attention::Linear(_) => AttnKind::Linear,
        }
    }

    pub fn weights_size(&self) -> u64 {
        match self {
            Attention::Mha(attn) => attn.weights_size(),
            Attention::Mla(attn) => attn.weights_size(),
            Attention::Linear(attn) => attn.weights_size(),
        }
    }

    pub fn kvcache_bytes(&self, context_length: u64) -> u64 {
        match self {
            Attention::Mha(attn) => attn.kvcache_bytes(context_length),
            Attention::Mla(attn) => attn.kvcache_bytes(context_length),
            Attention::Linear(attn) => attn.kvcache_bytes(context_length),
        }
    }
}
