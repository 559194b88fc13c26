//! Per-device memory estimate of a model under one serving setup

use crate::config::{ConfigError, ModelConfig, ServerArgs};
use crate::hardware::profiles::{get_chip_spec, ChipSpec};
use crate::hardware::scaling::{classify_fit, usable_memory_bytes, FitStatus};
use crate::layers::decoder::{DecoderBlock, DecoderBlocks, KvCacheSummary, WeightsSummary};
use crate::model::registry::{ModelFamily, ModelRegistry};
use crate::utils::memory::{bytes_to_gib, bytes_to_mib};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Longest context whose KV cache fits next to the weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLimit {
    Tokens(u64),
    /// KV cache does not grow with context (all-linear attention)
    Unbounded,
}

impl fmt::Display for ContextLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextLimit::Tokens(n) => write!(f, "{} tokens", n),
            ContextLimit::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryEstimate {
    pub model_type: String,
    pub family: ModelFamily,
    pub weights: WeightsSummary,
    pub kvcache: KvCacheSummary,
    pub weights_bytes: u64,
    pub context_length: u64,
    pub kvcache_bytes: u64,
    pub total_bytes: u64,
    pub device: String,
    /// `None` when the device type is not in the chip table
    pub device_memory_bytes: Option<u64>,
    pub fit: Option<FitStatus>,
    pub max_context_length: Option<ContextLimit>,
    pub generated_at: String,
}

#[derive(Debug, Clone)]
pub struct Model {
    family: ModelFamily,
    config: ModelConfig,
    server: ServerArgs,
    chip: Option<&'static ChipSpec>,
    blocks: DecoderBlocks,
}

impl Model {
    pub fn new(server: &ServerArgs, config: ModelConfig) -> Result<Self, ConfigError> {
        let family = ModelRegistry::lookup(&config.model_type);
        let chip = get_chip_spec(&server.device_type);
        if chip.is_none() {
            warn!(device = %server.device_type, "unknown device type, skipping capacity checks");
        }

        let blocks = DecoderBlocks::new(server, &config)?;
        info!(
            model_type = %config.model_type,
            family = %family,
            attention = config.attn_config.name(),
            layers = blocks.len(),
            tp = server.tp(),
            ep = server.ep(),
            "model loaded"
        );

        Ok(Self {
            family,
            config,
            server: server.clone(),
            chip,
            blocks,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn server(&self) -> &ServerArgs {
        &self.server
    }

    pub fn chip(&self) -> Option<&'static ChipSpec> {
        self.chip
    }

    pub fn blocks(&self) -> &DecoderBlocks {
        &self.blocks
    }

    pub fn get_decode_block(&self, layer_idx: usize) -> Option<&DecoderBlock> {
        self.blocks.get(layer_idx)
    }

    pub fn total_weights_size(&self) -> u64 {
        self.blocks.weights_bytes()
    }

    pub fn kvcache_bytes(&self, context_length: u64) -> u64 {
        self.blocks.kvcache_bytes(context_length)
    }

    /// Bytes left for the KV cache once weights are loaded
    pub fn kv_cache_capacity(&self) -> Option<u64> {
        let chip = self.chip?;
        Some(
            usable_memory_bytes(chip, self.server.gpu_memory_utilization)
                .saturating_sub(self.total_weights_size()),
        )
    }

    /// `None` without a known chip, or when weights plus the fixed state overflow the budget
    pub fn max_context_length(&self) -> Option<ContextLimit> {
        let chip = self.chip?;
        let budget = usable_memory_bytes(chip, self.server.gpu_memory_utilization);
        let fixed = self.kvcache_bytes(0);
        if self.total_weights_size() + fixed > budget {
            return None;
        }
        let capacity = budget - self.total_weights_size();

        let per_token = self.kvcache_bytes(1) - fixed;
        if per_token == 0 {
            Some(ContextLimit::Unbounded)
        } else {
            Some(ContextLimit::Tokens((capacity - fixed) / per_token))
        }
    }

    pub fn estimate(&self, context_length: u64) -> MemoryEstimate {
        let weights = self.blocks.weights_summary();
        let kvcache = self.blocks.kvcache_summary(context_length);
        let total_bytes = weights.total_weights_bytes + kvcache.total_bytes;

        MemoryEstimate {
            model_type: self.config.model_type.clone(),
            family: self.family,
            weights_bytes: weights.total_weights_bytes,
            kvcache_bytes: kvcache.total_bytes,
            weights,
            kvcache,
            context_length,
            total_bytes,
            device: self.server.device_type.clone(),
            device_memory_bytes: self.chip.map(|c| c.memory_bytes),
            fit: self
                .chip
                .map(|c| classify_fit(c, total_bytes, self.server.gpu_memory_utilization)),
            max_context_length: self.max_context_length(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Print per-device memory usage at `context_length`
    pub fn print_memory_estimate(&self, context_length: u64) {
        let estimate = self.estimate(context_length);

        println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Memory Estimate: {} ({})", estimate.model_type, estimate.family);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!(
            "  Parallelism:       TP={} EP={}",
            self.server.tp(),
            self.server.ep()
        );
        println!(
            "  Precision:         weights {:?}, KV cache {:?}",
            self.server.weight_precision(),
            self.server.kv_precision()
        );
        println!(
            "  Weights:           {:.2} GiB ({:.1} MiB)",
            bytes_to_gib(estimate.weights_bytes),
            bytes_to_mib(estimate.weights_bytes)
        );
        println!(
            "  KV cache:          {:.2} GiB @ {} tokens",
            bytes_to_gib(estimate.kvcache_bytes),
            context_length
        );
        println!("  Total:             {:.2} GiB", bytes_to_gib(estimate.total_bytes));

        match self.chip {
            Some(chip) => {
                let budget = usable_memory_bytes(chip, self.server.gpu_memory_utilization);
                println!(
                    "  Device:            {} ({:.0} GiB, {:.0}% usable)",
                    chip.name,
                    chip.memory_gib(),
                    self.server.gpu_memory_utilization * 100.0
                );
                println!(
                    "  Usage:             {:.1}%",
                    estimate.total_bytes as f64 / budget.max(1) as f64 * 100.0
                );
                match estimate.max_context_length {
                    Some(limit) => println!("  Max context:       {}", limit),
                    None => println!("  Max context:       none (weights exceed budget)"),
                }

                match estimate.fit {
                    Some(FitStatus::Unsafe) => {
                        println!("  Status:            ⚠️  UNSAFE - Does not fit on device!");
                        println!("\n  Recommendation: Increase TP/EP or enable fp8");
                    }
                    Some(FitStatus::Caution) => {
                        println!("  Status:            ⚠️  CAUTION - Little room for activations");
                    }
                    _ => println!("  Status:            ✓ SAFE"),
                }
            }
            None => println!("  Device:            {} (unknown)", self.server.device_type),
        }
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    }
}
