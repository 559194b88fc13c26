//! Decoder blocks: one attention + one feed-forward variant per layer

use crate::config::{ConfigError, ModelConfig, ServerArgs};
use crate::layers::attention::{AttnKind, Attention};
use crate::layers::ffn::{Ffn, FfnKind};
use crate::utils::memory::{bytes_to_gib, bytes_to_mib, format_bytes};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DecoderBlock {
    layer_idx: usize,
    attn: Attention,
    ffn: Ffn,
}

impl DecoderBlock {
    pub fn new(
        server: &ServerArgs,
        config: &ModelConfig,
        layer_idx: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            layer_idx,
            attn: Attention::create(server, config, layer_idx),
            ffn: Ffn::create(server, config, layer_idx)?,
        })
    }

    pub fn layer_idx(&self) -> usize {
        self.layer_idx
    }

    pub fn attn(&self) -> &Attention {
        &self.attn
    }

    pub fn ffn(&self) -> &Ffn {
        &self.ffn
    }

    pub fn weights_size(&self) -> u64 {
        self.attn.weights_size() + self.ffn.weights_size()
    }

    /// Only attention holds per-request state
    pub fn kvcache_bytes(&self, context_length: u64) -> u64 {
        self.attn.kvcache_bytes(context_length)
    }
}

/// Weight totals and layer-type distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightsSummary {
    pub num_layers: usize,
    pub attn_layers: BTreeMap<String, usize>,
    pub ffn_layers: BTreeMap<String, usize>,
    pub attn_weights_bytes: u64,
    pub ffn_weights_bytes: u64,
    pub total_weights_bytes: u64,
}

/// KV-cache totals at one context length
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KvCacheSummary {
    pub context_length: u64,
    /// Bytes contributed by each attention kind
    pub bytes_by_kind: BTreeMap<String, u64>,
    /// Part that does not grow with context (linear-attention state)
    pub fixed_bytes: u64,
    /// Growth per additional token
    pub bytes_per_token: u64,
    pub total_bytes: u64,
}

/// All decoder layers of a model, in order
#[derive(Debug, Clone)]
pub struct DecoderBlocks {
    blocks: Vec<DecoderBlock>,
}

impl DecoderBlocks {
    pub fn new(server: &ServerArgs, config: &ModelConfig) -> Result<Self, ConfigError> {
        let blocks = (0..config.num_hidden_layers)
            .map(|layer_idx| DecoderBlock::new(server, config, layer_idx))
            .collect::<Result<Vec<_>, _>>()?;

        let blocks = Self { blocks };
        debug!(
            layers = blocks.len(),
            attn = ?blocks.attn_distribution(),
            ffn = ?blocks.ffn_distribution(),
            "built decoder blocks"
        );
        Ok(blocks)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DecoderBlock> {
        self.blocks.iter()
    }

    pub fn get(&self, layer_idx: usize) -> Option<&DecoderBlock> {
        self.blocks.get(layer_idx)
    }

    pub fn blocks(&self) -> &[DecoderBlock] {
        &self.blocks
    }

    pub fn weights_bytes(&self) -> u64 {
        self.blocks.iter().map(DecoderBlock::weights_size).sum()
    }

    pub fn total_attn_weights(&self) -> u64 {
        self.blocks.iter().map(|b| b.attn().weights_size()).sum()
    }

    pub fn total_ffn_weights(&self) -> u64 {
        self.blocks.iter().map(|b| b.ffn().weights_size()).sum()
    }

    pub fn kvcache_bytes(&self, context_length: u64) -> u64 {
        self.blocks
            .iter()
            .map(|b| b.kvcache_bytes(context_length))
            .sum()
    }

    pub fn attn_distribution(&self) -> BTreeMap<AttnKind, usize> {
        let mut counts = BTreeMap::new();
        for block in &self.blocks {
            *counts.entry(block.attn().kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn ffn_distribution(&self) -> BTreeMap<FfnKind, usize> {
        let mut counts = BTreeMap::new();
        for block in &self.blocks {
            *counts.entry(block.ffn().kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn weights_summary(&self) -> WeightsSummary {
        let attn_weights_bytes = self.total_attn_weights();
        let ffn_weights_bytes = self.total_ffn_weights();

        WeightsSummary {
            num_layers: self.len(),
            attn_layers: self
                .attn_distribution()
                .into_iter()
                .map(|(kind, count)| (kind.to_string(), count))
                .collect(),
            ffn_layers: self
                .ffn_distribution()
                .into_iter()
                .map(|(kind, count)| (kind.to_string(), count))
                .collect(),
            attn_weights_bytes,
            ffn_weights_bytes,
            total_weights_bytes: attn_weights_bytes + ffn_weights_bytes,
        }
    }

    pub fn kvcache_summary(&self, context_length: u64) -> KvCacheSummary {
        let mut bytes_by_kind: BTreeMap<String, u64> = BTreeMap::new();
        for block in &self.blocks {
            *bytes_by_kind
                .entry(block.attn().kind().to_string())
                .or_insert(0) += block.kvcache_bytes(context_length);
        }

        // Every formula is affine in the context length
        let fixed_bytes = self.kvcache_bytes(0);
        let bytes_per_token = self.kvcache_bytes(1) - fixed_bytes;

        KvCacheSummary {
            context_length,
            bytes_by_kind,
            fixed_bytes,
            bytes_per_token,
            total_bytes: self.kvcache_bytes(context_length),
        }
    }

    /// Print the layer distribution and weight totals
    pub fn print_decode_block_weights_info(&self) {
        let summary = self.weights_summary();

        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Decoder Block Weights");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("  Layers:            {}", summary.num_layers);
        println!("  Attention layers:  {}", format_distribution(&summary.attn_layers));
        println!("  FFN layers:        {}", format_distribution(&summary.ffn_layers));
        println!(
            "  Attention weights: {} ({:.2} MiB)",
            format_bytes(summary.attn_weights_bytes),
            bytes_to_mib(summary.attn_weights_bytes)
        );
        println!(
            "  FFN weights:       {} ({:.2} MiB)",
            format_bytes(summary.ffn_weights_bytes),
            bytes_to_mib(summary.ffn_weights_bytes)
        );
        println!(
            "  Total weights:     {:.4} GiB ({:.2} MiB)",
            bytes_to_gib(summary.total_weights_bytes),
            bytes_to_mib(summary.total_weights_bytes)
        );
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    /// Print the KV cache breakdown at `context_length`
    pub fn print_kvcache_info(&self, context_length: u64) {
        let summary = self.kvcache_summary(context_length);

        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("KV Cache @ {} tokens", context_length);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (kind, bytes) in &summary.bytes_by_kind {
            println!("  {:<18} {}", format!("{}:", kind), format_bytes(*bytes));
        }
        println!("  Fixed state:       {}", format_bytes(summary.fixed_bytes));
        println!("  Per token:         {}", format_bytes(summary.bytes_per_token));
        println!(
            "  Total:             {:.4} GiB ({:.2} MiB)",
            bytes_to_gib(summary.total_bytes),
            bytes_to_mib(summary.total_bytes)
        );
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

impl<'a> IntoIterator for &'a DecoderBlocks {
    type Item = &'a DecoderBlock;
    type IntoIter = std::slice::Iter<'a, DecoderBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn format_distribution(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(kind, count)| format!("{}: {}", kind, count))
        .collect::<Vec<_>>()
        .join(", ")
}
