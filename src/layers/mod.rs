pub mod attention;
pub mod decoder;
pub mod ffn;

pub use attention::{AttnKind, Attention, LinearAttn, MhaAttn, MlaAttn};
pub use decoder::{DecoderBlock, DecoderBlocks, KvCacheSummary, WeightsSummary};
pub use ffn::{DenseMlp, Ffn, FfnKind, FfnRouting, Moe, QwenNextFfn};
