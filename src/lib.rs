//! GPU memory estimation for transformer decoders
//!
//! Computes per-device weight and KV cache bytes of a HuggingFace model
//! under a given serving setup (tensor / expert parallelism, fp8).
//!
//! ## Main Components
//!
//! - `config`: Model `config.json` parsing and serving parameters
//! - `layers`: Attention and feed-forward variants, decoder blocks
//! - `model`: Model-family registry and the `Model` estimate handle
//! - `hardware`: Chip table, device detection and fit checks
//! - `utils`: Byte formatting and config path resolution

pub mod config;
pub mod hardware;
pub mod layers;
pub mod model;
pub mod utils;

pub use config::{ConfigError, ModelConfig, ServerArgs};
pub use layers::DecoderBlocks;
pub use model::{MemoryEstimate, Model, ModelRegistry};

/// Library errors
pub use anyhow::{Error, Result};
