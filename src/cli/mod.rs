pub mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "llm-footprint")]
#[command(about = "Estimate per-GPU weight and KV cache memory of LLM deployments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Model and serving options shared by every estimating command
#[derive(Args, Debug, Clone)]
pub struct ServingArgs {
    /// Path to a HuggingFace `config.json` (or its directory)
    #[arg(long, conflicts_with = "model")]
    pub config: Option<PathBuf>,
    /// HuggingFace model id, resolved through the local hub cache
    #[arg(long)]
    pub model: Option<String>,
    /// JSON file with serving parameters; flags below override it
    #[arg(long)]
    pub server_args: Option<PathBuf>,
    /// Device type, e.g. H100 or "NVIDIA H20"
    #[arg(long)]
    pub device: Option<String>,
    /// Tensor-parallel degree
    #[arg(long)]
    pub tp: Option<usize>,
    /// Expert-parallel degree (defaults to world size)
    #[arg(long)]
    pub ep: Option<usize>,
    #[arg(long)]
    pub world_size: Option<usize>,
    /// Store weights in fp8
    #[arg(long)]
    pub fp8_weights: bool,
    /// Store the KV cache in fp8
    #[arg(long)]
    pub fp8_kv: bool,
    /// Fraction of device memory the server may use
    #[arg(long)]
    pub gpu_memory_utilization: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate weights + KV cache memory per device
    Estimate {
        #[command(flatten)]
        serving: ServingArgs,
        /// Context length in tokens (repeatable)
        #[arg(long = "context", default_values_t = vec![4096u64])]
        contexts: Vec<u64>,
        /// Save estimates to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show per-layer attention / FFN breakdown
    Layers {
        #[command(flatten)]
        serving: ServingArgs,
        /// Context length for the KV cache breakdown
        #[arg(long, default_value_t = 4096)]
        context: u64,
    },
    /// List known devices
    Devices {
        /// Also query local GPUs with nvidia-smi
        #[arg(long)]
        detect: bool,
    },
    /// List registered model types
    Models,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            serving,
            contexts,
            output,
        } => commands::estimate(&serving, &contexts, output.as_deref()),
        Commands::Layers { serving, context } => commands::layers(&serving, context),
        Commands::Devices { detect } => commands::devices(detect),
        Commands::Models => commands::models(),
    }
}
