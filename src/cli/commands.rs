//! CLI command implementations

use super::ServingArgs;
use anyhow::{Context, Result};
use llm_footprint::config::{ModelConfig, ServerArgs};
use llm_footprint::hardware::{
    detect_hardware, get_chip_spec, list_chip_specs, normalize_device_name, validate_fit,
};
use llm_footprint::model::{MemoryEstimate, Model, ModelRegistry};
use llm_footprint::utils::{format_bytes, resolve_config_path_with_error, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn server_args(serving: &ServingArgs) -> Result<ServerArgs> {
    let mut server = match &serving.server_args {
        Some(path) => ServerArgs::load(path)?,
        None => ServerArgs::default(),
    };

    if let Some(device) = &serving.device {
        server.device_type = normalize_device_name(device).unwrap_or_else(|| device.clone());
    }
    if let Some(tp) = serving.tp {
        server.tp_size = tp;
    }
    if let Some(ep) = serving.ep {
        server.ep_size = ep;
    }
    if let Some(world_size) = serving.world_size {
        server.world_size = world_size;
    }
    if let Some(utilization) = serving.gpu_memory_utilization {
        if !(0.0..=1.0).contains(&utilization) {
            anyhow::bail!("--gpu-memory-utilization must be within [0, 1], got {}", utilization);
        }
        server.gpu_memory_utilization = utilization;
    }
    server.use_fp8_gemm |= serving.fp8_weights;
    server.use_fp8_kv |= serving.fp8_kv;

    Ok(server)
}

fn config_path(serving: &ServingArgs, server: &ServerArgs) -> Result<PathBuf> {
    let path = if let Some(path) = &serving.config {
        path.clone()
    } else if let Some(model) = &serving.model {
        resolve_config_path_with_error(model)?
    } else if let Some(path) = &server.config_path {
        path.clone()
    } else {
        anyhow::bail!("No model given. Use --config <path> or --model <hf-id>");
    };

    if path.is_dir() {
        Ok(path.join(CONFIG_FILE_NAME))
    } else {
        Ok(path)
    }
}

fn load_model(serving: &ServingArgs) -> Result<Model> {
    let server = server_args(serving)?;
    let path = config_path(serving, &server)?;
    info!(config = %path.display(), "loading model config");

    let config = ModelConfig::from_json(&path)
        .with_context(|| format!("Failed to load model config from {}", path.display()))?;
    Ok(ModelRegistry::create(&server, config)?)
}

pub fn estimate(serving: &ServingArgs, contexts: &[u64], output: Option<&Path>) -> Result<()> {
    let model = load_model(serving)?;
    let mut estimates: Vec<MemoryEstimate> = Vec::with_capacity(contexts.len());

    for &context_length in contexts {
        model.print_memory_estimate(context_length);
        let estimate = model.estimate(context_length);

        if let Some(chip) = model.chip() {
            let (fits, message) = validate_fit(
                chip,
                estimate.total_bytes,
                model.server().gpu_memory_utilization,
            );
            if fits {
                info!("{}", message);
            } else {
                warn!("{}", message);
            }
        }
        estimates.push(estimate);
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&estimates)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Estimates saved to {}", path.display());
    }

    Ok(())
}

pub fn layers(serving: &ServingArgs, context: u64) -> Result<()> {
    let model = load_model(serving)?;
    let blocks = model.blocks();

    println!(
        "\n{:>5}  {:<8} {:<9} {:>12} {:>12} {:>12}",
        "Layer", "Attn", "FFN", "Attn W", "FFN W", "KV cache"
    );
    for block in blocks {
        println!(
            "{:>5}  {:<8} {:<9} {:>12} {:>12} {:>12}",
            block.layer_idx(),
            block.attn().kind(),
            block.ffn().kind(),
            format_bytes(block.attn().weights_size()),
            format_bytes(block.ffn().weights_size()),
            format_bytes(block.kvcache_bytes(context)),
        );
    }
    println!();

    blocks.print_decode_block_weights_info();
    blocks.print_kvcache_info(context);
    Ok(())
}

pub fn devices(detect: bool) -> Result<()> {
    println!(
        "\n{:<8} {:<7} {:>9} {:>12} {:>11} {:>10}",
        "Device", "Vendor", "Memory", "Bandwidth", "BF16 TFLOPS", "FP8 TFLOPS"
    );
    for chip in list_chip_specs() {
        println!(
            "{:<8} {:<7} {:>6.0} GiB {:>7.0} GB/s {:>11.0} {:>10.0}",
            chip.name,
            chip.vendor,
            chip.memory_gib(),
            chip.memory_bandwidth_gbps,
            chip.bf16_tflops,
            chip.fp8_tflops
        );
    }

    if detect {
        println!();
        match detect_hardware() {
            Ok((device_type, count)) => {
                let memory = get_chip_spec(&device_type)
                    .map(|chip| format_bytes(chip.memory_bytes))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("Detected: {} x {} ({} each)", count, device_type, memory);
            }
            Err(e) => println!("Could not detect GPUs: {}", e),
        }
    }

    Ok(())
}

pub fn models() -> Result<()> {
    println!("Registered model types:");
    for model_type in ModelRegistry::registered_types() {
        println!("  {:<14} -> {}", model_type, ModelRegistry::lookup(model_type));
    }
    println!("Other model types use the default family.");
    Ok(())
}
