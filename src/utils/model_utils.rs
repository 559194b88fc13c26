//! Locating a model's `config.json`
//!
//! A model can be named by:
//! - a direct path to a config file
//! - a model directory containing `config.json`
//! - a HuggingFace model name already present in the local hub cache

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// HuggingFace hub cache directory (`$HF_HOME/hub` or `~/.cache/huggingface/hub`)
pub fn hf_hub_dir() -> Option<PathBuf> {
    if let Ok(hf_home) = std::env::var("HF_HOME") {
        return Some(PathBuf::from(hf_home).join("hub"));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".cache/huggingface/hub"))
}

/// Resolves a model name or path to its `config.json`
pub fn resolve_config_path(model_name: &str) -> Option<PathBuf> {
    let path = Path::new(model_name);
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if path.is_dir() {
        let config = path.join(CONFIG_FILE_NAME);
        return config.is_file().then_some(config);
    }

    if model_name.contains('/') {
        return resolve_in_hub(&hf_hub_dir()?, model_name);
    }

    None
}

/// Resolves a model name or path to its `config.json` with error handling
pub fn resolve_config_path_with_error(model_name: &str) -> Result<PathBuf> {
    resolve_config_path(model_name).with_context(|| {
        format!(
            "Model config not found: {}. Pass a config.json path or download it first using: \
             huggingface-cli download {} config.json",
            model_name, model_name
        )
    })
}

/// Looks for `config.json` in the cached snapshots of `model_name`, newest first
pub fn resolve_in_hub(hub_dir: &Path, model_name: &str) -> Option<PathBuf> {
    list_model_snapshots(hub_dir, model_name)
        .into_iter()
        .map(|snapshot| snapshot.join(CONFIG_FILE_NAME))
        .find(|config| config.is_file())
}

/// Lists snapshot directories for a model in the hub cache, newest first
pub fn list_model_snapshots(hub_dir: &Path, model_name: &str) -> Vec<PathBuf> {
    let cache_name = format!("models--{}", model_name.replace('/', "--"));
    let snapshots_dir = hub_dir.join(cache_name).join("snapshots");

    let Ok(entries) = std::fs::read_dir(&snapshots_dir) else {
        return Vec::new();
    };

    let mut snapshots: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().ok().is_some_and(|ft| ft.is_dir()))
        .map(|e| e.path())
        .collect();

    snapshots.sort_by(|a, b| {
        let a_time = a.metadata().ok().and_then(|m| m.modified().ok());
        let b_time = b.metadata().ok().and_then(|m| m.modified().ok());
        b_time.cmp(&a_time)
    });

    snapshots
}
