//! Accelerator detection via `nvidia-smi`

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Command;

static DEVICE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(B200|H200|H100|H800|H20|A100|A800|L40S|MI300X)\b").unwrap()
});

/// Map a marketing name such as "NVIDIA H100 80GB HBM3" to a chip-table key
pub fn normalize_device_name(name: &str) -> Option<String> {
    DEVICE_PATTERN
        .captures(name)
        .map(|caps| caps[1].to_uppercase())
}

/// Names of all visible GPUs, one per device
pub fn query_gpu_names() -> anyhow::Result<Vec<String>> {
    let output = Command::new("nvidia-smi")
        .arg("--query-gpu=name")
        .arg("--format=csv,noheader")
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "nvidia-smi failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8(output.stdout)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Chip-table key of the first visible GPU
pub fn detect_device_type() -> anyhow::Result<String> {
    detect_hardware().map(|(device_type, _)| device_type)
}

/// Auto-detect the device type and count of the local GPUs
///
/// Returns: (device_type, gpu_count)
pub fn detect_hardware() -> anyhow::Result<(String, usize)> {
    let names = query_gpu_names()?;
    let first = names
        .first()
        .ok_or_else(|| anyhow::anyhow!("nvidia-smi reported no GPUs"))?;
    let device_type = normalize_device_name(first)
        .ok_or_else(|| anyhow::anyhow!("Unrecognized GPU: {}", first))?;

    Ok((device_type, names.len()))
}
