//! Fitting an estimate onto a device

use crate::hardware::profiles::ChipSpec;
use crate::utils::memory::bytes_to_gib;
use serde::Serialize;

/// Above this share of the usable budget a deployment leaves little room for activations
const CAUTION_UTILIZATION: f64 = 0.90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitStatus {
    Safe,
    Caution,
    Unsafe,
}

/// Bytes the server may claim on `chip`
pub fn usable_memory_bytes(chip: &ChipSpec, gpu_memory_utilization: f64) -> u64 {
    (chip.memory_bytes as f64 * gpu_memory_utilization.clamp(0.0, 1.0)) as u64
}

/// Usable bytes left after `used_bytes`
pub fn calculate_memory_headroom(
    chip: &ChipSpec,
    used_bytes: u64,
    gpu_memory_utilization: f64,
) -> u64 {
    usable_memory_bytes(chip, gpu_memory_utilization).saturating_sub(used_bytes)
}

pub fn classify_fit(chip: &ChipSpec, used_bytes: u64, gpu_memory_utilization: f64) -> FitStatus {
    let budget = usable_memory_bytes(chip, gpu_memory_utilization);
    if used_bytes > budget {
        FitStatus::Unsafe
    } else if used_bytes as f64 > budget as f64 * CAUTION_UTILIZATION {
        FitStatus::Caution
    } else {
        FitStatus::Safe
    }
}

/// Validate that `used_bytes` fits the usable budget of `chip`
pub fn validate_fit(
    chip: &ChipSpec,
    used_bytes: u64,
    gpu_memory_utilization: f64,
) -> (bool, String) {
    let budget = usable_memory_bytes(chip, gpu_memory_utilization);
    let used_gb = bytes_to_gib(used_bytes);
    let budget_gb = bytes_to_gib(budget);

    if used_bytes > budget {
        return (
            false,
            format!(
                "Exceeds {} budget by {:.1}GiB ({:.1}GiB > {:.1}GiB)",
                chip.name,
                used_gb - budget_gb,
                used_gb,
                budget_gb
            ),
        );
    }

    let utilization = if budget == 0 {
        0.0
    } else {
        used_bytes as f64 / budget as f64 * 100.0
    };
    (
        true,
        format!(
            "Fits on {} ({:.1}GiB / {:.1}GiB, {:.1}% of budget)",
            chip.name, used_gb, budget_gb, utilization
        ),
    )
}
