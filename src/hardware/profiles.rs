//! Accelerator specifications

use crate::utils::memory::{bytes_to_gib, GIB};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Memory and dense-compute figures for one accelerator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipSpec {
    pub name: &'static str,
    pub vendor: &'static str,
    pub memory_bytes: u64,
    /// Memory bandwidth in GB/s
    pub memory_bandwidth_gbps: f64,
    pub bf16_tflops: f64,
    /// 0.0 when the chip has no fp8 tensor cores
    pub fp8_tflops: f64,
}

impl ChipSpec {
    pub fn memory_gib(&self) -> f64 {
        bytes_to_gib(self.memory_bytes)
    }

    pub fn supports_fp8(&self) -> bool {
        self.fp8_tflops > 0.0
    }
}

fn chip(
    name: &'static str,
    vendor: &'static str,
    memory_gib: u64,
    memory_bandwidth_gbps: f64,
    bf16_tflops: f64,
    fp8_tflops: f64,
) -> ChipSpec {
    ChipSpec {
        name,
        vendor,
        memory_bytes: memory_gib * GIB,
        memory_bandwidth_gbps,
        bf16_tflops,
        fp8_tflops,
    }
}

/// Chip specs keyed by upper-case device type
pub static CHIP_SPECS: Lazy<HashMap<String, ChipSpec>> = Lazy::new(|| {
    let mut chips = HashMap::new();

    for entry in [
        chip("H100", "NVIDIA", 80, 3350.0, 989.0, 1979.0),
        chip("H800", "NVIDIA", 80, 3350.0, 989.0, 1979.0),
        chip("H200", "NVIDIA", 141, 4800.0, 989.0, 1979.0),
        chip("H20", "NVIDIA", 96, 4000.0, 148.0, 296.0),
        chip("A100", "NVIDIA", 80, 2039.0, 312.0, 0.0),
        chip("A800", "NVIDIA", 80, 2039.0, 312.0, 0.0),
        chip("B200", "NVIDIA", 180, 8000.0, 2250.0, 4500.0),
        chip("L40S", "NVIDIA", 48, 864.0, 362.0, 733.0),
        chip("MI300X", "AMD", 192, 5300.0, 1307.0, 2615.0),
    ] {
        chips.insert(entry.name.to_string(), entry);
    }

    chips
});

/// Look up a chip by device type (case-insensitive)
pub fn get_chip_spec(device_type: &str) -> Option<&'static ChipSpec> {
    CHIP_SPECS.get(&device_type.trim().to_uppercase())
}

/// All known chips, sorted by name
pub fn list_chip_specs() -> Vec<&'static ChipSpec> {
    let mut chips: Vec<_> = CHIP_SPECS.values().collect();
    chips.sort_by_key(|c| c.name);
    chips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_chip_spec() {
        let h100 = get_chip_spec("h100").unwrap();
        assert_eq!(h100.name, "H100");
        assert_eq!(h100.memory_gib(), 80.0);
        assert!(h100.supports_fp8());

        assert!(!get_chip_spec("A100").unwrap().supports_fp8());
        assert!(get_chip_spec("TPUv5").is_none());
    }

    #[test]
    fn test_list_is_sorted() {
        let names: Vec<_> = list_chip_specs().iter().map(|c| c.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), CHIP_SPECS.len());
    }
}
