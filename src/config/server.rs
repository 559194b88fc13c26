use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Numeric precision of stored weights or cached keys/values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    Fp8,
    /// Any 16-bit format (bf16 / fp16)
    Half,
}

impl Precision {
    pub fn from_fp8(use_fp8: bool) -> Self {
        if use_fp8 {
            Precision::Fp8
        } else {
            Precision::Half
        }
    }

    pub fn bytes_per_element(self) -> u64 {
        match self {
            Precision::Fp8 => 1,
            Precision::Half => 2,
        }
    }
}

/// Serving parameters: precision and parallelism of a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerArgs {
    pub config_path: Option<PathBuf>,
    /// Key into the chip table, e.g. "H100"
    pub device_type: String,
    /// Store weights in fp8
    pub use_fp8_gemm: bool,
    /// Store the KV cache in fp8
    pub use_fp8_kv: bool,
    pub tp_size: usize,
    /// 0 = unset, falls back to `world_size`
    pub ep_size: usize,
    pub world_size: usize,
    /// Fraction of device memory the server may claim (weights + KV cache)
    pub gpu_memory_utilization: f64,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            config_path: None,
            device_type: "H100".to_string(),
            use_fp8_gemm: false,
            use_fp8_kv: false,
            tp_size: 1,
            ep_size: 0,
            world_size: 1,
            gpu_memory_utilization: 0.9,
        }
    }
}

impl ServerArgs {
    /// Load serving parameters from a JSON file; missing fields take defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read server args from {}", path.display()))?;
        let args: Self = serde_json::from_str(&json)
            .with_context(|| format!("invalid server args in {}", path.display()))?;
        Ok(args)
    }

    pub fn weight_precision(&self) -> Precision {
        Precision::from_fp8(self.use_fp8_gemm)
    }

    pub fn kv_precision(&self) -> Precision {
        Precision::from_fp8(self.use_fp8_kv)
    }

    /// Effective tensor-parallel degree (never 0)
    pub fn tp(&self) -> u64 {
        self.tp_size.max(1) as u64
    }

    /// Effective expert-parallel degree: `ep_size` if set, else the world size
    pub fn ep(&self) -> u64 {
        if self.ep_size > 0 {
            self.ep_size as u64
        } else {
            self.world_size.max(1) as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = ServerArgs::default();
        assert_eq!(args.tp(), 1);
        assert_eq!(args.ep(), 1);
        assert_eq!(args.weight_precision(), Precision::Half);
        assert_eq!(args.kv_precision(), Precision::Half);
    }

    #[test]
    fn test_ep_falls_back_to_world_size() {
        let args = ServerArgs {
            world_size: 8,
            ..Default::default()
        };
        assert_eq!(args.ep(), 8);

        let args = ServerArgs {
            world_size: 8,
            ep_size: 4,
            ..Default::default()
        };
        assert_eq!(args.ep(), 4);
    }

    #[test]
    fn test_zero_degrees_clamp_to_one() {
        let args = ServerArgs {
            tp_size: 0,
            world_size: 0,
            ..Default::default()
        };
        assert_eq!(args.tp(), 1);
        assert_eq!(args.ep(), 1);
    }

    #[test]
    fn test_bytes_per_element() {
        assert_eq!(Precision::Fp8.bytes_per_element(), 1);
        assert_eq!(Precision::Half.bytes_per_element(), 2);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, r#"{"tp_size": 8, "use_fp8_kv": true}"#).unwrap();

        let args = ServerArgs::load(&path).unwrap();
        assert_eq!(args.tp(), 8);
        assert!(args.use_fp8_kv);
        assert!(!args.use_fp8_gemm);
        assert_eq!(args.device_type, "H100");
    }
}
