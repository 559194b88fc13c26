pub mod detection;
pub mod profiles;
pub mod scaling;

pub use detection::{detect_hardware, normalize_device_name, query_gpu_names};
pub use profiles::{get_chip_spec, list_chip_specs, ChipSpec, CHIP_SPECS};
pub use scaling::{
    calculate_memory_headroom, classify_fit, usable_memory_bytes, validate_fit, FitStatus,
};
