pub mod memory;
pub mod model_utils;

pub use memory::{bytes_to_gib, bytes_to_mib, format_bytes, GIB, KIB, MIB};
pub use model_utils::{
    hf_hub_dir, list_model_snapshots, resolve_config_path, resolve_config_path_with_error,
    resolve_in_hub, CONFIG_FILE_NAME,
};
