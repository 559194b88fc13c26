pub mod aliases;
pub mod model;
pub mod server;

pub use model::{
    AttnConfig, ConfigError, FullAttnConfig, HybridAttnConfig, LinearAttnConfig, MhaConfig,
    MlaConfig, ModelConfig, MoeConfig, DEFAULT_MODEL_TYPE,
};
pub use server::{Precision, ServerArgs};
