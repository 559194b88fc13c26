pub mod estimator;
pub mod registry;

pub use estimator::{ContextLimit, MemoryEstimate, Model};
pub use registry::{ModelFamily, ModelRegistry, MODEL_REGISTRY};
