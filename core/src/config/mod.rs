mod load;
mod types;

pub use load::{load_default, load_from_path, CONFIG_ENV_VAR, MAX_WORKERS_ENV_VAR};
pub use types::{AppConfig, ExecutorConfig, LoggingConfig};
