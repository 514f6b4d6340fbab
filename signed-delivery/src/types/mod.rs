mod config;
mod environment;

pub use config::{
    CdnConfig, Config, ConfigError, PolicyConfig, StorageConfig, UploadConfig, MAX_ATTEMPTS,
};
pub use environment::Environment;
