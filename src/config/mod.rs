pub mod env;
mod loader;

pub use env::{
    AppConfig, DirectoryConfig, OpenRouterConfig, PreviewConfig, StorageBackend, StorageConfig,
};
pub use loader::load_config;
