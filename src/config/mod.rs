pub mod env;
mod loader;

pub use env::{AlertConfig, AppConfig, DirectoryConfig, FetchConfig, FetchMode};
pub use loader::load_config;
