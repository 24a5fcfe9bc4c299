pub mod cli_registry;
pub mod codex;
pub mod json_map;

pub use cli_registry::{CliRegistryDriver, RegistrySyncStats};
pub use codex::CodexTomlDriver;
pub use json_map::JsonMapDriver;
