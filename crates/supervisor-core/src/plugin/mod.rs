//! Rule plugins: the contract, the registry, manifest-backed process
//! plugins, and the lifecycle manager.

pub mod contract;
pub mod manager;
pub mod manifest;
pub mod registry;

pub use contract::{PluginInfo, PluginLoader, RulePlugin};
pub use manager::{DirectoryLoadReport, PluginLoadFailure, PluginManager};
pub use manifest::{ManifestPluginLoader, PluginCommand, ProcessPlugin, SUPPORTED_EXTENSIONS};
pub use registry::PluginRegistry;
