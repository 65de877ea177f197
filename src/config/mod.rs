//! Configuration record and loader (§4.I, §6).

pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{ClusterEntry, Config, CustomFieldAlias, DisplayMode, HostField, Node, NodeRole, PathField};
