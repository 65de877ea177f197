//! schema-forge -- declarative schema-management and migration engine for
//! PostgreSQL (§1-2).
//!
//! Pure components (`types`, `defaults`, `dsl`, `emit`, `diff`, `model`)
//! never touch the network or filesystem; I/O-bound components
//! (`executor`, `reflect`, `orchestrator`, `seed`, `files`, `config`) depend
//! on the pure layer but not on each other's internals. `cli`, `display`,
//! and `logging` are the ambient stack the `sforge` binary wires together.

pub mod cli;
pub mod config;
pub mod defaults;
pub mod diff;
pub mod display;
pub mod dsl;
pub mod emit;
pub mod error;
pub mod executor;
pub mod files;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod reflect;
pub mod seed;
pub mod types;
