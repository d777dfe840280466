//! Embedded QuickJS runtime for the sandjs plugin.
//!
//! This crate owns the engine side of the plugin: instance lifecycle,
//! default context bindings, the evaluation pipeline, and the optional
//! Civet-dialect compiler. It knows nothing about the host ABI: the
//! plugin crate feeds it bytes and options and maps its errors onto the
//! host error buffer.
//!
//! # Architecture
//!
//! - [`Lifecycle`] holds the single live [`Engine`] instance and enforces
//!   the Uninitialized → Ready → Destroyed state machine
//! - [`pipeline`] operations borrow the instance explicitly per call
//! - the module shim and builtin `qjs:*` modules are applied once, at
//!   context creation, never per-eval
//! - with the `civet` feature, the bundled dialect compiler is compiled
//!   once per instance and its entry point retained for reuse

mod builtins;
mod config;
mod engine;
mod error;
pub mod pipeline;
mod shim;
#[cfg(feature = "civet")]
mod transpiler;
mod version;

pub use config::{Config, EvalFileOptions, EvalOptions};
pub use engine::{Engine, Lifecycle, LifecycleState};
pub use error::EngineError;
pub use pipeline::detect_module;
pub use version::{ENGINE_VERSION, version_for};
