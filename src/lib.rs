#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod llm;

pub use config::Config;
pub use engine::{CallOptions, ExecutionEngine, ExecutionResult, build_engine};
pub use error::{ConfigError, EngineError, ForgeError, ProviderError};
