pub mod cli;
pub mod config;
pub mod error;
pub mod staging;
pub mod transpile;
pub mod types;
pub mod worker;

// Re-export main types
pub use types::*;

pub use config::Config;
pub use transpile::{transpile_dir, transpile_files, TranspileContext, TranspileReport};
pub use worker::{validate_dir, ValidationContext, WorkerPool};
