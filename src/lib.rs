//! Argsense Library
//!
//! This library provides the core of a shell completion engine: it parses a
//! half-typed command line, extracts the command under the cursor, expands
//! aliases, resolves the tokens against a Fig-style completion spec and runs
//! the spec's generators to produce ranked suggestions.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `completion`: Argument state machine, generators, cache and engine
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `parser`: Bash-like parser, command extraction and alias expansion
//! - `spec`: Completion spec model and registry
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use argsense::{CompletionEngine, SpecRegistry, config::Config};
//! use argsense::completion::{ProcessExecutor, ShellContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut registry = SpecRegistry::new();
//!     registry.load_dir(std::path::Path::new("specs"))?;
//!
//!     let engine = CompletionEngine::new(
//!         Arc::new(registry),
//!         Arc::new(ProcessExecutor),
//!         config.engine,
//!     );
//!     let response = engine
//!         .resolve("git checkout ma", 15, &ShellContext::from_process())
//!         .await;
//!
//!     for suggestion in response.suggestions {
//!         println!("{}", suggestion.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod parser;
pub mod spec;
pub mod utils;

// Re-export commonly used types
pub use completion::{CompletionEngine, CompletionOutcome, CompletionResponse, Suggestion};
pub use config::Config;
pub use error::{ArgsenseError, Result};
pub use parser::{Command, get_command, parse};
pub use spec::SpecRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
