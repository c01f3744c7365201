//! Error handling module for argsense.
//!
//! Parsing a shell buffer never fails: unterminated constructs are recorded
//! structurally. The errors defined here cover the places where a caller can
//! ask for something impossible:
//! - Command extraction and alias substitution
//! - Argument resolution on an empty command
//! - Spec loading, generator execution and configuration
//!
//! # Example
//!
//! ```rust
//! use argsense::error::{ArgsenseError, ResolveError, Result};
//!
//! fn resolve(tokens: &[&str]) -> Result<usize> {
//!     if tokens.is_empty() {
//!         return Err(ResolveError::EmptyCommand.into());
//!     }
//!     Ok(tokens.len())
//! }
//!
//! assert!(matches!(resolve(&[]), Err(ArgsenseError::Resolve(_))));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ArgsenseError, CommandError, ConfigError, GeneratorError, ResolveError, Result, SpecError,
};
