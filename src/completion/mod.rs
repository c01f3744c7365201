//! Completion system for shell command lines
//!
//! This module turns a command extracted from the buffer into ranked
//! suggestions. The argument resolver is a finite state machine that is
//! error-tolerant and works with incomplete input; only generators do
//! asynchronous work.
//!
//! # Architecture
//!
//! The completion system consists of several components:
//!
//! - **FSM**: Resolves each token as a subcommand, option, option argument or subcommand argument
//! - **Context**: Annotations, argument slots and the resolution result
//! - **Generator**: Runs script and custom generators for the current argument
//! - **Cache**: Per-key generator results with max-age and stale-while-revalidate strategies
//! - **Globals**: Commands and aliases discovered from the shell
//! - **Engine**: Orchestrates the entire completion flow under a deadline
//!
//! # Examples
//!
//! ```no_run
//! use argsense::completion::{CompletionEngine, ProcessExecutor, ShellContext};
//! use argsense::config::EngineConfig;
//! use argsense::spec::SpecRegistry;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> argsense::error::Result<()> {
//! let mut registry = SpecRegistry::new();
//! registry.load_json(r#"{ "name": "ls", "options": [{ "name": "-a" }, { "name": "-l" }] }"#)?;
//!
//! let engine = CompletionEngine::new(
//!     Arc::new(registry),
//!     Arc::new(ProcessExecutor),
//!     EngineConfig::default(),
//! );
//! let outcome = engine
//!     .complete("ls -", 4, &ShellContext::from_process(), &CancellationToken::new())
//!     .await;
//! // Suggests -a and -l
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod engine;
pub mod executor;
pub mod fsm;
pub mod generator;
pub mod globals;
pub mod suggestion;

pub use cache::{CacheKey, GeneratorCache};
pub use context::{Annotation, ArgState, ParseResult, SuggestionFlags};
pub use engine::{CompletionEngine, CompletionOutcome, CompletionResponse};
pub use executor::{CommandExecutor, ExecuteOutput, ProcessExecutor, ShellContext};
pub use fsm::{parse_arguments, parse_tokens};
pub use generator::{GeneratorContext, GeneratorOutput, GeneratorSession, run_generators};
pub use globals::{
    GlobalsProvider, ShellFamily, ShellGlobals, ShellGlobalsCache, ShellIntrospection,
};
pub use suggestion::{Suggestion, SuggestionType, assemble};

#[cfg(test)]
mod tests;
