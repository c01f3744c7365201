//! Completion specs
//!
//! Data model for the command descriptions that drive argument resolution,
//! plus the registry that loads them.
//!
//! - `model`: Subcommands, options, arguments and parser directives
//! - `generator`: Dynamic suggestion sources attached to arguments
//! - `registry`: Loading specs from JSON and resolving `loadSpec` references

pub mod generator;
pub mod model;
pub mod registry;

pub use generator::{
    CacheSpec, CacheStrategy, CustomGenerator, CustomGeneratorRef, Generator, GeneratorKind,
    PostProcessFn, Script, Template, Trigger,
};
pub use model::{
    Arg, CliOption, Debounce, LoadSpec, ParserDirectives, Repeatable, RequiresSeparator,
    SpecGeneratorFn, StaticSuggestion, Subcommand,
};
pub use registry::{SpecRegistry, resolve_dynamic};
