//! Generator definitions
//!
//! A generator produces argument suggestions at completion time. Exactly one
//! source is honoured per generator, in precedence order: a custom callback,
//! a script, then a filesystem template.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::model::one_or_many;
use crate::completion::executor::{CommandExecutor, ShellContext};
use crate::completion::suggestion::Suggestion;
use crate::error::GeneratorError;

/// Filesystem templates resolved by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Filepaths,
    Folders,
    History,
    Help,
}

/// Command run by a script generator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Script {
    /// Run through `sh -c`
    Shell(String),
    /// Program and arguments, run directly
    Argv(Vec<String>),
}

impl Script {
    /// Program and arguments to spawn
    pub fn invocation(&self) -> (String, Vec<String>) {
        match self {
            Script::Shell(line) => ("sh".to_string(), vec!["-c".to_string(), line.clone()]),
            Script::Argv(argv) => match argv.split_first() {
                Some((program, args)) => (program.clone(), args.to_vec()),
                None => (String::new(), Vec::new()),
            },
        }
    }

    /// Stable textual form, used for logging and cache keys
    pub fn display(&self) -> String {
        match self {
            Script::Shell(line) => line.clone(),
            Script::Argv(argv) => argv.join(" "),
        }
    }
}

/// When an argument's generators re-run as the search term changes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "TriggerRepr")]
pub enum Trigger {
    /// Re-run when the last position of this substring moves
    Substring(String),
    /// Re-run on any change
    Change,
    /// Re-run when the length crosses this threshold
    Threshold(usize),
    /// Re-run when membership in this set changes
    Match(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerRepr {
    Substring(String),
    Tagged(TaggedTrigger),
}

#[derive(Deserialize)]
#[serde(tag = "on", rename_all = "lowercase")]
enum TaggedTrigger {
    Change,
    Threshold {
        length: usize,
    },
    Match {
        #[serde(deserialize_with = "one_or_many")]
        string: Vec<String>,
    },
}

impl From<TriggerRepr> for Trigger {
    fn from(repr: TriggerRepr) -> Self {
        match repr {
            TriggerRepr::Substring(s) => Trigger::Substring(s),
            TriggerRepr::Tagged(TaggedTrigger::Change) => Trigger::Change,
            TriggerRepr::Tagged(TaggedTrigger::Threshold { length }) => Trigger::Threshold(length),
            TriggerRepr::Tagged(TaggedTrigger::Match { string }) => Trigger::Match(string),
        }
    }
}

impl Trigger {
    /// Whether moving from `old` to `new` crosses this trigger's boundary
    pub fn fires(&self, old: &str, new: &str) -> bool {
        match self {
            Trigger::Substring(s) => old.rfind(s.as_str()) != new.rfind(s.as_str()),
            Trigger::Change => old != new,
            Trigger::Threshold(length) => (old.len() > *length) != (new.len() > *length),
            Trigger::Match(set) => {
                set.iter().any(|s| s == old) != set.iter().any(|s| s == new)
            }
        }
    }
}

/// Cache strategy of a generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    #[default]
    MaxAge,
    StaleWhileRevalidate,
}

/// Cache declaration of a generator
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSpec {
    /// Milliseconds a value stays fresh; `None` never expires
    pub ttl: Option<u64>,
    pub strategy: CacheStrategy,
    pub cache_by_directory: bool,
    pub cache_key: Option<String>,
}

impl CacheSpec {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_millis)
    }
}

/// Generator implemented in code
#[async_trait]
pub trait CustomGenerator: Send + Sync {
    /// Produce suggestions for the current tokens
    ///
    /// # Arguments
    /// * `tokens` - Token texts of the command, final token included
    /// * `executor` - Process execution capability
    /// * `context` - Working directory and environment
    async fn generate(
        &self,
        tokens: &[String],
        executor: Arc<dyn CommandExecutor>,
        context: &ShellContext,
    ) -> Result<Vec<Suggestion>, GeneratorError>;
}

/// Shared handle to a [`CustomGenerator`]
#[derive(Clone)]
pub struct CustomGeneratorRef(pub Arc<dyn CustomGenerator>);

impl fmt::Debug for CustomGeneratorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomGenerator(..)")
    }
}

/// Turns raw script output into suggestions
#[derive(Clone)]
pub struct PostProcessFn(pub Arc<dyn Fn(&str, &[String]) -> Vec<Suggestion> + Send + Sync>);

impl fmt::Debug for PostProcessFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PostProcessFn(..)")
    }
}

/// A suggestion source attached to an argument
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Generator {
    #[serde(skip)]
    pub custom: Option<CustomGeneratorRef>,
    pub script: Option<Script>,
    #[serde(deserialize_with = "one_or_many")]
    pub template: Vec<Template>,
    /// Separator for script output lines
    pub split_on: Option<String>,
    #[serde(skip)]
    pub post_process: Option<PostProcessFn>,
    pub trigger: Option<Trigger>,
    /// Search term is the part after the last occurrence of this string
    pub get_query_term: Option<String>,
    pub cache: Option<CacheSpec>,
    /// Milliseconds before the script is abandoned
    pub script_timeout: Option<u64>,
}

/// The source a generator actually uses
#[derive(Debug, Clone, Copy)]
pub enum GeneratorKind<'a> {
    Custom(&'a CustomGeneratorRef),
    Script(&'a Script),
    Template(&'a [Template]),
    Empty,
}

impl Generator {
    /// Generator running a shell command line
    pub fn script(line: impl Into<String>) -> Self {
        Self {
            script: Some(Script::Shell(line.into())),
            ..Self::default()
        }
    }

    /// Generator backed by a callback
    pub fn custom(generator: Arc<dyn CustomGenerator>) -> Self {
        Self {
            custom: Some(CustomGeneratorRef(generator)),
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, cache: CacheSpec) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn kind(&self) -> GeneratorKind<'_> {
        if let Some(custom) = &self.custom {
            GeneratorKind::Custom(custom)
        } else if let Some(script) = &self.script {
            GeneratorKind::Script(script)
        } else if !self.template.is_empty() {
            GeneratorKind::Template(&self.template)
        } else {
            GeneratorKind::Empty
        }
    }

    /// Narrow the search term per `getQueryTerm`
    pub fn query_term<'a>(&self, search_term: &'a str) -> &'a str {
        match &self.get_query_term {
            Some(marker) if !marker.is_empty() => search_term
                .rfind(marker.as_str())
                .map_or(search_term, |i| &search_term[i + marker.len()..]),
            _ => search_term,
        }
    }
}
