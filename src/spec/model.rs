//! Completion spec tree
//!
//! Specs describe a command's subcommands, options and arguments. They are
//! deserialised from Fig-compatible JSON and are read-only once loaded: the
//! argument state machine only ever borrows them.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::generator::{Generator, Template};

/// A value written either as a single item or as a list
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Deserialize `T | T[]` into a `Vec<T>`
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::<T>::deserialize(deserializer).map(Vec::from)
}

/// Parsing behaviour switches inherited by subcommands
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserDirectives {
    /// `-long` is a single option rather than a chain of short options
    pub flags_are_posix_noncompliant: bool,
    /// No option may follow the first positional argument
    pub options_must_precede_arguments: bool,
}

/// A command or subcommand
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcommand {
    #[serde(deserialize_with = "one_or_many")]
    pub name: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subcommands: Vec<Subcommand>,
    #[serde(default)]
    pub options: Vec<CliOption>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub args: Vec<Arg>,
    #[serde(default)]
    pub parser_directives: Option<ParserDirectives>,
    #[serde(default, deserialize_with = "deserialize_load_spec")]
    pub load_spec: Option<LoadSpec>,
    #[serde(default)]
    pub requires_subcommand: bool,
}

impl Subcommand {
    /// Create an empty subcommand with a single name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: vec![name.into()],
            ..Self::default()
        }
    }

    /// First declared name
    pub fn primary_name(&self) -> &str {
        self.name.first().map(String::as_str).unwrap_or_default()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.iter().any(|n| n == name)
    }

    /// Find a direct child subcommand by any of its names
    pub fn find_subcommand(&self, name: &str) -> Option<&Subcommand> {
        self.subcommands.iter().find(|s| s.matches(name))
    }

    /// Position of a direct child subcommand
    pub fn subcommand_index(&self, name: &str) -> Option<usize> {
        self.subcommands.iter().position(|s| s.matches(name))
    }

    /// Fold the contents of a loaded spec into this node.
    ///
    /// Own definitions win; the loaded spec fills in what is missing.
    pub fn absorb(&mut self, loaded: Subcommand) {
        if self.description.is_none() {
            self.description = loaded.description;
        }
        for sub in loaded.subcommands {
            if !sub.name.iter().any(|n| self.find_subcommand(n).is_some()) {
                self.subcommands.push(sub);
            }
        }
        for option in loaded.options {
            if !self.options.iter().any(|o| o.names_intersect(&option)) {
                self.options.push(option);
            }
        }
        if self.args.is_empty() {
            self.args = loaded.args;
        }
        if self.parser_directives.is_none() {
            self.parser_directives = loaded.parser_directives;
        }
        self.requires_subcommand |= loaded.requires_subcommand;
        self.load_spec = None;
    }
}

/// How often an option may be passed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Repeatable {
    #[default]
    Once,
    Unlimited,
    Times(u32),
}

impl Repeatable {
    /// Maximum number of occurrences, `None` when unlimited
    pub fn cap(&self) -> Option<usize> {
        match self {
            Repeatable::Once => Some(1),
            Repeatable::Unlimited => None,
            Repeatable::Times(n) => Some(*n as usize),
        }
    }

    /// Whether `count` previous occurrences leave room for another
    pub fn allows_another(&self, count: usize) -> bool {
        self.cap().is_none_or(|cap| count < cap)
    }
}

impl<'de> Deserialize<'de> for Repeatable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Count(u32),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Repeatable::Unlimited,
            Repr::Flag(false) => Repeatable::Once,
            Repr::Count(n) => Repeatable::Times(n),
        })
    }
}

/// Separator between an option and its inline value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequiresSeparator {
    #[default]
    No,
    /// `=`
    Default,
    Custom(String),
}

impl RequiresSeparator {
    /// Whether the value may only be given inline, after the separator
    pub fn is_enforced(&self) -> bool {
        !matches!(self, RequiresSeparator::No)
    }

    /// Separator used to split `--flag<sep>value`
    pub fn separator(&self) -> &str {
        match self {
            RequiresSeparator::Custom(sep) => sep,
            RequiresSeparator::No | RequiresSeparator::Default => "=",
        }
    }
}

impl<'de> Deserialize<'de> for RequiresSeparator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Separator(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => RequiresSeparator::Default,
            Repr::Flag(false) => RequiresSeparator::No,
            Repr::Separator(sep) => RequiresSeparator::Custom(sep),
        })
    }
}

/// An option (flag) of a subcommand
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliOption {
    #[serde(deserialize_with = "one_or_many")]
    pub name: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub args: Vec<Arg>,
    #[serde(default)]
    pub is_repeatable: Repeatable,
    /// Propagates into every descendant subcommand
    #[serde(default)]
    pub is_persistent: bool,
    #[serde(default)]
    pub requires_separator: RequiresSeparator,
    #[serde(default)]
    pub is_required: bool,
    /// Names of options this one cannot be combined with
    #[serde(default)]
    pub exclusive_on: Vec<String>,
}

impl CliOption {
    /// Create an argument-less option
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.iter().any(|n| n == name)
    }

    /// Two options are the same option when their name lists intersect
    pub fn names_intersect(&self, other: &CliOption) -> bool {
        self.name.iter().any(|n| other.matches(n))
    }

    pub fn primary_name(&self) -> &str {
        self.name.first().map(String::as_str).unwrap_or_default()
    }
}

/// Debounce setting of an argument
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Debounce {
    #[default]
    Off,
    /// Use the configured default interval
    On,
    Millis(u64),
}

impl Debounce {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Debounce::Off)
    }

    /// Interval to wait before running generators, if any
    pub fn interval(&self, default: Duration) -> Option<Duration> {
        match self {
            Debounce::Off => None,
            Debounce::On => Some(default),
            Debounce::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }
}

impl<'de> Deserialize<'de> for Debounce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Millis(u64),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Debounce::On,
            Repr::Flag(false) => Debounce::Off,
            Repr::Millis(ms) => Debounce::Millis(ms),
        })
    }
}

/// A suggestion listed verbatim in a spec
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSuggestion {
    pub name: Vec<String>,
    pub description: Option<String>,
}

impl<'de> Deserialize<'de> for StaticSuggestion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Object {
            #[serde(deserialize_with = "one_or_many")]
            name: Vec<String>,
            #[serde(default)]
            description: Option<String>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Plain(String),
            Object(Object),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Plain(name) => StaticSuggestion {
                name: vec![name],
                description: None,
            },
            Repr::Object(obj) => StaticSuggestion {
                name: obj.name,
                description: obj.description,
            },
        })
    }
}

/// A positional argument of a subcommand or option
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Arg {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_optional: bool,
    pub is_variadic: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub generators: Vec<Generator>,
    #[serde(deserialize_with = "one_or_many")]
    pub suggestions: Vec<StaticSuggestion>,
    #[serde(deserialize_with = "one_or_many")]
    pub template: Vec<Template>,
    pub is_dangerous: bool,
    /// `None` behaves like `true`
    pub options_can_break_variadic_arg: Option<bool>,
    pub debounce: Debounce,
}

impl Arg {
    /// Create a mandatory argument
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }

    pub fn is_mandatory(&self) -> bool {
        !self.is_optional
    }
}

/// Callback producing a spec at completion time
#[derive(Clone)]
pub struct SpecGeneratorFn(pub Arc<dyn Fn(&[String]) -> Option<Subcommand> + Send + Sync>);

impl fmt::Debug for SpecGeneratorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SpecGeneratorFn(..)")
    }
}

/// Where the rest of a subcommand's definition comes from
#[derive(Debug, Clone)]
pub enum LoadSpec {
    /// Another registered spec, merged at load time
    Named(String),
    /// Computed from the tokens of the current request
    Dynamic(SpecGeneratorFn),
}

fn deserialize_load_spec<'de, D>(deserializer: D) -> Result<Option<LoadSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(LoadSpec::Named))
}
