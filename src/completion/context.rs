//! Argument resolution results
//!
//! Types shared by the argument state machine and the layers that turn its
//! result into suggestions: annotations of consumed tokens, argument slot
//! cursors and the suggestion-channel bitmask.

use bitflags::bitflags;
use serde::Serialize;

use crate::spec::{Arg, CliOption, Subcommand};

bitflags! {
    /// Which kinds of suggestions are legal at the cursor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SuggestionFlags: u8 {
        const ARGS = 1 << 0;
        const SUBCOMMANDS = 1 << 1;
        const OPTIONS = 1 << 2;
    }
}

impl Serialize for SuggestionFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        names.serialize(serializer)
    }
}

/// What a token was resolved as
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    Subcommand { text: String },
    Option { text: String },
    OptionArg { text: String },
    SubcommandArg { text: String },
    /// Chained short options or `--flag=value`
    Composite { text: String, subtokens: Vec<Annotation> },
    None { text: String },
}

impl Annotation {
    /// Text of the token (or subtoken) this annotation covers
    pub fn text(&self) -> &str {
        match self {
            Annotation::Subcommand { text }
            | Annotation::Option { text }
            | Annotation::OptionArg { text }
            | Annotation::SubcommandArg { text }
            | Annotation::Composite { text, .. }
            | Annotation::None { text } => text,
        }
    }

    pub fn is_option_arg(&self) -> bool {
        matches!(self, Annotation::OptionArg { .. })
    }

    /// Last subtoken of a composite annotation
    pub fn last_subtoken(&self) -> Option<&Annotation> {
        match self {
            Annotation::Composite { subtokens, .. } => subtokens.last(),
            _ => None,
        }
    }
}

/// Cursor into an ordered list of argument slots
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgState<'a> {
    pub args: Option<&'a [Arg]>,
    pub index: usize,
    pub variadic_count: usize,
}

impl<'a> ArgState<'a> {
    /// State positioned on the first of `args`, or empty when there are none
    pub fn new(args: &'a [Arg]) -> Self {
        Self {
            args: (!args.is_empty()).then_some(args),
            index: 0,
            variadic_count: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The slot the next value would fill
    pub fn current(&self) -> Option<&'a Arg> {
        self.args.and_then(|args| args.get(self.index))
    }

    /// Consume one value: a variadic slot stays put and counts it, anything
    /// else moves to the next slot (or to no slot at the end)
    pub fn advanced(&self) -> Self {
        let Some(args) = self.args else {
            return *self;
        };
        match args.get(self.index) {
            Some(arg) if arg.is_variadic => Self {
                variadic_count: self.variadic_count + 1,
                ..*self
            },
            _ if self.index + 1 < args.len() => Self {
                args: Some(args),
                index: self.index + 1,
                variadic_count: 0,
            },
            _ => Self::empty(),
        }
    }
}

/// Whether the argument must be, or may keep being, filled
pub fn is_mandatory_or_variadic(arg: Option<&Arg>) -> bool {
    arg.is_some_and(|a| a.is_mandatory() || a.is_variadic)
}

/// Outcome of resolving a command's tokens against its spec
#[derive(Debug, Clone)]
pub struct ParseResult<'a> {
    /// Deepest subcommand reached
    pub completion_obj: &'a Subcommand,
    /// Persistent options inherited from ancestors of `completion_obj`
    pub inherited_options: Vec<&'a CliOption>,
    pub passed_options: Vec<&'a CliOption>,
    /// Slot the final token fills, if any
    pub current_arg: Option<&'a Arg>,
    pub search_term: String,
    pub suggestion_flags: SuggestionFlags,
    /// One per token, in buffer order
    pub annotations: Vec<Annotation>,
}

impl<'a> ParseResult<'a> {
    /// Options that may appear at the cursor, own first then inherited
    pub fn available_options(&self) -> impl Iterator<Item = &'a CliOption> + '_ {
        self.completion_obj
            .options
            .iter()
            .chain(self.inherited_options.iter().copied())
    }

    /// How many times an option equal to `option` was already passed
    pub fn times_passed(&self, option: &CliOption) -> usize {
        self.passed_options
            .iter()
            .filter(|passed| passed.names_intersect(option))
            .count()
    }
}
