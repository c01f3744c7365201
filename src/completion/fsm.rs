//! Argument parser state machine
//!
//! Walks the tokens of a command against its spec and determines what the
//! token under the cursor can be. The machine is designed to be:
//! - Error-tolerant: a token that fits nowhere is annotated `None` and the walk continues
//! - Deterministic: the result depends only on the spec and the tokens
//! - Read-only: the spec is borrowed, all bookkeeping lives in [`ParserState`]
//!
//! Each token is tried, in order, as a subcommand, an option, an option
//! argument and a subcommand argument. The first attempt that accepts the
//! token wins. The final token is resolved on a scratch copy of the state so
//! that an in-progress word never commits a transition.

use std::collections::HashSet;
use tracing::trace;

use super::context::{
    Annotation, ArgState, ParseResult, SuggestionFlags, is_mandatory_or_variadic,
};
use crate::error::ResolveError;
use crate::parser::Command;
use crate::spec::{Arg, CliOption, ParserDirectives, Subcommand};

/// Why a token cannot be consumed by an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
enum UpdateStateError {
    SubcommandsClosed,
    NotASubcommand,
    OptionsClosed,
    NotAnOption,
    RepeatLimit(String),
    NoOptionArg,
    NoSubcommandArg,
}

/// Malformed option syntax
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseArgumentsError {
    /// `--flag=value` where the option does not take exactly one argument
    SeparatorArgCount { option: String, args: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    State(UpdateStateError),
    Arguments(ParseArgumentsError),
}

impl From<UpdateStateError> for Rejection {
    fn from(err: UpdateStateError) -> Self {
        Rejection::State(err)
    }
}

impl From<ParseArgumentsError> for Rejection {
    fn from(err: ParseArgumentsError) -> Self {
        Rejection::Arguments(err)
    }
}

type Transition<'a> = (ParserState<'a>, Annotation);
type Attempt<'a> = fn(&ParserState<'a>, &str, bool) -> Result<Transition<'a>, Rejection>;

/// Working state of one resolution
#[derive(Debug, Clone)]
pub struct ParserState<'a> {
    /// Current node in the spec tree
    pub completion_obj: &'a Subcommand,
    /// Directives in effect, inherited when a subcommand declares none
    pub directives: ParserDirectives,
    /// Persistent options of the ancestors of `completion_obj`
    pub inherited_options: Vec<&'a CliOption>,
    pub passed_options: Vec<&'a CliOption>,
    pub option_arg_state: ArgState<'a>,
    pub subcommand_arg_state: ArgState<'a>,
    pub annotations: Vec<Annotation>,
    pub have_entered_subcommand_args: bool,
    pub is_end_of_options: bool,
}

impl<'a> ParserState<'a> {
    /// Initial state at the root of `spec`
    pub fn new(spec: &'a Subcommand) -> Self {
        Self {
            completion_obj: spec,
            directives: spec.parser_directives.clone().unwrap_or_default(),
            inherited_options: Vec::new(),
            passed_options: Vec::new(),
            option_arg_state: ArgState::empty(),
            subcommand_arg_state: ArgState::new(&spec.args),
            annotations: Vec::new(),
            have_entered_subcommand_args: false,
            is_end_of_options: false,
        }
    }

    fn current_option_arg(&self) -> Option<&'a Arg> {
        self.option_arg_state.current()
    }

    fn current_subcommand_arg(&self) -> Option<&'a Arg> {
        self.subcommand_arg_state.current()
    }

    /// The option argument wins when it must be filled, or when there is no
    /// subcommand argument to fill instead
    pub fn prefer_option_arg(&self) -> bool {
        is_mandatory_or_variadic(self.current_option_arg())
            || self.current_subcommand_arg().is_none()
    }

    pub fn can_consume_subcommands(&self) -> bool {
        !is_mandatory_or_variadic(self.current_option_arg()) && !self.have_entered_subcommand_args
    }

    pub fn can_consume_options(&self) -> bool {
        if self.is_end_of_options {
            return false;
        }
        if self.have_entered_subcommand_args && self.directives.options_must_precede_arguments {
            return false;
        }

        if let Some(arg) = self.current_option_arg() {
            if arg.is_variadic {
                let breakable = arg.options_can_break_variadic_arg != Some(false)
                    && self.option_arg_state.variadic_count > 0;
                if !breakable {
                    return false;
                }
            } else if arg.is_mandatory() {
                return false;
            }
        }

        if let Some(arg) = self.current_subcommand_arg() {
            if arg.is_variadic
                && arg.options_can_break_variadic_arg == Some(false)
                && self.subcommand_arg_state.variadic_count > 0
            {
                return false;
            }
        }

        true
    }

    /// Own options first, then inherited persistent ones
    fn options(&self) -> impl Iterator<Item = &'a CliOption> + '_ {
        self.completion_obj
            .options
            .iter()
            .chain(self.inherited_options.iter().copied())
    }

    fn find_option(&self, name: &str) -> Option<&'a CliOption> {
        self.options().find(|o| o.matches(name))
    }

    /// State after descending into `sub`
    fn descend(&self, sub: &'a Subcommand) -> Self {
        // Nearest declaration first; a name already taken shadows the rest
        let mut taken: HashSet<&'a str> = sub
            .options
            .iter()
            .flat_map(|o| o.name.iter().map(String::as_str))
            .collect();
        let mut inherited: Vec<&'a CliOption> = Vec::new();
        let candidates = self
            .completion_obj
            .options
            .iter()
            .filter(|o| o.is_persistent)
            .chain(self.inherited_options.iter().copied());
        for option in candidates {
            if option.name.iter().any(|name| taken.contains(name.as_str())) {
                continue;
            }
            taken.extend(option.name.iter().map(String::as_str));
            inherited.push(option);
        }

        Self {
            completion_obj: sub,
            directives: sub
                .parser_directives
                .clone()
                .unwrap_or_else(|| self.directives.clone()),
            inherited_options: inherited,
            passed_options: Vec::new(),
            option_arg_state: ArgState::empty(),
            subcommand_arg_state: ArgState::new(&sub.args),
            annotations: self.annotations.clone(),
            have_entered_subcommand_args: false,
            is_end_of_options: self.is_end_of_options,
        }
    }

    /// State after passing `option`, respecting its repeat cap
    fn pass_option(&self, option: &'a CliOption) -> Result<Self, UpdateStateError> {
        let count = self
            .passed_options
            .iter()
            .filter(|passed| passed.names_intersect(option))
            .count();
        if !option.is_repeatable.allows_another(count) {
            return Err(UpdateStateError::RepeatLimit(option.primary_name().to_string()));
        }

        let mut next = self.clone();
        next.passed_options.push(option);
        next.option_arg_state = ArgState::new(&option.args);
        Ok(next)
    }

    fn consume_option_arg(&self) -> Self {
        let mut next = self.clone();
        next.option_arg_state = self.option_arg_state.advanced();
        next
    }
}

fn try_subcommand<'a>(
    state: &ParserState<'a>,
    token: &str,
    _is_final: bool,
) -> Result<Transition<'a>, Rejection> {
    if !state.can_consume_subcommands() {
        return Err(UpdateStateError::SubcommandsClosed.into());
    }
    let sub = state
        .completion_obj
        .find_subcommand(token)
        .ok_or(UpdateStateError::NotASubcommand)?;

    Ok((
        state.descend(sub),
        Annotation::Subcommand {
            text: token.to_string(),
        },
    ))
}

fn try_option<'a>(
    state: &ParserState<'a>,
    token: &str,
    is_final: bool,
) -> Result<Transition<'a>, Rejection> {
    if !state.can_consume_options() {
        return Err(UpdateStateError::OptionsClosed.into());
    }

    // A bare `-` or `--` under the cursor stays open for option listing
    if token == "-" || (token == "--" && is_final) {
        return Err(UpdateStateError::NotAnOption.into());
    }
    if token == "--" {
        let mut next = state.clone();
        next.is_end_of_options = true;
        next.option_arg_state = ArgState::empty();
        return Ok((
            next,
            Annotation::Option {
                text: token.to_string(),
            },
        ));
    }

    if let Some(option) = state.find_option(token) {
        let mut next = state.pass_option(option)?;
        if option.requires_separator.is_enforced() {
            // The value can only follow the separator, never the next token
            next.option_arg_state = ArgState::empty();
        }
        return Ok((
            next,
            Annotation::Option {
                text: token.to_string(),
            },
        ));
    }

    if !token.starts_with('-') {
        return Err(UpdateStateError::NotAnOption.into());
    }

    if token.starts_with("--") || state.directives.flags_are_posix_noncompliant {
        try_inline_value(state, token, is_final)
    } else {
        try_short_chain(state, token, is_final)
    }
}

/// `--flag=value`, or the option's own separator
fn try_inline_value<'a>(
    state: &ParserState<'a>,
    token: &str,
    is_final: bool,
) -> Result<Transition<'a>, Rejection> {
    for option in state.options() {
        let separator = option.requires_separator.separator();
        let matched = option.name.iter().find_map(|name| {
            token
                .strip_prefix(name.as_str())
                .and_then(|rest| rest.strip_prefix(separator))
                .map(|value| (name, value))
        });
        let Some((name, value)) = matched else {
            continue;
        };

        if option.args.len() != 1 {
            return Err(ParseArgumentsError::SeparatorArgCount {
                option: name.clone(),
                args: option.args.len(),
            }
            .into());
        }

        let passed = state.pass_option(option)?;
        // Under the cursor the value is still being typed: leave the slot open
        let next = if is_final {
            passed
        } else {
            passed.consume_option_arg()
        };
        return Ok((
            next,
            Annotation::Composite {
                text: token.to_string(),
                subtokens: vec![
                    Annotation::Option {
                        text: format!("{name}{separator}"),
                    },
                    Annotation::OptionArg {
                        text: value.to_string(),
                    },
                ],
            },
        ));
    }

    Err(UpdateStateError::NotAnOption.into())
}

/// `-abc`: one option per character until one needs an argument
fn try_short_chain<'a>(
    state: &ParserState<'a>,
    token: &str,
    is_final: bool,
) -> Result<Transition<'a>, Rejection> {
    let mut next = state.clone();
    let mut subtokens = Vec::new();
    let mut rest = &token[1..];

    while let Some(c) = rest.chars().next() {
        let flag = format!("-{c}");
        let option = next
            .find_option(&flag)
            .ok_or(UpdateStateError::NotAnOption)?;
        next = next.pass_option(option)?;
        subtokens.push(Annotation::Option { text: flag });
        rest = &rest[c.len_utf8()..];

        if !rest.is_empty() && is_mandatory_or_variadic(next.current_option_arg()) {
            if !is_final {
                next = next.consume_option_arg();
            }
            subtokens.push(Annotation::OptionArg {
                text: rest.to_string(),
            });
            break;
        }
    }

    if subtokens.is_empty() {
        return Err(UpdateStateError::NotAnOption.into());
    }

    Ok((
        next,
        Annotation::Composite {
            text: token.to_string(),
            subtokens,
        },
    ))
}

fn try_option_arg<'a>(
    state: &ParserState<'a>,
    token: &str,
    _is_final: bool,
) -> Result<Transition<'a>, Rejection> {
    if state.current_option_arg().is_none() || !state.prefer_option_arg() {
        return Err(UpdateStateError::NoOptionArg.into());
    }
    Ok((
        state.consume_option_arg(),
        Annotation::OptionArg {
            text: token.to_string(),
        },
    ))
}

fn try_subcommand_arg<'a>(
    state: &ParserState<'a>,
    token: &str,
    _is_final: bool,
) -> Result<Transition<'a>, Rejection> {
    if state.current_subcommand_arg().is_none() {
        return Err(UpdateStateError::NoSubcommandArg.into());
    }
    let mut next = state.clone();
    next.subcommand_arg_state = state.subcommand_arg_state.advanced();
    next.have_entered_subcommand_args = true;
    next.option_arg_state = ArgState::empty();
    Ok((
        next,
        Annotation::SubcommandArg {
            text: token.to_string(),
        },
    ))
}

/// Try each interpretation of `token` in order
fn run_attempts<'a>(
    state: &ParserState<'a>,
    token: &str,
    is_final: bool,
) -> Option<Transition<'a>> {
    let attempts: [(&str, Attempt<'a>); 4] = [
        ("subcommand", try_subcommand),
        ("option", try_option),
        ("option arg", try_option_arg),
        ("subcommand arg", try_subcommand_arg),
    ];

    for (name, attempt) in attempts {
        match attempt(state, token, is_final) {
            Ok(transition) => {
                trace!("{:?} consumed as {}", token, name);
                return Some(transition);
            }
            Err(rejection) => trace!("{:?} not a {}: {:?}", token, name, rejection),
        }
    }
    None
}

/// Resolve token texts against a spec.
///
/// The first token names the spec root and is annotated as its subcommand.
///
/// # Arguments
/// * `tokens` - Token texts, the command name first and the token under the cursor last
/// * `spec` - Root of the spec tree
///
/// # Returns
/// * `Result<ParseResult, ResolveError>` - `EmptyCommand` when there are no tokens
pub fn parse_tokens<'a, S: AsRef<str>>(
    tokens: &[S],
    spec: &'a Subcommand,
) -> Result<ParseResult<'a>, ResolveError> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(ResolveError::EmptyCommand);
    };

    let mut state = ParserState::new(spec);
    state.annotations.push(Annotation::Subcommand {
        text: first.as_ref().to_string(),
    });

    for (index, token) in rest.iter().enumerate() {
        let token = token.as_ref();
        let is_final = index + 1 == rest.len();

        match run_attempts(&state, token, is_final) {
            Some((next, annotation)) if !is_final => {
                state = next;
                state.annotations.push(annotation);
            }
            Some((scratch, annotation)) => {
                let mid_value = annotation
                    .last_subtoken()
                    .is_some_and(Annotation::is_option_arg);
                if mid_value {
                    state = scratch;
                }
                state.annotations.push(annotation);
            }
            None => state.annotations.push(Annotation::None {
                text: token.to_string(),
            }),
        }
    }

    Ok(get_result_from_state(state))
}

/// Resolve a command's tokens against a spec
pub fn parse_arguments<'a>(
    command: &Command,
    spec: &'a Subcommand,
) -> Result<ParseResult<'a>, ResolveError> {
    parse_tokens(&command.token_texts(), spec)
}

/// Derive the search term, current argument and suggestion channels
fn get_result_from_state(state: ParserState<'_>) -> ParseResult<'_> {
    let (search_term, args_only) = match state.annotations.last() {
        Some(last @ Annotation::Composite { .. }) => match last.last_subtoken() {
            Some(sub @ Annotation::OptionArg { .. }) => (sub.text().to_string(), true),
            _ => (last.text().to_string(), false),
        },
        Some(Annotation::OptionArg { text }) => (text.clone(), !text.starts_with('-')),
        Some(last) => (last.text().to_string(), false),
        None => (String::new(), false),
    };

    let current_arg = if state.prefer_option_arg() {
        state.current_option_arg()
    } else {
        state.current_subcommand_arg()
    };

    let mut suggestion_flags = SuggestionFlags::ARGS;
    if !args_only {
        if state.can_consume_subcommands() {
            suggestion_flags |= SuggestionFlags::SUBCOMMANDS;
        }
        if state.can_consume_options() {
            suggestion_flags |= SuggestionFlags::OPTIONS;
        }
    }

    ParseResult {
        completion_obj: state.completion_obj,
        inherited_options: state.inherited_options,
        passed_options: state.passed_options,
        current_arg,
        search_term,
        suggestion_flags,
        annotations: state.annotations,
    }
}
