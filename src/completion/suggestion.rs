//! Suggestion assembly
//!
//! Turns a [`ParseResult`] into the candidate list shown to the user.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use super::context::{ParseResult, SuggestionFlags};
use crate::spec::{CliOption, StaticSuggestion};

/// Priority of an ordinary suggestion
pub const DEFAULT_PRIORITY: i32 = 50;
/// Priority of a required option
pub const REQUIRED_PRIORITY: i32 = 75;

/// Where a suggestion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Subcommand,
    Option,
    Arg,
    File,
    Folder,
    Special,
    Command,
}

/// A completion candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub priority: i32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_dangerous: bool,
}

impl Suggestion {
    pub fn new(name: impl Into<String>, kind: SuggestionType) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            priority: DEFAULT_PRIORITY,
            is_dangerous: false,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// First of `names` starting with `prefix`
fn first_match<'n>(names: &'n [String], prefix: &str) -> Option<&'n str> {
    names
        .iter()
        .find(|name| name.starts_with(prefix))
        .map(String::as_str)
}

/// Whether `option` conflicts with anything already passed
fn is_excluded(result: &ParseResult<'_>, option: &CliOption) -> bool {
    if option
        .is_repeatable
        .cap()
        .is_some_and(|cap| result.times_passed(option) >= cap)
    {
        return true;
    }

    result.passed_options.iter().any(|passed| {
        option.exclusive_on.iter().any(|name| passed.matches(name))
            || passed.exclusive_on.iter().any(|name| option.matches(name))
    })
}

fn static_suggestion(suggestion: &StaticSuggestion, prefix: &str) -> Option<Suggestion> {
    first_match(&suggestion.name, prefix).map(|name| {
        Suggestion::new(name, SuggestionType::Arg)
            .with_description(suggestion.description.clone())
    })
}

/// Build the candidate list for a resolution.
///
/// Spec-derived candidates are filtered by the search term. `generated`
/// candidates are taken as-is, since generators narrow their own query term.
///
/// # Arguments
/// * `result` - Outcome of the state machine
/// * `generated` - Output of the current argument's generators
///
/// # Returns
/// * `Vec<Suggestion>` - Deduplicated, ranked candidates
pub fn assemble(result: &ParseResult<'_>, generated: Vec<Suggestion>) -> Vec<Suggestion> {
    let prefix = result.search_term.as_str();
    let mut suggestions = Vec::new();

    if result.suggestion_flags.contains(SuggestionFlags::SUBCOMMANDS) {
        suggestions.extend(result.completion_obj.subcommands.iter().filter_map(|sub| {
            first_match(&sub.name, prefix).map(|name| {
                Suggestion::new(name, SuggestionType::Subcommand)
                    .with_description(sub.description.clone())
            })
        }));
    }

    if result.suggestion_flags.contains(SuggestionFlags::OPTIONS) {
        for option in result.available_options() {
            if is_excluded(result, option) {
                continue;
            }
            if let Some(name) = first_match(&option.name, prefix) {
                let mut suggestion = Suggestion::new(name, SuggestionType::Option)
                    .with_description(option.description.clone());
                if option.is_required {
                    suggestion.priority = REQUIRED_PRIORITY;
                }
                suggestions.push(suggestion);
            }
        }
    }

    if result.suggestion_flags.contains(SuggestionFlags::ARGS) {
        if let Some(arg) = result.current_arg {
            suggestions.extend(arg.suggestions.iter().filter_map(|s| {
                static_suggestion(s, prefix).map(|mut s| {
                    s.is_dangerous = arg.is_dangerous;
                    s
                })
            }));
        }
        suggestions.extend(generated);
    }

    rank(suggestions, prefix)
}

/// Deduplicate by name, keeping the first, and order for display:
/// exact match, then priority, then shorter, then alphabetical
pub fn rank(suggestions: Vec<Suggestion>, prefix: &str) -> Vec<Suggestion> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Suggestion> = suggestions
        .into_iter()
        .filter(|s| seen.insert(s.name.clone()))
        .collect();

    ranked.sort_by(|a, b| {
        if !prefix.is_empty() {
            match (a.name == prefix, b.name == prefix) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
        }
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.name.len().cmp(&b.name.len()))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked
}
