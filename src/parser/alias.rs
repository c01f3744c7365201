//! Alias expansion
//!
//! Replaces the first token of a command by its alias definition, re-parses
//! the result and maps every new token back onto a token of the command as
//! typed. Tokens produced by the alias body all map to the aliased token.

use std::collections::HashSet;
use tracing::debug;

use super::command::{AliasMap, Command, Token};
use super::node::NodeKind;
use super::shell_parser::ShellParser;
use crate::error::CommandError;

/// Substitute `alias` for `token` in `command`.
///
/// # Arguments
/// * `command` - Command to rewrite
/// * `token` - Token being replaced; must belong to `command`
/// * `alias` - Replacement text
///
/// # Returns
/// * `Result<Command, CommandError>` - Rewritten command whose tokens carry
///   the original nodes of `command`
pub fn substitute_alias(
    command: &Command,
    token: &Token,
    alias: &str,
) -> Result<Command, CommandError> {
    if !command.tokens.iter().any(|t| t == token) {
        return Err(CommandError::TokenNotFound(token.text.clone()));
    }

    let tree = &command.tree;
    let pre = &tree.text[..token.node.start - tree.start];
    let post = &tree.text[token.node.end - tree.start..];
    let rewritten = format!("{pre}{alias}{post}");

    let program = ShellParser::parse(&rewritten).shifted(tree.start);
    let node = match program.children.as_slice() {
        [node] if node.kind == NodeKind::Command => node,
        _ => return Err(CommandError::InvalidAlias(alias.to_string())),
    };

    let token_len = token.node.end - token.node.start;
    let cursor = if command.cursor >= token.node.end {
        command.cursor - token_len + alias.len()
    } else {
        token.node.start + alias.len()
    };
    let expanded = Command::from_node(node, cursor)?;

    let alias_start = token.node.start;
    let alias_end = alias_start + alias.len();
    let mut diff = 0usize;
    let mut previous_in_alias = false;
    let mut tokens = Vec::with_capacity(expanded.tokens.len());

    for (index, new_token) in expanded.tokens.into_iter().enumerate() {
        let in_alias = alias_start < new_token.node.end && alias_end >= new_token.node.start;
        if in_alias && previous_in_alias {
            diff += 1;
        }
        previous_in_alias = in_alias;

        let original = index
            .checked_sub(diff)
            .and_then(|i| command.tokens.get(i))
            .ok_or(CommandError::TokenMismatch {
                expected: command.tokens.len() + diff,
                found: index + 1,
            })?;
        tokens.push(Token {
            original_node: original.original_node.clone(),
            ..new_token
        });
    }

    if tokens.len() != command.tokens.len() + diff {
        return Err(CommandError::TokenMismatch {
            expected: command.tokens.len() + diff,
            found: tokens.len(),
        });
    }

    Ok(Command {
        tree: expanded.tree,
        original_tree: command.original_tree.clone(),
        tokens,
        cursor: expanded.cursor,
    })
}

/// Strip one layer of single quotes around an alias definition
fn unquote_alias(value: &str) -> &str {
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
}

/// Expand aliases on the first token until none applies.
///
/// Each alias name is substituted at most once and at most `max_rounds`
/// substitutions happen in total. A command with a single token is still
/// being named and is never expanded.
///
/// # Returns
/// * `Result<Command, CommandError>` - The first substitution error of the
///   chain, even when earlier aliases already expanded
pub fn try_expand_command(
    command: &Command,
    aliases: &AliasMap,
    max_rounds: usize,
) -> Result<Command, CommandError> {
    let mut expanded = command.clone();
    let mut used = HashSet::new();

    for _ in 0..max_rounds {
        if expanded.tokens.len() <= 1 {
            break;
        }
        let first = expanded.tokens[0].clone();
        let Some(value) = aliases.get(&first.text) else {
            break;
        };
        if !used.insert(first.text.clone()) {
            break;
        }
        expanded = substitute_alias(&expanded, &first, unquote_alias(value))?;
    }

    Ok(expanded)
}

/// [`try_expand_command`], falling back to the command as typed when any
/// substitution of the chain fails
pub fn expand_command(command: Command, aliases: &AliasMap, max_rounds: usize) -> Command {
    match try_expand_command(&command, aliases, max_rounds) {
        Ok(expanded) => expanded,
        Err(err) => {
            debug!("aliases of '{}' not expanded: {}", command.original_tree.text, err);
            command
        }
    }
}
