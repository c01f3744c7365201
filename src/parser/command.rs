//! Command extraction
//!
//! Locates the command under the cursor in a parsed buffer and turns it into
//! a token list. Tokens keep a link to the node they were read from in the
//! buffer as typed, so that alias expansion can rewrite a command while every
//! token still points back at the text the user actually entered.

use serde::Serialize;
use std::collections::HashMap;

use super::alias::expand_command;
use super::node::{NodeKind, SyntaxNode};
use super::shell_parser::ShellParser;
use crate::error::CommandError;

/// Alias name to replacement text
pub type AliasMap = HashMap<String, String>;

/// Default bound on alias substitution rounds
pub const DEFAULT_MAX_ALIAS_ROUNDS: usize = 16;

/// One argument of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Unquoted text of the argument
    pub text: String,
    /// Node in the (possibly alias-expanded) command
    pub node: SyntaxNode,
    /// Node in the buffer as typed
    pub original_node: SyntaxNode,
}

impl Token {
    fn from_node(node: &SyntaxNode) -> Self {
        Self {
            text: node.inner_text.clone(),
            node: node.clone(),
            original_node: node.clone(),
        }
    }
}

/// A command node plus its tokens up to the cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Command node after alias expansion
    pub tree: SyntaxNode,
    /// Command node as typed
    pub original_tree: SyntaxNode,
    pub tokens: Vec<Token>,
    /// Cursor offset in `tree`'s coordinates
    pub cursor: usize,
}

impl Command {
    /// Build a command from a `Command` node.
    ///
    /// Children starting after the cursor are ignored. When the cursor sits
    /// past the end of the last token (the buffer ends in unescaped
    /// whitespace), an empty token is appended at the cursor.
    ///
    /// # Arguments
    /// * `node` - Node of kind `Command`
    /// * `cursor` - Byte offset of the cursor in the buffer
    ///
    /// # Returns
    /// * `Result<Self, CommandError>` - The command, or `NotACommand` for other node kinds
    pub fn from_node(node: &SyntaxNode, cursor: usize) -> Result<Self, CommandError> {
        if node.kind != NodeKind::Command {
            return Err(CommandError::NotACommand {
                kind: node.kind.to_string(),
            });
        }

        let cursor = cursor.clamp(node.start, node.end);
        let mut tokens: Vec<Token> = node
            .children
            .iter()
            .filter(|child| child.start <= cursor)
            .map(Token::from_node)
            .collect();

        let last_end = tokens.last().map_or(node.start, |t| t.node.end);
        if cursor > last_end || tokens.is_empty() {
            let empty = SyntaxNode::text_node(NodeKind::Word, cursor, "");
            tokens.push(Token::from_node(&empty));
        }

        Ok(Self {
            tree: node.clone(),
            original_tree: node.clone(),
            tokens,
            cursor,
        })
    }

    /// Token texts in order
    pub fn token_texts(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// The token being completed
    pub fn final_token(&self) -> Option<&Token> {
        self.tokens.last()
    }

    /// Whether the first token is still being typed
    pub fn is_completing_command_name(&self) -> bool {
        self.tokens.len() == 1
    }
}

/// Find the innermost, right-most `Command` node containing the cursor
pub fn find_command_node(tree: &SyntaxNode, cursor: usize) -> Option<&SyntaxNode> {
    tree.walk()
        .filter(|node| node.kind == NodeKind::Command && node.contains(cursor))
        .last()
}

/// Extract the command under the cursor, expanding aliases.
///
/// # Arguments
/// * `buffer` - Full command line
/// * `aliases` - Alias definitions
/// * `cursor` - Cursor byte offset; defaults to the end of the buffer
///
/// # Returns
/// * `Option<Command>` - `None` when no command contains the cursor
pub fn get_command(buffer: &str, aliases: &AliasMap, cursor: Option<usize>) -> Option<Command> {
    get_command_bounded(buffer, aliases, cursor, DEFAULT_MAX_ALIAS_ROUNDS)
}

/// [`get_command`] with an explicit bound on alias substitution rounds
pub fn get_command_bounded(
    buffer: &str,
    aliases: &AliasMap,
    cursor: Option<usize>,
    max_alias_rounds: usize,
) -> Option<Command> {
    let cursor = cursor.unwrap_or(buffer.len()).min(buffer.len());
    let tree = ShellParser::parse(buffer);
    let node = find_command_node(&tree, cursor)?;
    let command = Command::from_node(node, cursor).ok()?;
    Some(expand_command(command, aliases, max_alias_rounds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases() -> AliasMap {
        AliasMap::new()
    }

    #[test]
    fn test_tokens_of_simple_command() {
        let command = get_command("git commit -m", &no_aliases(), None).unwrap();
        assert_eq!(command.token_texts(), vec!["git", "commit", "-m"]);
    }

    #[test]
    fn test_trailing_whitespace_adds_empty_token() {
        let command = get_command("git co ", &no_aliases(), None).unwrap();
        assert_eq!(command.token_texts(), vec!["git", "co", ""]);
        let last = command.final_token().unwrap();
        assert_eq!(last.node.range(), 7..7);
    }

    #[test]
    fn test_escaped_trailing_space_is_part_of_token() {
        let command = get_command(r"cd foo\ ", &no_aliases(), None).unwrap();
        assert_eq!(command.token_texts(), vec!["cd", "foo "]);
    }

    #[test]
    fn test_picks_command_after_operator() {
        let command = get_command("echo hello && echo wor", &no_aliases(), None).unwrap();
        assert_eq!(command.token_texts(), vec!["echo", "wor"]);
        assert_eq!(command.tree.start, 14);
    }

    #[test]
    fn test_picks_innermost_command() {
        let command = get_command("echo $(git ch", &no_aliases(), None).unwrap();
        assert_eq!(command.token_texts(), vec!["git", "ch"]);
    }

    #[test]
    fn test_cursor_in_middle_of_buffer() {
        let command = get_command("ls -l; git status", &no_aliases(), Some(5)).unwrap();
        assert_eq!(command.token_texts(), vec!["ls", "-l"]);
    }

    #[test]
    fn test_cursor_between_tokens() {
        let command = get_command("git  checkout", &no_aliases(), Some(4)).unwrap();
        assert_eq!(command.token_texts(), vec!["git", ""]);
    }

    #[test]
    fn test_no_command() {
        assert!(get_command("", &no_aliases(), None).is_none());
        assert!(get_command("ls; ", &no_aliases(), None).is_none());
    }

    #[test]
    fn test_from_node_rejects_other_kinds() {
        let tree = ShellParser::parse("a | b");
        let err = Command::from_node(&tree.children[0], 5).unwrap_err();
        assert_eq!(
            err,
            CommandError::NotACommand {
                kind: "Pipeline".to_string()
            }
        );
    }

    #[test]
    fn test_quoted_token_text() {
        let command = get_command(r#"git commit -m "fix bug"#, &no_aliases(), None).unwrap();
        assert_eq!(command.token_texts(), vec!["git", "commit", "-m", "fix bug"]);
    }
}
