//! Shell command-line parsing
//!
//! This module turns a raw, possibly half-typed command line into the
//! structures the completion engine works on.
//!
//! # Architecture
//!
//! - `node`: Syntax tree types ([`SyntaxNode`], [`NodeKind`])
//! - `shell_parser`: Error-tolerant bash-like parser producing the tree
//! - `command`: Locating the command under the cursor and tokenizing it
//! - `alias`: Alias substitution with token realignment
//!
//! # Examples
//!
//! ```
//! use argsense::parser::{get_command, parse, AliasMap, NodeKind};
//!
//! let tree = parse("git status && git co");
//! assert_eq!(tree.children[0].kind, NodeKind::List);
//!
//! let mut aliases = AliasMap::new();
//! aliases.insert("gco".to_string(), "git checkout".to_string());
//!
//! let command = get_command("cd repo; gco ", &aliases, None).unwrap();
//! assert_eq!(command.token_texts(), vec!["git", "checkout", ""]);
//! ```

mod alias;
mod command;
mod node;
mod shell_parser;

#[cfg(test)]
mod tests;

pub use alias::{expand_command, substitute_alias, try_expand_command};
pub use command::{
    AliasMap, Command, DEFAULT_MAX_ALIAS_ROUNDS, Token, find_command_node, get_command,
    get_command_bounded,
};
pub use node::{NodeKind, SyntaxNode, Walk};
pub use shell_parser::ShellParser;

/// Parse a command line into a `Program` syntax tree.
///
/// Parsing never fails; unterminated constructs are marked incomplete.
pub fn parse(buffer: &str) -> SyntaxNode {
    ShellParser::parse(buffer)
}
