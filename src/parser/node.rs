//! Syntax tree produced by the shell parser
//!
//! Every node records its byte range in the parsed buffer, its raw text and a
//! derived `inner_text` with quotes and escapes removed according to its kind.

use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// Node types of the shell syntax tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Program,
    CompoundStatement,
    Subshell,
    Pipeline,
    List,
    Command,
    Concatenation,
    Word,
    String,
    RawString,
    AnsiCString,
    Expansion,
    SimpleExpansion,
    SpecialExpansion,
    CommandSubstitution,
    ArithmeticExpansion,
    Assignment,
    AssignmentList,
    VariableName,
    Subscript,
}

impl NodeKind {
    /// Whether this kind can appear as a command argument
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            NodeKind::Concatenation
                | NodeKind::Word
                | NodeKind::String
                | NodeKind::RawString
                | NodeKind::AnsiCString
                | NodeKind::Expansion
                | NodeKind::SimpleExpansion
                | NodeKind::SpecialExpansion
                | NodeKind::CommandSubstitution
                | NodeKind::ArithmeticExpansion
        )
    }

    /// Whether this kind is a statement
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::CompoundStatement
                | NodeKind::Subshell
                | NodeKind::Pipeline
                | NodeKind::List
                | NodeKind::Command
                | NodeKind::AssignmentList
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A node in the parsed buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Raw source text
    pub text: String,
    /// Text with quoting and escapes stripped
    pub inner_text: String,
    /// False when an unterminated construct ran into the end of the buffer
    pub complete: bool,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Create a node covering `source[start..end]`
    pub fn new(
        kind: NodeKind,
        source: &str,
        start: usize,
        end: usize,
        complete: bool,
        children: Vec<SyntaxNode>,
    ) -> Self {
        let text = source[start..end].to_string();
        let inner_text = inner_text_of(kind, &text, complete, &children);
        Self {
            kind,
            start,
            end,
            text,
            inner_text,
            complete,
            children,
        }
    }

    /// Create a leaf node that carries `text` at `start`, independent of any buffer
    pub fn text_node(kind: NodeKind, start: usize, text: &str) -> Self {
        Self {
            kind,
            start,
            end: start + text.len(),
            text: text.to_string(),
            inner_text: text.to_string(),
            complete: true,
            children: Vec::new(),
        }
    }

    /// Byte range of this node
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Whether the cursor lies within `[start, end]` (both inclusive)
    pub fn contains(&self, cursor: usize) -> bool {
        self.start <= cursor && cursor <= self.end
    }

    /// Copy of this subtree with every offset moved right by `amount`
    pub fn shifted(&self, amount: usize) -> Self {
        Self {
            kind: self.kind,
            start: self.start + amount,
            end: self.end + amount,
            text: self.text.clone(),
            inner_text: self.inner_text.clone(),
            complete: self.complete,
            children: self.children.iter().map(|c| c.shifted(amount)).collect(),
        }
    }

    /// Pre-order iterator over this node and all descendants
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Whether the raw text ends in whitespace that is not escaped
    pub fn ends_with_unescaped_whitespace(&self) -> bool {
        let Some(last) = self.text.chars().last() else {
            return false;
        };
        if !last.is_whitespace() {
            return false;
        }
        let before = &self.text[..self.text.len() - last.len_utf8()];
        let backslashes = before.chars().rev().take_while(|c| *c == '\\').count();
        backslashes % 2 == 0
    }
}

/// Pre-order traversal over a syntax tree
pub struct Walk<'a> {
    stack: Vec<&'a SyntaxNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

fn inner_text_of(kind: NodeKind, text: &str, complete: bool, children: &[SyntaxNode]) -> String {
    match kind {
        NodeKind::Word => unescape_word(text),
        NodeKind::String => {
            let body = text.strip_prefix('$').unwrap_or(text);
            let body = body.strip_prefix('"').unwrap_or(body);
            let body = if complete {
                body.strip_suffix('"').unwrap_or(body)
            } else {
                body
            };
            unescape_double_quoted(body)
        }
        NodeKind::RawString => {
            let body = text.strip_prefix('\'').unwrap_or(text);
            if complete {
                body.strip_suffix('\'').unwrap_or(body).to_string()
            } else {
                body.to_string()
            }
        }
        NodeKind::AnsiCString => {
            let body = text.strip_prefix("$'").unwrap_or(text);
            let body = if complete {
                body.strip_suffix('\'').unwrap_or(body)
            } else {
                body
            };
            unescape_ansi_c(body)
        }
        NodeKind::Concatenation => children.iter().map(|c| c.inner_text.as_str()).collect(),
        _ => text.to_string(),
    }
}

/// Bare words: `\x` is `x`, backslash-newline is a line continuation
fn unescape_word(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\n') | None => {}
            Some(escaped) => out.push(escaped),
        }
    }
    out
}

/// Double quotes only escape `$`, backtick, `"`, `\` and newline
fn unescape_double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('\n') => {
                chars.next();
            }
            Some(next @ ('$' | '`' | '"' | '\\')) => {
                chars.next();
                out.push(next);
            }
            _ => out.push('\\'),
        }
    }
    out
}

fn unescape_ansi_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('e') | Some('E') => out.push('\u{1b}'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
