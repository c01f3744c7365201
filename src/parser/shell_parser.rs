//! Error-tolerant shell syntax parser
//!
//! Turns a raw command-line buffer into a [`SyntaxNode`] tree of statements,
//! pipelines, commands and words. The buffer is usually mid-edit, so the
//! parser is built around the same principles as the rest of the completion
//! pipeline:
//!
//! - **Never fail** - every input produces a `Program` node
//! - **Mark, don't reject** - unterminated strings, substitutions and
//!   statements are returned with `complete = false` and run to the end of
//!   the buffer
//! - **Byte offsets** - every node records `start..end` into the buffer;
//!   all structural characters are ASCII so offsets stay on char boundaries
//!
//! The grammar is a bash-like superset: statements joined by `&&`, `||`,
//! `|` and `|&`, terminated by `;`, `&`, `&;` or newline, with `{ ... }`
//! compound statements, `( ... )` subshells, assignment prefixes and the usual
//! quoting and expansion forms.

use regex::Regex;
use std::cell::Cell;
use std::sync::LazyLock;

use super::node::{NodeKind, SyntaxNode};

/// `NAME=`, `NAME+=`, `NAME[sub]=`, `NAME[sub]+=`
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\[[^\]]*\])?\+?=").expect("assignment pattern is valid")
});

/// Deepest nesting of groups, substitutions and operator chains. Anything
/// deeper becomes an incomplete node running to the end of the buffer.
pub const MAX_NESTING: usize = 64;

/// Binary operators joining two statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
    Pipe,
    PipeBoth,
}

impl Operator {
    fn len(&self) -> usize {
        match self {
            Operator::Pipe => 1,
            Operator::And | Operator::Or | Operator::PipeBoth => 2,
        }
    }

    fn is_pipe(&self) -> bool {
        matches!(self, Operator::Pipe | Operator::PipeBoth)
    }
}

/// Shell parser over a single buffer
pub struct ShellParser<'a> {
    src: &'a str,
    depth: Cell<usize>,
}

impl<'a> ShellParser<'a> {
    /// Create a new parser for `src`
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            depth: Cell::new(0),
        }
    }

    /// Parse the entire buffer into a `Program` node
    pub fn parse(src: &str) -> SyntaxNode {
        let parser = ShellParser::new(src);
        let (statements, _, _) = parser.parse_statements(0, None);
        let complete = statements.iter().all(|s| s.complete);
        SyntaxNode::new(NodeKind::Program, src, 0, src.len(), complete, statements)
    }

    fn len(&self) -> usize {
        self.src.len()
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.src.get(index..)?.chars().next()
    }

    /// Characters that end a command: terminators, pipes and the enclosing closer
    fn is_stop(c: char, terminal: Option<char>) -> bool {
        matches!(c, ';' | '&' | '|' | '\n') || Some(c) == terminal
    }

    /// Skip spaces, tabs and line continuations, but not newlines
    fn skip_blanks(&self, mut index: usize) -> usize {
        while let Some(c) = self.char_at(index) {
            match c {
                ' ' | '\t' | '\r' => index += 1,
                '\\' if self.char_at(index + 1) == Some('\n') => index += 2,
                _ => break,
            }
        }
        index
    }

    /// Index of the next word, skipping all whitespace and comments
    fn next_word_index(&self, mut index: usize) -> Option<usize> {
        loop {
            while let Some(c) = self.char_at(index) {
                if c.is_whitespace() {
                    index += c.len_utf8();
                } else if c == '\\' && self.char_at(index + 1) == Some('\n') {
                    index += 2;
                } else {
                    break;
                }
            }

            match self.char_at(index)? {
                '#' => index = self.src[index..].find('\n').map(|n| index + n)?,
                _ => return Some(index),
            }
        }
    }

    /// Run `parse` one nesting level deeper, or `None` past [`MAX_NESTING`]
    fn nested<T>(&self, parse: impl FnOnce() -> T) -> Option<T> {
        let depth = self.depth.get();
        if depth >= MAX_NESTING {
            return None;
        }
        self.depth.set(depth + 1);
        let result = parse();
        self.depth.set(depth);
        Some(result)
    }

    /// `{ ... }`, `( ... )`, `$( ... )` and `` `...` ``: statements up to `close`
    fn parse_enclosed(&self, kind: NodeKind, start: usize, body: usize, close: char) -> SyntaxNode {
        let Some((statements, stop, found)) = self.nested(|| self.parse_statements(body, Some(close)))
        else {
            return SyntaxNode::new(kind, self.src, start, self.len(), false, Vec::new());
        };
        let end = if found { stop + 1 } else { self.len() };
        let complete = found && statements.iter().all(|s| s.complete);
        SyntaxNode::new(kind, self.src, start, end, complete, statements)
    }

    fn operator_at(&self, index: usize) -> Option<Operator> {
        let rest = self.src.get(index..)?;
        if rest.starts_with("&&") {
            Some(Operator::And)
        } else if rest.starts_with("||") {
            Some(Operator::Or)
        } else if rest.starts_with("|&") {
            Some(Operator::PipeBoth)
        } else if rest.starts_with('|') {
            Some(Operator::Pipe)
        } else {
            None
        }
    }

    /// Parse statements until `terminal` (or the end of the buffer).
    ///
    /// Returns the statements, the index where scanning stopped and whether
    /// the terminal character was found there.
    fn parse_statements(
        &self,
        start: usize,
        terminal: Option<char>,
    ) -> (Vec<SyntaxNode>, usize, bool) {
        let mut statements = Vec::new();
        let mut index = start;

        loop {
            let Some(next) = self.next_word_index(index) else {
                return (statements, self.len(), false);
            };
            index = next;

            let Some(c) = self.char_at(index) else {
                return (statements, self.len(), false);
            };
            if Some(c) == terminal {
                return (statements, index, true);
            }
            if Self::is_stop(c, terminal) {
                // Stray operator or empty statement
                index += 1;
                continue;
            }

            let statement = self.parse_statement(index, terminal);
            if statement.end <= index {
                index += c.len_utf8();
                continue;
            }
            index = statement.end;
            statements.push(statement);

            let after = self.skip_blanks(index);
            index = match self.char_at(after) {
                Some(';') | Some('\n') => after + 1,
                Some('&') if self.char_at(after + 1) == Some(';') => after + 2,
                Some('&') => after + 1,
                _ => after,
            };
        }
    }

    /// Parse one statement, folding in any `&&`, `||`, `|` or `|&` chain
    fn parse_statement(&self, start: usize, terminal: Option<char>) -> SyntaxNode {
        let first = self.parse_primary(start, terminal);

        let op_index = self.skip_blanks(first.end);
        let Some(op) = self.operator_at(op_index) else {
            return first;
        };
        let after_op = op_index + op.len();
        let kind = if op.is_pipe() {
            NodeKind::Pipeline
        } else {
            NodeKind::List
        };

        let rhs_start = self
            .next_word_index(after_op)
            .filter(|&i| self.char_at(i).is_some_and(|c| !Self::is_stop(c, terminal)));

        let Some(rhs_start) = rhs_start else {
            // Dangling operator: the right-hand side has not been typed yet
            let end = if self.next_word_index(after_op).is_none() {
                self.len()
            } else {
                after_op
            };
            return SyntaxNode::new(kind, self.src, start, end, false, vec![first]);
        };

        let Some(rhs) = self.nested(|| self.parse_statement(rhs_start, terminal)) else {
            return SyntaxNode::new(kind, self.src, start, self.len(), false, vec![first]);
        };
        let end = rhs.end;

        if !op.is_pipe() {
            let mut children = vec![first];
            if rhs.kind == NodeKind::List {
                children.extend(rhs.children);
            } else {
                children.push(rhs);
            }
            return self.node_from_children(NodeKind::List, start, end, children);
        }

        if rhs.kind == NodeKind::List && !rhs.children.is_empty() {
            // `a | b && c` binds as `(a | b) && c`: only the list's head joins the pipe
            let mut rest = rhs.children;
            let head = rest.remove(0);
            let pipeline = self.pipeline_of(first, head);
            let mut children = vec![pipeline];
            children.extend(rest);
            return self.node_from_children(NodeKind::List, start, end, children);
        }

        self.pipeline_of(first, rhs)
    }

    fn pipeline_of(&self, first: SyntaxNode, second: SyntaxNode) -> SyntaxNode {
        let start = first.start;
        let end = second.end;
        let mut children = vec![first];
        if second.kind == NodeKind::Pipeline {
            children.extend(second.children);
        } else {
            children.push(second);
        }
        self.node_from_children(NodeKind::Pipeline, start, end, children)
    }

    fn node_from_children(
        &self,
        kind: NodeKind,
        start: usize,
        end: usize,
        children: Vec<SyntaxNode>,
    ) -> SyntaxNode {
        let complete = children.iter().all(|c| c.complete);
        SyntaxNode::new(kind, self.src, start, end, complete, children)
    }

    fn parse_primary(&self, start: usize, terminal: Option<char>) -> SyntaxNode {
        match self.char_at(start) {
            Some('{')
                if self
                    .char_at(start + 1)
                    .is_none_or(|c| c.is_whitespace()) =>
            {
                self.parse_group(start, NodeKind::CompoundStatement, '}')
            }
            Some('(') => self.parse_group(start, NodeKind::Subshell, ')'),
            _ if ASSIGNMENT.is_match(&self.src[start..]) => {
                self.parse_assignment_list(start, terminal)
            }
            _ => self.parse_command(start, terminal),
        }
    }

    /// `{ ... }` and `( ... )`
    fn parse_group(&self, start: usize, kind: NodeKind, close: char) -> SyntaxNode {
        self.parse_enclosed(kind, start, start + 1, close)
    }

    /// A run of assignments, optionally followed by a command
    fn parse_assignment_list(&self, start: usize, terminal: Option<char>) -> SyntaxNode {
        let mut children = Vec::new();
        let mut index = start;
        let mut terminated = false;

        loop {
            if let Some(found) = ASSIGNMENT.find(&self.src[index..]) {
                let assignment = self.parse_assignment(index, found.end(), terminal);
                index = assignment.end;
                children.push(assignment);

                let next = self.skip_blanks(index);
                match self.char_at(next) {
                    None => break,
                    Some(c) if Self::is_stop(c, terminal) => {
                        terminated = true;
                        break;
                    }
                    Some(_) => index = next,
                }
            } else {
                let command = self.parse_command(index, terminal);
                terminated = command.complete;
                index = command.end;
                children.push(command);
                break;
            }
        }

        let complete = terminated && children.iter().all(|c| c.complete);
        SyntaxNode::new(NodeKind::AssignmentList, self.src, start, index, complete, children)
    }

    fn parse_assignment(&self, start: usize, match_len: usize, terminal: Option<char>) -> SyntaxNode {
        let matched = &self.src[start..start + match_len];
        let name_len = matched
            .find(|c: char| matches!(c, '[' | '+' | '='))
            .unwrap_or(matched.len());

        let mut children = vec![SyntaxNode::new(
            NodeKind::VariableName,
            self.src,
            start,
            start + name_len,
            true,
            Vec::new(),
        )];

        if matched[name_len..].starts_with('[') {
            if let Some(close) = matched[name_len..].find(']') {
                children.push(SyntaxNode::new(
                    NodeKind::Subscript,
                    self.src,
                    start + name_len,
                    start + name_len + close + 1,
                    true,
                    Vec::new(),
                ));
            }
        }

        let value_start = start + match_len;
        let mut end = value_start;
        let mut complete = true;
        if let Some(c) = self.char_at(value_start) {
            if !c.is_whitespace() && !Self::is_stop(c, terminal) {
                let value = self.parse_argument(value_start, terminal);
                end = value.end;
                complete = value.complete;
                children.push(value);
            }
        }

        SyntaxNode::new(NodeKind::Assignment, self.src, start, end, complete, children)
    }

    /// A simple command: arguments up to a terminator, operator or closer.
    ///
    /// The node extends to where scanning stopped, trailing blanks included,
    /// and is incomplete when it ran into the end of the buffer.
    fn parse_command(&self, start: usize, terminal: Option<char>) -> SyntaxNode {
        let mut children = Vec::new();
        let mut index = start;
        let mut terminated = false;

        loop {
            index = self.skip_blanks(index);
            let Some(c) = self.char_at(index) else {
                break;
            };
            if Self::is_stop(c, terminal) {
                terminated = true;
                break;
            }
            if c == '#' {
                index = self.src[index..]
                    .find('\n')
                    .map_or(self.len(), |n| index + n);
                continue;
            }

            let argument = self.parse_argument(index, terminal);
            index = argument.end;
            children.push(argument);
        }

        let complete = terminated && children.iter().all(|c| c.complete);
        SyntaxNode::new(NodeKind::Command, self.src, start, index, complete, children)
    }

    /// One argument: a literal or a concatenation of adjacent literals
    fn parse_argument(&self, start: usize, terminal: Option<char>) -> SyntaxNode {
        let mut parts: Vec<SyntaxNode> = Vec::new();
        let mut word_start: Option<usize> = None;
        let mut index = start;

        let flush = |parts: &mut Vec<SyntaxNode>, word_start: &mut Option<usize>, end: usize| {
            if let Some(ws) = word_start.take() {
                parts.push(SyntaxNode::new(NodeKind::Word, self.src, ws, end, true, Vec::new()));
            }
        };

        while let Some(c) = self.char_at(index) {
            if c == '\\' {
                word_start.get_or_insert(index);
                index += 1;
                if let Some(escaped) = self.char_at(index) {
                    index += escaped.len_utf8();
                }
                continue;
            }
            if c.is_whitespace() || Self::is_stop(c, terminal) {
                break;
            }

            let literal = match c {
                '"' => Some(self.parse_string(index, index)),
                '\'' => Some(self.parse_raw_string(index)),
                '`' => Some(self.parse_backtick(index)),
                '$' => self.parse_dollar(index, false),
                _ => None,
            };

            match literal {
                Some(node) => {
                    flush(&mut parts, &mut word_start, index);
                    index = node.end;
                    parts.push(node);
                }
                None => {
                    word_start.get_or_insert(index);
                    index += c.len_utf8();
                }
            }
        }
        flush(&mut parts, &mut word_start, index);

        match parts.len() {
            0 => SyntaxNode::new(NodeKind::Word, self.src, start, index, true, Vec::new()),
            1 => parts.remove(0),
            _ => {
                let complete = parts.iter().all(|p| p.complete);
                SyntaxNode::new(NodeKind::Concatenation, self.src, start, index, complete, parts)
            }
        }
    }

    /// Double-quoted string; `quote` is the index of the opening `"`
    /// (`start` differs from it for `$"..."`)
    fn parse_string(&self, start: usize, quote: usize) -> SyntaxNode {
        let mut children = Vec::new();
        let mut index = quote + 1;

        while let Some(c) = self.char_at(index) {
            match c {
                '\\' => match self.char_at(index + 1) {
                    Some(next @ ('$' | '`' | '"' | '\\' | '\n')) => index += 1 + next.len_utf8(),
                    _ => index += 1,
                },
                '"' => {
                    let complete = children.iter().all(|c: &SyntaxNode| c.complete);
                    return SyntaxNode::new(
                        NodeKind::String,
                        self.src,
                        start,
                        index + 1,
                        complete,
                        children,
                    );
                }
                '$' => match self.parse_dollar(index, true) {
                    Some(node) => {
                        index = node.end;
                        children.push(node);
                    }
                    None => index += 1,
                },
                '`' => {
                    let node = self.parse_backtick(index);
                    index = node.end;
                    children.push(node);
                }
                _ => index += c.len_utf8(),
            }
        }

        SyntaxNode::new(NodeKind::String, self.src, start, self.len(), false, children)
    }

    /// Single-quoted string: no escapes at all
    fn parse_raw_string(&self, start: usize) -> SyntaxNode {
        match self.src[start + 1..].find('\'') {
            Some(offset) => SyntaxNode::new(
                NodeKind::RawString,
                self.src,
                start,
                start + 1 + offset + 1,
                true,
                Vec::new(),
            ),
            None => SyntaxNode::new(NodeKind::RawString, self.src, start, self.len(), false, Vec::new()),
        }
    }

    /// `$'...'`, where backslash escapes the next character
    fn parse_ansi_c_string(&self, start: usize) -> SyntaxNode {
        let mut index = start + 2;
        while let Some(c) = self.char_at(index) {
            match c {
                '\\' => {
                    index += 1;
                    if let Some(escaped) = self.char_at(index) {
                        index += escaped.len_utf8();
                    }
                }
                '\'' => {
                    return SyntaxNode::new(
                        NodeKind::AnsiCString,
                        self.src,
                        start,
                        index + 1,
                        true,
                        Vec::new(),
                    );
                }
                _ => index += c.len_utf8(),
            }
        }
        SyntaxNode::new(NodeKind::AnsiCString, self.src, start, self.len(), false, Vec::new())
    }

    /// `` `...` `` command substitution
    fn parse_backtick(&self, start: usize) -> SyntaxNode {
        self.parse_enclosed(NodeKind::CommandSubstitution, start, start + 1, '`')
    }

    /// Anything introduced by `$`. Returns `None` when the `$` is literal.
    fn parse_dollar(&self, start: usize, in_string: bool) -> Option<SyntaxNode> {
        let next = self.char_at(start + 1)?;
        let node = match next {
            '(' if self.char_at(start + 2) == Some('(') => self.parse_arithmetic(start),
            '(' => self.parse_enclosed(NodeKind::CommandSubstitution, start, start + 2, ')'),
            '{' => self.parse_braced_expansion(start),
            '\'' if !in_string => self.parse_ansi_c_string(start),
            '"' if !in_string => self.parse_string(start, start + 1),
            '*' | '@' | '#' | '?' | '-' | '$' | '!' | '0'..='9' => SyntaxNode::new(
                NodeKind::SpecialExpansion,
                self.src,
                start,
                start + 2,
                true,
                Vec::new(),
            ),
            c if c == '_' || c.is_ascii_alphabetic() => {
                let name_end = self.src[start + 1..]
                    .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
                    .map_or(self.len(), |n| start + 1 + n);
                let name = SyntaxNode::new(
                    NodeKind::VariableName,
                    self.src,
                    start + 1,
                    name_end,
                    true,
                    Vec::new(),
                );
                SyntaxNode::new(
                    NodeKind::SimpleExpansion,
                    self.src,
                    start,
                    name_end,
                    true,
                    vec![name],
                )
            }
            _ => return None,
        };
        Some(node)
    }

    /// `$((...))`, balanced on parentheses
    fn parse_arithmetic(&self, start: usize) -> SyntaxNode {
        let mut depth = 2usize;
        let mut index = start + 3;
        while let Some(c) = self.char_at(index) {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return SyntaxNode::new(
                            NodeKind::ArithmeticExpansion,
                            self.src,
                            start,
                            index + 1,
                            true,
                            Vec::new(),
                        );
                    }
                }
                _ => {}
            }
            index += c.len_utf8();
        }
        SyntaxNode::new(NodeKind::ArithmeticExpansion, self.src, start, self.len(), false, Vec::new())
    }

    /// `${...}`, balanced on braces
    fn parse_braced_expansion(&self, start: usize) -> SyntaxNode {
        let mut depth = 1usize;
        let mut index = start + 2;
        while let Some(c) = self.char_at(index) {
            match c {
                '\\' => {
                    index += 1;
                    if let Some(escaped) = self.char_at(index) {
                        index += escaped.len_utf8();
                    }
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return SyntaxNode::new(
                            NodeKind::Expansion,
                            self.src,
                            start,
                            index + 1,
                            true,
                            Vec::new(),
                        );
                    }
                }
                _ => {}
            }
            index += c.len_utf8();
        }
        SyntaxNode::new(NodeKind::Expansion, self.src, start, self.len(), false, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> SyntaxNode {
        ShellParser::parse(src)
    }

    fn kinds(node: &SyntaxNode) -> Vec<NodeKind> {
        node.children.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_empty_buffer() {
        let tree = parse("");
        assert_eq!(tree.kind, NodeKind::Program);
        assert!(tree.children.is_empty());
        assert!(tree.complete);
    }

    #[test]
    fn test_simple_command() {
        let tree = parse("git commit -m");
        assert_eq!(kinds(&tree), vec![NodeKind::Command]);
        let command = &tree.children[0];
        let words: Vec<&str> = command.children.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(words, vec!["git", "commit", "-m"]);
        // runs into end of buffer without a terminator
        assert!(!command.complete);
    }

    #[test]
    fn test_terminated_command_is_complete() {
        let tree = parse("ls -la; pwd");
        assert_eq!(kinds(&tree), vec![NodeKind::Command, NodeKind::Command]);
        assert!(tree.children[0].complete);
        assert!(!tree.children[1].complete);
    }

    #[test]
    fn test_command_includes_trailing_blanks() {
        let tree = parse("git co ");
        let command = &tree.children[0];
        assert_eq!(command.range(), 0..7);
        assert_eq!(command.children.len(), 2);
    }

    #[test]
    fn test_concatenation() {
        let tree = parse(r#"echo foo"bar"$baz"#);
        let arg = &tree.children[0].children[1];
        assert_eq!(arg.kind, NodeKind::Concatenation);
        assert_eq!(
            kinds(arg),
            vec![NodeKind::Word, NodeKind::String, NodeKind::SimpleExpansion]
        );
        assert_eq!(arg.inner_text, "foobar$baz");
    }

    #[test]
    fn test_escaped_space_stays_in_word() {
        let tree = parse(r"cd My\ Documents");
        let command = &tree.children[0];
        assert_eq!(command.children.len(), 2);
        assert_eq!(command.children[1].inner_text, "My Documents");
    }

    #[test]
    fn test_unterminated_string() {
        let tree = parse(r#"echo "hello wor"#);
        let arg = &tree.children[0].children[1];
        assert_eq!(arg.kind, NodeKind::String);
        assert!(!arg.complete);
        assert_eq!(arg.end, 15);
        assert_eq!(arg.inner_text, "hello wor");
    }

    #[test]
    fn test_raw_string_ignores_backslash() {
        let tree = parse(r"echo 'a\'");
        let arg = &tree.children[0].children[1];
        assert_eq!(arg.kind, NodeKind::RawString);
        assert!(arg.complete);
        assert_eq!(arg.inner_text, r"a\");
    }

    #[test]
    fn test_double_quote_escapes() {
        let tree = parse(r#"echo "a\"b\q""#);
        let arg = &tree.children[0].children[1];
        assert!(arg.complete);
        assert_eq!(arg.inner_text, r#"a"b\q"#);
    }

    #[test]
    fn test_list_and_pipeline() {
        let tree = parse("a && b || c");
        assert_eq!(kinds(&tree), vec![NodeKind::List]);
        assert_eq!(tree.children[0].children.len(), 3);

        let tree = parse("a | b | c");
        assert_eq!(kinds(&tree), vec![NodeKind::Pipeline]);
        assert_eq!(tree.children[0].children.len(), 3);
    }

    #[test]
    fn test_pipeline_binds_tighter_than_list() {
        let tree = parse("a | b && c");
        let list = &tree.children[0];
        assert_eq!(list.kind, NodeKind::List);
        assert_eq!(kinds(list), vec![NodeKind::Pipeline, NodeKind::Command]);

        let tree = parse("a && b | c");
        let list = &tree.children[0];
        assert_eq!(kinds(list), vec![NodeKind::Command, NodeKind::Pipeline]);
    }

    #[test]
    fn test_dangling_operator_is_incomplete() {
        let tree = parse("ls && ");
        let list = &tree.children[0];
        assert_eq!(list.kind, NodeKind::List);
        assert!(!list.complete);
        assert_eq!(list.end, 6);
    }

    #[test]
    fn test_subshell_and_compound() {
        let tree = parse("(cd src; ls) && { make; }");
        let list = &tree.children[0];
        assert_eq!(kinds(list), vec![NodeKind::Subshell, NodeKind::CompoundStatement]);
        assert_eq!(list.children[0].children.len(), 2);
        assert!(list.children[1].complete);
    }

    #[test]
    fn test_unterminated_subshell() {
        let tree = parse("(cd src; ls");
        let subshell = &tree.children[0];
        assert_eq!(subshell.kind, NodeKind::Subshell);
        assert!(!subshell.complete);
        assert_eq!(subshell.end, 11);
    }

    #[test]
    fn test_command_substitution() {
        let tree = parse("echo $(git rev-parse HEAD) `pwd`");
        let command = &tree.children[0];
        assert_eq!(command.children[1].kind, NodeKind::CommandSubstitution);
        assert_eq!(command.children[1].children[0].kind, NodeKind::Command);
        assert_eq!(command.children[2].kind, NodeKind::CommandSubstitution);
        assert!(command.children[2].complete);
    }

    #[test]
    fn test_expansions() {
        let tree = parse("echo ${HOME} $1 $? $((1 + (2))) $'a\\'b'");
        let kinds = kinds(&tree.children[0]);
        assert_eq!(
            kinds,
            vec![
                NodeKind::Word,
                NodeKind::Expansion,
                NodeKind::SpecialExpansion,
                NodeKind::SpecialExpansion,
                NodeKind::ArithmeticExpansion,
                NodeKind::AnsiCString,
            ]
        );
    }

    #[test]
    fn test_literal_dollar() {
        let tree = parse("echo $ a$");
        let command = &tree.children[0];
        assert_eq!(command.children[1].kind, NodeKind::Word);
        assert_eq!(command.children[2].inner_text, "a$");
    }

    #[test]
    fn test_assignment_list() {
        let tree = parse("FOO=bar ARR[1]+=x git status");
        let list = &tree.children[0];
        assert_eq!(list.kind, NodeKind::AssignmentList);
        assert_eq!(
            kinds(list),
            vec![NodeKind::Assignment, NodeKind::Assignment, NodeKind::Command]
        );
        let second = &list.children[1];
        assert_eq!(
            kinds(second),
            vec![NodeKind::VariableName, NodeKind::Subscript, NodeKind::Word]
        );
        assert_eq!(second.children[0].text, "ARR");
    }

    #[test]
    fn test_assignment_without_value() {
        let tree = parse("FOO= ls");
        let list = &tree.children[0];
        assert_eq!(list.children[0].children.len(), 1);
        assert_eq!(list.children[1].kind, NodeKind::Command);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tree = parse("# comment\nls # trailing");
        assert_eq!(kinds(&tree), vec![NodeKind::Command]);
        assert_eq!(tree.children[0].children.len(), 1);
    }

    #[test]
    fn test_stray_operators_make_progress() {
        for src in ["|", "&&", ";;", ")", "}", "| ls", "ls |& "] {
            let tree = parse(src);
            assert_eq!(tree.end, src.len(), "input {src:?}");
        }
    }

    #[test]
    fn test_background_and_terminators() {
        let tree = parse("sleep 1 & echo done &; ls\nwc");
        assert_eq!(tree.children.len(), 4);
    }

    #[test]
    fn test_multibyte_words() {
        let tree = parse("echo héllo wörld");
        let command = &tree.children[0];
        assert_eq!(command.children[1].inner_text, "héllo");
        assert_eq!(command.children[2].inner_text, "wörld");
        assert_eq!(command.end, "echo héllo wörld".len());
    }

    /// Follow the last child until a leaf
    fn deepest(node: &SyntaxNode) -> (&SyntaxNode, usize) {
        let mut node = node;
        let mut levels = 0;
        while let Some(last) = node.children.last() {
            node = last;
            levels += 1;
        }
        (node, levels)
    }

    #[test]
    fn test_deep_substitution_is_capped() {
        let src = "echo $(".repeat(10_000);
        let tree = parse(&src);
        assert!(!tree.complete);
        assert_eq!(tree.end, src.len());

        let (leaf, levels) = deepest(&tree);
        assert!(levels < 10_000);
        assert_eq!(leaf.kind, NodeKind::CommandSubstitution);
        assert!(!leaf.complete);
        assert!(leaf.children.is_empty());
        assert_eq!(leaf.end, src.len());
    }

    #[test]
    fn test_deep_groups_are_capped() {
        let src = "{ ".repeat(10_000);
        let tree = parse(&src);
        let (leaf, _) = deepest(&tree);
        assert_eq!(leaf.kind, NodeKind::CompoundStatement);
        assert!(!leaf.complete);
        assert_eq!(leaf.end, src.len());
    }

    #[test]
    fn test_long_operator_chain_is_capped() {
        let src = "a | ".repeat(5_000) + "b";
        let tree = parse(&src);
        assert!(!tree.complete);
        assert_eq!(tree.end, src.len());
    }

    #[test]
    fn test_nesting_within_cap_is_complete() {
        let src = format!("echo {}x{}", "$(echo ".repeat(20), ")".repeat(20));
        let tree = parse(&src);
        let substitution = &tree.children[0].children[1];
        assert_eq!(substitution.kind, NodeKind::CommandSubstitution);
        assert!(substitution.complete);
    }
}
