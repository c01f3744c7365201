use super::*;

/// Buffers covering complete, half-typed and malformed input
const CORPUS: &[&str] = &[
    "",
    " ",
    "git",
    "git co ",
    "git commit -m \"wip",
    "echo 'unterminated",
    "echo hello && echo wor",
    "ls -la | grep foo || echo none; cd ..",
    "FOO=1 BAR=\"two\" make -j4 ",
    "echo $(git rev-parse --abbrev-ref HEAD",
    "echo ${HOME}/bin \"$USER\"'s' ",
    "{ echo a; echo b; } && (cd /tmp && ls",
    "arr[2]=x cmd arg\\ with\\ spaces ",
    "cat <(echo a) | wc -l &",
    "echo héllo wörld && grep ü",
    "git checkout -- ",
    "a |",
    "a && ",
    ";;;",
];

fn no_aliases() -> AliasMap {
    AliasMap::new()
}

#[test]
fn test_parse_is_idempotent() {
    for buffer in CORPUS {
        assert_eq!(parse(buffer), parse(buffer), "buffer: {buffer:?}");
    }
}

#[test]
fn test_node_ranges_nest() {
    for buffer in CORPUS {
        let tree = parse(buffer);
        assert_eq!(tree.kind, NodeKind::Program);

        for node in tree.walk() {
            assert!(
                node.start <= node.end && node.end <= buffer.len(),
                "{:?} {:?} out of bounds in {buffer:?}",
                node.kind,
                node.range()
            );
            assert_eq!(
                buffer.get(node.range()),
                Some(node.text.as_str()),
                "text of {:?} in {buffer:?}",
                node.kind
            );
            for child in &node.children {
                assert!(
                    node.start <= child.start && child.end <= node.end,
                    "{:?} {:?} escapes {:?} {:?} in {buffer:?}",
                    child.kind,
                    child.range(),
                    node.kind,
                    node.range()
                );
            }
        }
    }
}

#[test]
fn test_tokens_are_separated_by_whitespace() {
    for buffer in CORPUS {
        let Some(command) = get_command(buffer, &no_aliases(), None) else {
            continue;
        };

        for pair in command.tokens.windows(2) {
            let gap = &buffer[pair[0].original_node.end..pair[1].original_node.start];
            assert!(
                gap.chars().all(char::is_whitespace),
                "gap {gap:?} between tokens in {buffer:?}"
            );
        }
        for token in &command.tokens {
            assert_eq!(buffer.get(token.original_node.range()), Some(token.original_node.text.as_str()));
        }
    }
}

#[test]
fn test_every_cursor_position() {
    let buffer = "git commit -m \"x\" && ls -la | wc";
    for cursor in 0..=buffer.len() {
        if let Some(command) = get_command(buffer, &no_aliases(), Some(cursor)) {
            assert!(!command.tokens.is_empty());
            assert!(command.tokens.iter().all(|t| t.original_node.start <= cursor));
        }
    }
}

#[test]
fn test_subcommand_position_gets_empty_token() {
    let command = get_command("git co ", &no_aliases(), None).unwrap();
    assert_eq!(command.token_texts(), vec!["git", "co", ""]);

    let last = command.final_token().unwrap();
    assert_eq!(last.original_node.start, 7);
    assert!(!command.is_completing_command_name());
}

#[test]
fn test_alias_applies_once_a_second_token_exists() {
    let aliases = AliasMap::from([("woman".to_string(), "man".to_string())]);

    let command = get_command("woman ", &aliases, None).unwrap();
    assert_eq!(command.token_texts(), vec!["man", ""]);
    assert_eq!(command.tokens[0].original_node.text, "woman");
    assert_eq!(command.tokens[1].original_node.start, 6);

    let command = get_command("woman", &aliases, None).unwrap();
    assert_eq!(command.token_texts(), vec!["woman"]);
    assert!(command.is_completing_command_name());
}

#[test]
fn test_last_command_of_list() {
    let command = get_command("echo hello && echo wor", &no_aliases(), None).unwrap();
    assert_eq!(command.token_texts(), vec!["echo", "wor"]);
    assert_eq!(command.final_token().unwrap().original_node.start, 19);
}

#[test]
fn test_alias_keeps_typed_suffix() {
    let aliases = AliasMap::from([("gl".to_string(), "git log --oneline".to_string())]);
    let buffer = "gl -n 5 --gr";

    let command = get_command(buffer, &aliases, None).unwrap();
    assert_eq!(
        command.token_texts(),
        vec!["git", "log", "--oneline", "-n", "5", "--gr"]
    );

    // Every token after the alias still points at the typed buffer
    let originals: Vec<&str> = command
        .tokens
        .iter()
        .map(|t| t.original_node.text.as_str())
        .collect();
    assert_eq!(originals, vec!["gl", "gl", "gl", "-n", "5", "--gr"]);
    assert_eq!(command.final_token().unwrap().original_node.start, 8);
    assert_eq!(command.original_tree.text, buffer);
}

#[test]
fn test_cursor_inside_substitution() {
    let buffer = "echo $(git rev-parse --abbrev-ref HEAD";
    let command = get_command(buffer, &no_aliases(), None).unwrap();
    assert_eq!(command.token_texts(), vec!["git", "rev-parse", "--abbrev-ref", "HEAD"]);
}
