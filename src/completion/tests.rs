use super::*;
use crate::config::EngineConfig;
use crate::error::GeneratorError;
use crate::parser::{AliasMap, get_command};
use crate::spec::{Arg, CliOption, CustomGenerator, Generator, SpecRegistry, Subcommand};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executor answering every script with fixed output
struct ScriptedExecutor {
    stdout: &'static str,
    calls: Mutex<usize>,
}

impl ScriptedExecutor {
    fn new(stdout: &'static str) -> Arc<Self> {
        Arc::new(Self {
            stdout,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        _program: &str,
        _args: &[String],
        _context: &ShellContext,
        _limit: Duration,
    ) -> Result<ExecuteOutput, GeneratorError> {
        *self.calls.lock().unwrap() += 1;
        Ok(ExecuteOutput {
            exit_code: Some(0),
            stdout: self.stdout.to_string(),
            stderr: String::new(),
        })
    }
}

struct Sleepy;

#[async_trait]
impl CustomGenerator for Sleepy {
    async fn generate(
        &self,
        _tokens: &[String],
        _executor: Arc<dyn CommandExecutor>,
        _context: &ShellContext,
    ) -> Result<Vec<Suggestion>, GeneratorError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(vec![Suggestion::new("late", SuggestionType::Arg)])
    }
}

const GIT_SPEC: &str = r#"{
    "name": "git",
    "subcommands": [
        {
            "name": ["checkout", "co"],
            "description": "Switch branches",
            "options": [{ "name": ["-b"], "args": { "name": "new-branch" } }],
            "args": {
                "name": "branch",
                "generators": {
                    "script": ["git", "branch", "--format=%(refname:short)"],
                    "cache": { "ttl": 60000, "cacheKey": "branches" }
                }
            }
        },
        { "name": "commit", "options": [{ "name": ["-m", "--message"], "args": { "name": "msg" } }] }
    ],
    "options": [{ "name": "--version" }]
}"#;

const LS_SPEC: &str = r#"{
    "name": "ls",
    "options": [
        { "name": "-a", "isRepeatable": false },
        { "name": "-l" },
        { "name": "-h" }
    ],
    "args": { "name": "path", "isOptional": true, "isVariadic": true, "template": "filepaths" }
}"#;

fn registry() -> Arc<SpecRegistry> {
    let mut registry = SpecRegistry::new();
    registry.load_json(GIT_SPEC).unwrap();
    registry.load_json(LS_SPEC).unwrap();
    Arc::new(registry)
}

fn names(response: &CompletionResponse) -> Vec<&str> {
    response
        .suggestions
        .iter()
        .map(|s| s.name.as_str())
        .collect()
}

fn tokens_of(buffer: &str) -> Vec<String> {
    get_command(buffer, &AliasMap::new(), None)
        .unwrap()
        .token_texts()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_optional_option_arg_forces_args_only() {
    let mut tunnel = Subcommand::named("tunnel");
    let mut log = CliOption::new(["--log"]);
    log.args.push(Arg::named("level").optional());
    tunnel.options.push(log);
    let mut root = Subcommand::named("code-tunnel");
    root.subcommands.push(tunnel);

    let result = parse_tokens(&["code-tunnel", "tunnel", "--log", "t"], &root).unwrap();
    assert_eq!(result.completion_obj.primary_name(), "tunnel");
    assert_eq!(result.current_arg.unwrap().name.as_deref(), Some("level"));
    assert_eq!(result.search_term, "t");
    assert_eq!(result.suggestion_flags, SuggestionFlags::ARGS);
}

#[tokio::test]
async fn test_passed_option_not_suggested_again() {
    let engine = CompletionEngine::new(registry(), ScriptedExecutor::new(""), EngineConfig::default());
    let response = engine.resolve("ls -a -", 7, &ShellContext::default()).await;

    assert_eq!(names(&response), vec!["-h", "-l"]);
    assert!(response.files_requested);
    assert_eq!(response.search_term, "-");
}

#[test]
fn test_repeatable_cap_from_json() {
    let mut registry = SpecRegistry::new();
    registry
        .load_json(r#"{ "name": "ssh", "options": [{ "name": "-v", "isRepeatable": 2 }], "args": { "name": "host" } }"#)
        .unwrap();
    let spec = registry.get("ssh").unwrap();

    let result = parse_tokens(&["ssh", "-v", "-v", "-v"], &spec).unwrap();
    assert!(!matches!(result.annotations[3], Annotation::Option { .. }));
    assert_eq!(result.passed_options.len(), 2);

    // Two passes exhaust the option
    let result = parse_tokens(&["ssh", "-v", "-v", "-"], &spec).unwrap();
    assert!(assemble(&result, Vec::new()).is_empty());
}

#[test]
fn test_resolution_is_deterministic() {
    let registry = registry();
    let spec = registry.get("git").unwrap();
    let tokens = tokens_of("git commit -m 'wip' --message=x -");

    let a = parse_tokens(&tokens, &spec).unwrap();
    let b = parse_tokens(&tokens, &spec).unwrap();
    assert_eq!(a.annotations, b.annotations);
    assert_eq!(a.search_term, b.search_term);
    assert_eq!(a.suggestion_flags, b.suggestion_flags);
    assert_eq!(a.passed_options.len(), b.passed_options.len());
    assert!(std::ptr::eq(a.completion_obj, b.completion_obj));
}

#[test]
fn test_second_command_resolves_alone() {
    let registry = registry();
    let spec = registry.get("git").unwrap();
    let tokens = tokens_of("ls -la && git co");
    assert_eq!(tokens, vec!["git", "co"]);

    let result = parse_tokens(&tokens, &spec).unwrap();
    assert_eq!(result.search_term, "co");
    let suggestions = assemble(&result, Vec::new());
    assert_eq!(suggestions[0].name, "co");
}

#[tokio::test]
async fn test_script_generator_through_engine() {
    let executor = ScriptedExecutor::new("main\nmaint\ndev\n");
    let engine = CompletionEngine::new(registry(), executor.clone(), EngineConfig::default());

    let response = engine
        .resolve("git checkout ma", 15, &ShellContext::default())
        .await;
    assert_eq!(names(&response), vec!["main", "maint"]);
    assert_eq!(response.replace_start, 13);
    assert_eq!(response.search_term, "ma");

    // Cached for the ttl, and reused across keystrokes
    engine
        .resolve("git checkout mai", 16, &ShellContext::default())
        .await;
    engine
        .resolve("git co d", 8, &ShellContext::default())
        .await;
    assert_eq!(*executor.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_option_arg_skips_generators() {
    let executor = ScriptedExecutor::new("main\n");
    let engine = CompletionEngine::new(registry(), executor.clone(), EngineConfig::default());

    let response = engine
        .resolve("git checkout -b ", 16, &ShellContext::default())
        .await;
    assert!(response.suggestions.is_empty());
    assert_eq!(*executor.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_alias_expansion_through_engine() {
    let engine = CompletionEngine::new(registry(), ScriptedExecutor::new(""), EngineConfig::default())
        .with_aliases(AliasMap::from([("g".to_string(), "git".to_string())]));

    let response = engine.resolve("g c", 3, &ShellContext::default()).await;
    // The first matching name of each subcommand is shown
    assert_eq!(names(&response), vec!["commit", "checkout"]);
    assert_eq!(response.replace_start, 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_generator_times_out() {
    let mut registry = SpecRegistry::new();
    let mut slow = Subcommand::named("slow");
    let mut arg = Arg::named("thing");
    arg.generators.push(Generator::custom(Arc::new(Sleepy)));
    slow.args.push(arg);
    registry.insert(slow).unwrap();

    let engine = CompletionEngine::new(
        Arc::new(registry),
        ScriptedExecutor::new(""),
        EngineConfig::default(),
    );
    let outcome = engine
        .complete("slow ", 5, &ShellContext::default(), &CancellationToken::new())
        .await;
    assert_eq!(outcome, CompletionOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_while_generating() {
    let mut registry = SpecRegistry::new();
    let mut slow = Subcommand::named("slow");
    let mut arg = Arg::named("thing");
    arg.generators.push(Generator::custom(Arc::new(Sleepy)));
    slow.args.push(arg);
    registry.insert(slow).unwrap();

    let engine = CompletionEngine::new(
        Arc::new(registry),
        ScriptedExecutor::new(""),
        EngineConfig::default(),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = engine
        .complete("slow ", 5, &ShellContext::default(), &cancel)
        .await;
    assert_eq!(outcome, CompletionOutcome::Cancelled);
}

#[tokio::test]
async fn test_inline_value_replaces_only_the_value() {
    let engine = CompletionEngine::new(registry(), ScriptedExecutor::new(""), EngineConfig::default());
    let buffer = "git commit --message=wi";

    let response = engine.resolve(buffer, buffer.len(), &ShellContext::default()).await;
    assert_eq!(response.search_term, "wi");
    assert_eq!(response.replace_start, 21);
    assert_eq!(&buffer[..response.replace_start], "git commit --message=");
}

#[tokio::test]
async fn test_query_term_narrows_replacement() {
    let mut registry = SpecRegistry::new();
    registry
        .load_json(r#"{ "name": "cd", "args": { "name": "dir", "generators": { "script": "ls", "getQueryTerm": "/" } } }"#)
        .unwrap();
    let engine = CompletionEngine::new(
        Arc::new(registry),
        ScriptedExecutor::new("alpha\nbeta\n"),
        EngineConfig::default(),
    );

    let response = engine.resolve("cd src/al", 9, &ShellContext::default()).await;
    assert_eq!(names(&response), vec!["alpha"]);
    assert_eq!(response.search_term, "al");
    assert_eq!(response.replace_start, 7);
}

#[tokio::test]
async fn test_aliased_command_uses_target_spec() {
    let mut registry = SpecRegistry::new();
    registry
        .load_json(r#"{ "name": "man", "options": [{ "name": "-k" }], "args": { "name": "page", "generators": { "script": "man -k ." } } }"#)
        .unwrap();
    let engine = CompletionEngine::new(
        Arc::new(registry),
        ScriptedExecutor::new("lsof\nls\n"),
        EngineConfig::default(),
    )
    .with_aliases(AliasMap::from([("woman".to_string(), "man".to_string())]));

    let response = engine.resolve("woman ", 6, &ShellContext::default()).await;
    let mut found = names(&response);
    found.sort_unstable();
    assert_eq!(found, vec!["-k", "ls", "lsof"]);
    assert_eq!(response.replace_start, 6);

    // Still typing the alias itself: command names, not man's spec
    let response = engine.resolve("woman", 5, &ShellContext::default()).await;
    assert_eq!(names(&response), vec!["woman"]);
    assert_eq!(response.replace_start, 0);
}

#[tokio::test]
async fn test_engines_share_cache_key() {
    let executor = ScriptedExecutor::new("main\ndev\n");
    let cache = GeneratorCache::new();
    let first = CompletionEngine::new(registry(), executor.clone(), EngineConfig::default())
        .with_cache(cache.clone());
    let second = CompletionEngine::new(registry(), executor.clone(), EngineConfig::default())
        .with_cache(cache.clone());
    let shell = ShellContext::default();

    let (a, b) = tokio::join!(
        first.resolve("git checkout ", 13, &shell),
        second.resolve("git co ", 7, &shell),
    );
    assert_eq!(names(&a), names(&b));
    assert!(names(&a).contains(&"main"));
    assert_eq!(*executor.calls.lock().unwrap(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_required_separator_through_engine() {
    let mut registry = SpecRegistry::new();
    registry
        .load_json(
            r#"{
                "name": "tool",
                "options": [{
                    "name": "--log",
                    "requiresSeparator": true,
                    "args": { "name": "level", "suggestions": ["debug", "info"] }
                }],
                "args": { "name": "file", "isOptional": true, "generators": { "script": "ls" } }
            }"#,
        )
        .unwrap();
    let engine = CompletionEngine::new(
        Arc::new(registry),
        ScriptedExecutor::new("notes.txt\n"),
        EngineConfig::default(),
    );
    let shell = ShellContext::default();

    // A space does not start the value
    let response = engine.resolve("tool --log ", 11, &shell).await;
    let found = names(&response);
    assert!(found.contains(&"notes.txt"));
    assert!(!found.contains(&"debug"));

    let response = engine.resolve("tool --log=d", 12, &shell).await;
    assert_eq!(names(&response), vec!["debug"]);
    assert_eq!(response.replace_start, 11);
}
