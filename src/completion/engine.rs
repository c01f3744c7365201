//! Completion engine - orchestrates the completion flow
//!
//! This module provides the main completion engine that ties together all the
//! completion components: command extraction, alias expansion, the argument
//! state machine, generators and suggestion assembly.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::GeneratorCache;
use super::context::{Annotation, SuggestionFlags};
use super::executor::{CommandExecutor, ShellContext};
use super::fsm::parse_tokens;
use super::generator::{GeneratorContext, GeneratorSession, slot_key};
use super::globals::ShellGlobalsCache;
use super::suggestion::{Suggestion, SuggestionType, assemble, rank};
use crate::config::EngineConfig;
use crate::parser::{AliasMap, Command, get_command_bounded};
use crate::spec::{SpecRegistry, resolve_dynamic};

/// Everything the caller needs to present completions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionResponse {
    pub suggestions: Vec<Suggestion>,
    pub search_term: String,
    /// Byte offset in the buffer where the completed word starts
    pub replace_start: usize,
    /// The caller should also list files
    pub files_requested: bool,
    /// The caller should also list folders
    pub folders_requested: bool,
    pub annotations: Vec<Annotation>,
}

impl CompletionResponse {
    fn empty(replace_start: usize) -> Self {
        Self {
            replace_start,
            ..Self::default()
        }
    }
}

/// How a completion request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed(CompletionResponse),
    /// The request deadline passed first
    TimedOut,
    Cancelled,
}

impl CompletionOutcome {
    /// Response, or an empty one when the request did not complete
    pub fn into_response(self) -> CompletionResponse {
        match self {
            CompletionOutcome::Completed(response) => response,
            CompletionOutcome::TimedOut | CompletionOutcome::Cancelled => {
                CompletionResponse::default()
            }
        }
    }
}

/// Main completion engine
pub struct CompletionEngine {
    registry: Arc<SpecRegistry>,
    executor: Arc<dyn CommandExecutor>,
    cache: GeneratorCache,
    globals: Option<ShellGlobalsCache>,
    /// Aliases applied over the discovered ones
    aliases: AliasMap,
    session: Mutex<GeneratorSession>,
    config: EngineConfig,
}

impl CompletionEngine {
    /// Create a new completion engine
    ///
    /// # Arguments
    /// * `registry` - Completion specs
    /// * `executor` - Runs script generators
    /// * `config` - Timeouts and limits
    pub fn new(
        registry: Arc<SpecRegistry>,
        executor: Arc<dyn CommandExecutor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            cache: GeneratorCache::new(),
            globals: None,
            aliases: AliasMap::new(),
            session: Mutex::new(GeneratorSession::new()),
            config,
        }
    }

    pub fn with_globals(mut self, globals: ShellGlobalsCache) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn with_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// Share generator results with other engines holding the same cache
    pub fn with_cache(mut self, cache: GeneratorCache) -> Self {
        self.cache = cache;
        self
    }

    /// Generator cache shared by every request of this engine
    pub fn cache(&self) -> &GeneratorCache {
        &self.cache
    }

    /// Complete the buffer at the cursor within the request deadline
    ///
    /// # Arguments
    /// * `buffer` - Full command line
    /// * `cursor` - Cursor byte offset
    /// * `shell` - Working directory and environment
    /// * `cancel` - Signal from the caller that the result is no longer wanted
    ///
    /// # Returns
    /// * `CompletionOutcome` - The response, or why there is none
    pub async fn complete(
        &self,
        buffer: &str,
        cursor: usize,
        shell: &ShellContext,
        cancel: &CancellationToken,
    ) -> CompletionOutcome {
        let deadline = Duration::from_millis(self.config.request_timeout_ms);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => CompletionOutcome::Cancelled,
            response = self.resolve(buffer, cursor, shell) => {
                // Generators may have finished after the caller gave up
                if cancel.is_cancelled() {
                    CompletionOutcome::Cancelled
                } else {
                    CompletionOutcome::Completed(response)
                }
            }
            _ = tokio::time::sleep(deadline) => {
                warn!("Completion timed out after {:?}", deadline);
                CompletionOutcome::TimedOut
            }
        }
    }

    /// Run the completion pipeline without a deadline
    pub async fn resolve(&self, buffer: &str, cursor: usize, shell: &ShellContext) -> CompletionResponse {
        let cursor = cursor.min(buffer.len());
        let aliases = self.alias_map().await;

        // 1. Extract the command under the cursor and expand aliases
        let Some(command) =
            get_command_bounded(buffer, &aliases, Some(cursor), self.config.max_alias_rounds)
        else {
            return CompletionResponse::empty(cursor);
        };
        let token_start = command
            .final_token()
            .map_or(cursor, |token| token.original_node.start);
        let tokens: Vec<String> = command.token_texts().into_iter().map(str::to_string).collect();

        // 2. First word: complete command names
        if command.is_completing_command_name() {
            return self.complete_command_name(&command, token_start).await;
        }

        // 3. Resolve the tokens against the command's spec
        let Some(spec) = self.registry.get(&tokens[0]) else {
            debug!("No completion spec for '{}'", tokens[0]);
            return CompletionResponse {
                search_term: tokens.last().cloned().unwrap_or_default(),
                ..CompletionResponse::empty(token_start)
            };
        };
        let spec = resolve_dynamic(&spec, &tokens);
        let mut result = match parse_tokens(&tokens, &spec) {
            Ok(result) => result,
            Err(e) => {
                debug!("Argument resolution failed: {}", e);
                return CompletionResponse::empty(token_start);
            }
        };

        // A `getQueryTerm` generator narrows the term to the part after its
        // marker; only argument values can be inserted there
        let full_term = result.search_term.clone();
        let query = result
            .current_arg
            .filter(|_| result.suggestion_flags.contains(SuggestionFlags::ARGS))
            .and_then(|arg| arg.generators.iter().find(|g| g.get_query_term.is_some()))
            .map(|g| g.query_term(&result.search_term).to_string())
            .filter(|query| *query != result.search_term);
        if let Some(query) = query {
            result.search_term = query;
            result.suggestion_flags = SuggestionFlags::ARGS;
        }
        let replace_start = search_term_start(buffer, &command, cursor, &result.search_term);

        // 4. Run the current argument's generators
        let mut response = CompletionResponse::empty(replace_start);
        let mut generated = Vec::new();
        if let Some(arg) = result
            .current_arg
            .filter(|_| result.suggestion_flags.contains(SuggestionFlags::ARGS))
        {
            let ctx = GeneratorContext {
                tokens: tokens.clone(),
                search_term: full_term,
                shell: shell.clone(),
                executor: Arc::clone(&self.executor),
                cache: self.cache.clone(),
                script_timeout: Duration::from_millis(self.config.script_timeout_ms),
                debounce: Duration::from_millis(self.config.debounce_ms),
            };
            let slot = slot_key(&tokens, arg);
            let output = self.session.lock().await.generate(&slot, arg, &ctx).await;

            generated = output.suggestions(arg, &ctx.search_term);
            response.files_requested = output.files_requested;
            response.folders_requested = output.folders_requested;
        }

        // 5. Assemble
        response.suggestions = assemble(&result, generated);
        response.search_term = result.search_term;
        response.annotations = result.annotations;
        response
    }

    async fn complete_command_name(&self, command: &Command, replace_start: usize) -> CompletionResponse {
        let prefix = command
            .final_token()
            .map(|token| token.text.clone())
            .unwrap_or_default();

        let mut names: Vec<String> = self.registry.names().into_iter().map(str::to_string).collect();
        if let Some(globals) = &self.globals {
            let globals = globals.get().await;
            names.extend(globals.commands.iter().cloned());
            names.extend(globals.aliases.keys().cloned());
        }
        names.extend(self.aliases.keys().cloned());

        let suggestions = names
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .map(|name| Suggestion::new(name, SuggestionType::Command))
            .collect();

        CompletionResponse {
            suggestions: rank(suggestions, &prefix),
            annotations: vec![Annotation::Subcommand {
                text: prefix.clone(),
            }],
            search_term: prefix,
            ..CompletionResponse::empty(replace_start)
        }
    }

    /// Discovered aliases with the configured ones on top
    async fn alias_map(&self) -> AliasMap {
        let mut aliases = match &self.globals {
            Some(globals) => globals.get().await.aliases.clone(),
            None => AliasMap::new(),
        };
        aliases.extend(self.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        aliases
    }
}

/// Byte offset where `search_term` starts in the buffer.
///
/// The search term is usually the whole final token, but an inline option
/// value (`--message=wi`) or a query term only covers its tail. Falls back to
/// the token start when the typed text does not end with the term, as with
/// escapes inside the word.
fn search_term_start(buffer: &str, command: &Command, cursor: usize, search_term: &str) -> usize {
    let Some(token) = command.final_token() else {
        return cursor;
    };
    let node = &token.original_node;
    let end = node.end.min(buffer.len());
    match buffer.get(node.start..end) {
        Some(typed) if typed.ends_with(search_term) => end - search_term.len(),
        _ => node.start,
    }
}
