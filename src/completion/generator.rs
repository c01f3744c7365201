//! Generator execution
//!
//! Runs the generators of the argument under the cursor. Every generator is
//! isolated: a failure or timeout is logged and contributes nothing, without
//! affecting its siblings or the request.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

use super::cache::{CacheKey, Fetched, GeneratorCache};
use super::executor::{CommandExecutor, ShellContext};
use super::suggestion::{Suggestion, SuggestionType};
use crate::error::GeneratorError;
use crate::spec::{Arg, Generator, GeneratorKind, Script, Template, Trigger};

/// Everything a generator run needs from the request
#[derive(Clone)]
pub struct GeneratorContext {
    /// Token texts of the command, final token included
    pub tokens: Vec<String>,
    pub search_term: String,
    pub shell: ShellContext,
    pub executor: Arc<dyn CommandExecutor>,
    pub cache: GeneratorCache,
    /// Used when a generator declares no `scriptTimeout`
    pub script_timeout: Duration,
    /// Used when an argument declares `debounce: true`
    pub debounce: Duration,
}

/// Raw output of an argument's generators
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    /// Results per generator index, unfiltered
    pub batches: Vec<(usize, Fetched)>,
    pub files_requested: bool,
    pub folders_requested: bool,
}

impl GeneratorOutput {
    /// Empty output with the template flags of `arg` and its generators
    fn for_templates(arg: &Arg) -> Self {
        let mut output = Self::default();
        output.request_templates(&arg.template);
        for generator in &arg.generators {
            if let GeneratorKind::Template(templates) = generator.kind() {
                output.request_templates(templates);
            }
        }
        output
    }

    fn request_templates(&mut self, templates: &[Template]) {
        for template in templates {
            match template {
                Template::Filepaths => self.files_requested = true,
                Template::Folders => self.folders_requested = true,
                Template::History | Template::Help => {}
            }
        }
    }

    /// Suggestions matching each generator's query term
    pub fn suggestions(&self, arg: &Arg, search_term: &str) -> Vec<Suggestion> {
        self.batches
            .iter()
            .flat_map(|(index, batch)| {
                let query = arg
                    .generators
                    .get(*index)
                    .map_or(search_term, |g| g.query_term(search_term));
                batch
                    .iter()
                    .filter(move |s| s.name.starts_with(query))
                    .cloned()
            })
            .collect()
    }
}

/// Identity of a generator for cache keys
fn scope(generator: &Generator) -> String {
    match generator.kind() {
        GeneratorKind::Custom(custom) => format!("custom@{:p}", Arc::as_ptr(&custom.0)),
        GeneratorKind::Script(script) => script.display(),
        GeneratorKind::Template(_) | GeneratorKind::Empty => String::new(),
    }
}

/// Split script output into suggestions
fn parse_script_output(generator: &Generator, stdout: &str, tokens: &[String]) -> Vec<Suggestion> {
    if let Some(post_process) = &generator.post_process {
        return (post_process.0)(stdout, tokens);
    }

    let separator = generator.split_on.as_deref().unwrap_or("\n");
    stdout
        .split(separator)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Suggestion::new(line, SuggestionType::Arg))
        .collect()
}

async fn run_script(
    script: &Script,
    generator: &Generator,
    tokens: &[String],
    shell: &ShellContext,
    executor: &dyn CommandExecutor,
    limit: Duration,
) -> Result<Vec<Suggestion>, GeneratorError> {
    let (program, args) = script.invocation();
    if program.is_empty() {
        return Err(GeneratorError::Spawn("empty script".to_string()));
    }

    let output = executor.execute(&program, &args, shell, limit).await?;
    if !output.success() && output.stdout.trim().is_empty() {
        return Err(GeneratorError::ScriptFailed {
            command: script.display(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(parse_script_output(generator, &output.stdout, tokens))
}

/// Run one generator to completion, swallowing its failure
async fn fetch(
    generator: Generator,
    tokens: Vec<String>,
    shell: ShellContext,
    executor: Arc<dyn CommandExecutor>,
    limit: Duration,
) -> Vec<Suggestion> {
    let result = match generator.kind() {
        GeneratorKind::Custom(custom) => {
            custom.0.generate(&tokens, Arc::clone(&executor), &shell).await
        }
        GeneratorKind::Script(script) => {
            run_script(script, &generator, &tokens, &shell, executor.as_ref(), limit).await
        }
        GeneratorKind::Template(_) | GeneratorKind::Empty => Ok(Vec::new()),
    };

    result.unwrap_or_else(|e| {
        warn!("Generator '{}' failed: {}", scope(&generator), e);
        Vec::new()
    })
}

async fn run_generator(generator: &Generator, ctx: &GeneratorContext) -> Option<Fetched> {
    if matches!(
        generator.kind(),
        GeneratorKind::Template(_) | GeneratorKind::Empty
    ) {
        return None;
    }

    let limit = generator
        .script_timeout
        .map_or(ctx.script_timeout, Duration::from_millis);
    let fut = fetch(
        generator.clone(),
        ctx.tokens.clone(),
        ctx.shell.clone(),
        Arc::clone(&ctx.executor),
        limit,
    );

    Some(match &generator.cache {
        Some(cache) => {
            let key = CacheKey::new(cache, scope(generator), &ctx.tokens, &ctx.shell.cwd);
            ctx.cache.get_or_fetch(key, cache, move || fut).await
        }
        None => Arc::new(fut.await),
    })
}

/// Run every generator of `arg` concurrently.
///
/// Templates, on the argument or on a generator, only raise the
/// `files_requested`/`folders_requested` flags; listing the filesystem is
/// left to the caller.
///
/// # Arguments
/// * `arg` - Argument under the cursor
/// * `ctx` - Request context
pub async fn run_generators(arg: &Arg, ctx: &GeneratorContext) -> GeneratorOutput {
    if let Some(delay) = arg.debounce.interval(ctx.debounce) {
        tokio::time::sleep(delay).await;
    }

    let mut output = GeneratorOutput::for_templates(arg);
    let runs = arg.generators.iter().map(|g| run_generator(g, ctx));
    output.batches = join_all(runs)
        .await
        .into_iter()
        .enumerate()
        .filter_map(|(index, batch)| batch.map(|b| (index, b)))
        .collect();
    output
}

/// Last run of one generator
#[derive(Debug, Clone, Default)]
struct GeneratorRun {
    /// Search term the batch was produced for
    search_term: String,
    batch: Option<Fetched>,
}

/// Remembers the last run of each generator so keystrokes that do not cross
/// its trigger boundary reuse it
#[derive(Debug, Default)]
pub struct GeneratorSession {
    slot: Option<String>,
    /// One per generator of the argument in `slot`
    runs: Vec<GeneratorRun>,
}

impl GeneratorSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_current(&self, slot: &str, arg: &Arg) -> bool {
        self.slot.as_deref() == Some(slot) && self.runs.len() == arg.generators.len()
    }

    /// Indices of the generators of `arg` that have to run again
    pub fn stale_generators(&self, slot: &str, arg: &Arg, search_term: &str) -> Vec<usize> {
        if !self.is_current(slot, arg) || arg.debounce.is_enabled() {
            return (0..arg.generators.len()).collect();
        }
        arg.generators
            .iter()
            .zip(&self.runs)
            .enumerate()
            .filter(|(_, (generator, run))| {
                generator
                    .trigger
                    .as_ref()
                    .unwrap_or(&Trigger::Change)
                    .fires(&run.search_term, search_term)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Run the generators of `arg` whose last run can not be reused
    ///
    /// The session only changes once every run has finished, so a request
    /// dropped half-way leaves the previous runs in place.
    ///
    /// # Arguments
    /// * `slot` - Identity of the argument slot, stable across keystrokes
    /// * `arg` - Argument under the cursor
    /// * `ctx` - Request context
    pub async fn generate(&mut self, slot: &str, arg: &Arg, ctx: &GeneratorContext) -> GeneratorOutput {
        let stale = self.stale_generators(slot, arg, &ctx.search_term);
        if !stale.is_empty() {
            if let Some(delay) = arg.debounce.interval(ctx.debounce) {
                tokio::time::sleep(delay).await;
            }
        }
        trace!(
            "Running {} of {} generators for {}",
            stale.len(),
            arg.generators.len(),
            slot
        );
        let fresh = join_all(stale.iter().map(|&index| run_generator(&arg.generators[index], ctx))).await;

        if !self.is_current(slot, arg) {
            self.slot = Some(slot.to_string());
            self.runs = vec![GeneratorRun::default(); arg.generators.len()];
        }
        for (index, batch) in stale.into_iter().zip(fresh) {
            self.runs[index] = GeneratorRun {
                search_term: ctx.search_term.clone(),
                batch,
            };
        }

        let mut output = GeneratorOutput::for_templates(arg);
        output.batches = self
            .runs
            .iter()
            .enumerate()
            .filter_map(|(index, run)| run.batch.clone().map(|batch| (index, batch)))
            .collect();
        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stable identity of the argument slot being completed
pub fn slot_key(tokens: &[String], arg: &Arg) -> String {
    let preceding = tokens.split_last().map_or(&[][..], |(_, rest)| rest);
    format!(
        "{}\u{1f}{}",
        preceding.join("\u{1f}"),
        arg.name.as_deref().unwrap_or_default()
    )
}
