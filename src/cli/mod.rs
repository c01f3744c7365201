//! Command-line interface for argsense
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading with file, environment and flag layers
//! - Building a completion engine from the spec directory
//! - Dispatching the subcommands

pub mod completion;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::completion::{
    CompletionEngine, CompletionOutcome, CompletionResponse, ProcessExecutor, ShellContext,
    ShellGlobalsCache, ShellIntrospection,
};
use crate::config::{Config, LogLevel};
use crate::error::Result;
use crate::parser::{self, AliasMap};
use crate::spec::SpecRegistry;
use crate::utils::{fs, string, time};

/// Shell completion engine driven by completion specs
#[derive(Parser, Debug)]
#[command(
    name = "argsense",
    version,
    about = "Spec-driven shell completion engine",
    long_about = "Parses a shell command line, resolves it against Fig-style completion specs
and prints the completions for the word under the cursor."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Directory of *.json completion specs
    #[arg(long, value_name = "DIR", global = true)]
    pub spec_dir: Option<PathBuf>,

    /// Extra alias, may be repeated
    #[arg(long = "alias", value_name = "NAME=VALUE", value_parser = string::parse_key_value, global = true)]
    pub aliases: Vec<(String, String)>,

    /// Working directory generators run in
    #[arg(long, value_name = "DIR", global = true)]
    pub cwd: Option<PathBuf>,

    /// Skip discovering commands and aliases from the shell
    #[arg(long, global = true)]
    pub no_introspection: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for argsense
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Complete a command line
    Complete {
        /// Command line to complete
        #[arg(value_name = "BUFFER")]
        buffer: String,

        /// Cursor byte offset (defaults to the end of the buffer)
        #[arg(long, value_name = "OFFSET")]
        cursor: Option<usize>,

        /// Print the full response as JSON
        #[arg(long, conflicts_with = "names_only")]
        json: bool,

        /// Print suggestion names only, one per line
        #[arg(long)]
        names_only: bool,
    },

    /// Print the syntax tree of a command line as JSON
    Tree {
        #[arg(value_name = "BUFFER")]
        buffer: String,
    },

    /// Print the tokens of the command under the cursor as JSON
    Tokens {
        #[arg(value_name = "BUFFER")]
        buffer: String,

        /// Cursor byte offset (defaults to the end of the buffer)
        #[arg(long, value_name = "OFFSET")]
        cursor: Option<usize>,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show version information
    Version,
}

/// Token as printed by `argsense tokens`
#[derive(Debug, Serialize)]
struct TokenView<'a> {
    text: &'a str,
    start: usize,
    end: usize,
    original_start: usize,
    original_end: usize,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration and layer environment and arguments on top
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Effective configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env()?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Override configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(dir) = &args.spec_dir {
            config.specs.directory = dir.clone();
        }

        config
            .aliases
            .extend(args.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else {
            config.logging.level
        };
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Run the selected subcommand
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Complete {
                buffer,
                cursor,
                json,
                names_only,
            } => self.complete(buffer, *cursor, *json, *names_only).await,
            Commands::Tree { buffer } => {
                println!("{}", render_tree(buffer)?);
                Ok(())
            }
            Commands::Tokens { buffer, cursor } => {
                println!("{}", render_tokens(buffer, *cursor, &self.config.alias_map())?);
                Ok(())
            }
            Commands::Config { show, validate } => self.handle_config_command(*show, *validate),
            Commands::Completion { shell } => {
                completion::generate_completion(shell, &mut std::io::stdout())
            }
            Commands::Version => {
                self.show_version();
                Ok(())
            }
        }
    }

    /// Complete a buffer and print the suggestions
    async fn complete(
        &self,
        buffer: &str,
        cursor: Option<usize>,
        json: bool,
        names_only: bool,
    ) -> Result<()> {
        let engine = self.build_engine().await?;
        let shell = self.shell_context();
        let cursor = cursor.unwrap_or(buffer.len());

        // Ctrl+C cancels the request
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let ctrl_c_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });

        let started = Instant::now();
        let outcome = engine.complete(buffer, cursor, &shell, &cancel).await;
        ctrl_c_handle.abort();
        debug!("Completion finished in {}", time::format_duration(started.elapsed()));

        match &outcome {
            CompletionOutcome::TimedOut => warn!("No completions: request timed out"),
            CompletionOutcome::Cancelled => warn!("No completions: request cancelled"),
            CompletionOutcome::Completed(_) => {}
        }
        let response = outcome.into_response();

        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print!("{}", render_suggestions(&response, names_only));
        }
        Ok(())
    }

    /// Build an engine over the configured spec directory
    async fn build_engine(&self) -> Result<CompletionEngine> {
        let mut registry = SpecRegistry::new();
        let dir = fs::expand_home(&self.config.specs.directory);
        if dir.is_dir() {
            registry.load_dir(&dir)?;
        } else {
            warn!("Spec directory {} does not exist", dir.display());
        }

        let executor = Arc::new(ProcessExecutor);
        let mut engine = CompletionEngine::new(
            Arc::new(registry),
            executor.clone(),
            self.config.engine.clone(),
        )
        .with_aliases(self.config.alias_map());

        if !self.args.no_introspection {
            let provider = ShellIntrospection::new(
                executor,
                self.shell_context(),
                self.config.introspection_timeout(),
            );
            let globals =
                ShellGlobalsCache::new(Arc::new(provider), self.config.introspection_timeout());
            // Discover up front so the request deadline covers completion only
            globals.refresh().await;
            engine = engine.with_globals(globals);
        }

        Ok(engine)
    }

    fn shell_context(&self) -> ShellContext {
        let context = ShellContext::from_process();
        match &self.args.cwd {
            Some(cwd) => context.with_cwd(cwd),
            None => context,
        }
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist");
            return;
        }

        match Config::load_from_file(Some(path.as_path())) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("# Configuration file: {}", self.get_config_path().display());
        println!();
        let rendered = toml::to_string_pretty(&self.config)
            .map_err(|e| crate::error::ConfigError::InvalidFormat(e.to_string()))?;
        println!("{}", rendered);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Show version information
    fn show_version(&self) {
        println!("argsense version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }
}

/// Syntax tree of `buffer` as pretty JSON
fn render_tree(buffer: &str) -> Result<String> {
    Ok(serde_json::to_string_pretty(&parser::parse(buffer))?)
}

/// Tokens of the command under the cursor as pretty JSON
fn render_tokens(buffer: &str, cursor: Option<usize>, aliases: &AliasMap) -> Result<String> {
    let Some(command) = parser::get_command(buffer, aliases, cursor) else {
        return Ok("[]".to_string());
    };
    let tokens: Vec<TokenView<'_>> = command
        .tokens
        .iter()
        .map(|token| TokenView {
            text: &token.text,
            start: token.node.start,
            end: token.node.end,
            original_start: token.original_node.start,
            original_end: token.original_node.end,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&tokens)?)
}

/// One suggestion per line, with a tab-separated description unless `names_only`
fn render_suggestions(response: &CompletionResponse, names_only: bool) -> String {
    let mut out = String::new();
    for suggestion in &response.suggestions {
        out.push_str(&suggestion.name);
        if let Some(description) = suggestion.description.as_deref().filter(|_| !names_only) {
            out.push('\t');
            out.push_str(&string::truncate(description, 60));
        }
        out.push('\n');
    }
    out
}
