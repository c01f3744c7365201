//! Shell globals
//!
//! Commands and aliases available in the user's shell, discovered through a
//! [`GlobalsProvider`] and held by an explicit [`ShellGlobalsCache`].

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::executor::{CommandExecutor, ShellContext};
use crate::error::GeneratorError;
use crate::parser::AliasMap;

/// Discovers what the shell knows about
#[async_trait]
pub trait GlobalsProvider: Send + Sync {
    /// Names of runnable commands
    async fn commands(&self) -> Result<Vec<String>, GeneratorError>;

    /// Alias definitions, values as the shell prints them
    async fn aliases(&self) -> Result<AliasMap, GeneratorError>;
}

/// Snapshot of discovered globals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellGlobals {
    pub commands: Vec<String>,
    pub aliases: AliasMap,
}

/// Cache of the last discovered [`ShellGlobals`]
pub struct ShellGlobalsCache {
    provider: Arc<dyn GlobalsProvider>,
    limit: Duration,
    current: RwLock<Option<Arc<ShellGlobals>>>,
}

impl ShellGlobalsCache {
    /// Create an empty cache; nothing is discovered until first use
    ///
    /// # Arguments
    /// * `provider` - Discovery collaborator
    /// * `limit` - Deadline of each discovery call
    pub fn new(provider: Arc<dyn GlobalsProvider>, limit: Duration) -> Self {
        Self {
            provider,
            limit,
            current: RwLock::new(None),
        }
    }

    /// Run discovery again and replace the snapshot.
    ///
    /// A part that fails or times out keeps its previous value.
    pub async fn refresh(&self) -> Arc<ShellGlobals> {
        let previous = self.cached().unwrap_or_default();
        let (commands, aliases) = tokio::join!(
            timeout(self.limit, self.provider.commands()),
            timeout(self.limit, self.provider.aliases()),
        );

        let commands = match commands {
            Ok(Ok(mut commands)) => {
                commands.sort_unstable();
                commands.dedup();
                commands
            }
            Ok(Err(e)) => {
                warn!("Command discovery failed: {}", e);
                previous.commands.clone()
            }
            Err(_) => {
                warn!("Command discovery timed out after {:?}", self.limit);
                previous.commands.clone()
            }
        };
        let aliases = match aliases {
            Ok(Ok(aliases)) => aliases,
            Ok(Err(e)) => {
                warn!("Alias discovery failed: {}", e);
                previous.aliases.clone()
            }
            Err(_) => {
                warn!("Alias discovery timed out after {:?}", self.limit);
                previous.aliases.clone()
            }
        };

        debug!(
            "Discovered {} commands and {} aliases",
            commands.len(),
            aliases.len()
        );
        let globals = Arc::new(ShellGlobals { commands, aliases });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&globals));
        globals
    }

    /// Current snapshot, discovering on first use
    pub async fn get(&self) -> Arc<ShellGlobals> {
        match self.cached() {
            Some(globals) => globals,
            None => self.refresh().await,
        }
    }

    /// Forget the snapshot
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn cached(&self) -> Option<Arc<ShellGlobals>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Shell family, deciding how globals are listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFamily {
    Bash,
    Zsh,
    Fish,
}

impl ShellFamily {
    /// Family of the named shell. Anything without its own listing
    /// commands, `sh` and `dash` included, is asked through bash.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.rsplit('/').next().unwrap_or(n)) {
            Some("zsh") => ShellFamily::Zsh,
            Some("fish") => ShellFamily::Fish,
            _ => ShellFamily::Bash,
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            ShellFamily::Bash => "bash",
            ShellFamily::Zsh => "zsh",
            ShellFamily::Fish => "fish",
        }
    }

    fn commands_args(self) -> &'static [&'static str] {
        match self {
            ShellFamily::Bash => &["-c", "compgen -c"],
            ShellFamily::Zsh => &[
                "-c",
                "print -rl -- ${(k)commands} ${(k)builtins} ${(k)functions}",
            ],
            ShellFamily::Fish => &["-c", "complete -C ''"],
        }
    }
}

/// Discovers globals by asking the user's shell, or bash when that shell
/// has no listing commands
pub struct ShellIntrospection {
    executor: Arc<dyn CommandExecutor>,
    context: ShellContext,
    limit: Duration,
    family: ShellFamily,
}

impl ShellIntrospection {
    pub fn new(executor: Arc<dyn CommandExecutor>, context: ShellContext, limit: Duration) -> Self {
        let family = ShellFamily::from_name(context.shell.as_deref());
        Self {
            executor,
            context,
            limit,
            family,
        }
    }

    pub fn family(&self) -> ShellFamily {
        self.family
    }

    async fn run(&self, args: &[&str]) -> Result<String, GeneratorError> {
        let program = self.family.program();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = self
            .executor
            .execute(program, &args, &self.context, self.limit)
            .await?;
        if !output.success() && output.stdout.is_empty() {
            return Err(GeneratorError::ScriptFailed {
                command: format!("{} {}", program, args.join(" ")),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl GlobalsProvider for ShellIntrospection {
    async fn commands(&self) -> Result<Vec<String>, GeneratorError> {
        let stdout = self.run(self.family.commands_args()).await?;
        // fish appends a tab and a description to each name
        Ok(stdout
            .lines()
            .filter_map(|line| line.split('\t').next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn aliases(&self) -> Result<AliasMap, GeneratorError> {
        let stdout = self.run(&["-ic", "alias"]).await?;
        Ok(parse_alias_listing(&stdout))
    }
}

/// Parse `alias` output: `alias ll='ls -l'` (bash), `ll='ls -l'` (zsh) or
/// `alias ll 'ls -l'` (fish)
pub fn parse_alias_listing(listing: &str) -> AliasMap {
    listing
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line.strip_prefix("alias ").unwrap_or(line);
            let split = line.find(['=', ' '])?;
            let name = line[..split].trim();
            let value = line[split + 1..].trim_start();
            (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}
