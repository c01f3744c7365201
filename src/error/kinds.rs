use std::{fmt, io};

/// Crate-wide `Result` type using [`ArgsenseError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ArgsenseError>;

/// Top-level error type for argsense operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ArgsenseError {
    /// Command extraction and alias substitution errors.
    Command(CommandError),

    /// Argument resolution errors surfaced to callers.
    Resolve(ResolveError),

    /// Completion spec loading errors.
    Spec(SpecError),

    /// Generator execution errors.
    Generator(GeneratorError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Errors raised while turning syntax nodes into commands and tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Tokens were requested from a node that is not a `Command`.
    NotACommand { kind: String },

    /// The referenced token is not part of the command.
    TokenNotFound(String),

    /// Substituting the alias did not produce exactly one command.
    InvalidAlias(String),

    /// Token realignment after substitution went out of step.
    TokenMismatch { expected: usize, found: usize },
}

/// Errors surfaced by the argument resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Resolution was requested for a command without tokens.
    EmptyCommand,

    /// No completion spec is registered for the command.
    SpecNotFound(String),
}

/// Completion spec loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Spec not found by name.
    NotFound(String),

    /// Spec file could not be decoded.
    InvalidFormat(String),

    /// `loadSpec` references nested deeper than allowed.
    RecursionLimit(String),
}

/// Generator execution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// The process could not be started.
    Spawn(String),

    /// The process did not finish in time.
    Timeout { command: String, timeout_ms: u64 },

    /// The process exited unsuccessfully.
    ScriptFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A custom generator callback failed.
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ArgsenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsenseError::Command(e) => write!(f, "Command error: {e}"),
            ArgsenseError::Resolve(e) => write!(f, "{e}"),
            ArgsenseError::Spec(e) => write!(f, "Spec error: {e}"),
            ArgsenseError::Generator(e) => write!(f, "Generator error: {e}"),
            ArgsenseError::Config(e) => write!(f, "Configuration error: {e}"),
            ArgsenseError::Io(e) => write!(f, "I/O error: {e}"),
            ArgsenseError::Json(e) => write!(f, "JSON error: {e}"),
            ArgsenseError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NotACommand { kind } => {
                write!(f, "Cannot extract tokens from a {kind} node")
            }
            CommandError::TokenNotFound(text) => write!(f, "Token not in command: {text}"),
            CommandError::InvalidAlias(name) => write!(f, "Invalid alias: {name}"),
            CommandError::TokenMismatch { expected, found } => {
                write!(f, "Token count mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::EmptyCommand => write!(f, "Cannot resolve arguments of an empty command"),
            ResolveError::SpecNotFound(name) => write!(f, "No completion spec for '{name}'"),
        }
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::NotFound(name) => write!(f, "Spec not found: {name}"),
            SpecError::InvalidFormat(msg) => write!(f, "Invalid spec format: {msg}"),
            SpecError::RecursionLimit(name) => {
                write!(f, "Spec '{name}' exceeds the loadSpec nesting limit")
            }
        }
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Spawn(msg) => write!(f, "Failed to spawn: {msg}"),
            GeneratorError::Timeout {
                command,
                timeout_ms,
            } => write!(f, "'{command}' timed out after {timeout_ms}ms"),
            GeneratorError::ScriptFailed {
                command,
                code,
                stderr,
            } => match code {
                Some(code) => write!(f, "'{command}' exited with {code}: {stderr}"),
                None => write!(f, "'{command}' was terminated: {stderr}"),
            },
            GeneratorError::Custom(msg) => write!(f, "Custom generator failed: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ArgsenseError {}
impl std::error::Error for CommandError {}
impl std::error::Error for ResolveError {}
impl std::error::Error for SpecError {}
impl std::error::Error for GeneratorError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ArgsenseError ========================= */

impl From<io::Error> for ArgsenseError {
    fn from(err: io::Error) -> Self {
        ArgsenseError::Io(err)
    }
}

impl From<serde_json::Error> for ArgsenseError {
    fn from(err: serde_json::Error) -> Self {
        ArgsenseError::Json(err)
    }
}

impl From<CommandError> for ArgsenseError {
    fn from(err: CommandError) -> Self {
        ArgsenseError::Command(err)
    }
}

impl From<ResolveError> for ArgsenseError {
    fn from(err: ResolveError) -> Self {
        ArgsenseError::Resolve(err)
    }
}

impl From<SpecError> for ArgsenseError {
    fn from(err: SpecError) -> Self {
        ArgsenseError::Spec(err)
    }
}

impl From<GeneratorError> for ArgsenseError {
    fn from(err: GeneratorError) -> Self {
        ArgsenseError::Generator(err)
    }
}

impl From<ConfigError> for ArgsenseError {
    fn from(err: ConfigError) -> Self {
        ArgsenseError::Config(err)
    }
}

impl From<String> for ArgsenseError {
    fn from(msg: String) -> Self {
        ArgsenseError::Generic(msg)
    }
}

impl From<&str> for ArgsenseError {
    fn from(msg: &str) -> Self {
        ArgsenseError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err: ArgsenseError = CommandError::NotACommand {
            kind: "Pipeline".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Command error: Cannot extract tokens from a Pipeline node"
        );
    }

    #[test]
    fn test_generator_timeout_display() {
        let err = GeneratorError::Timeout {
            command: "git branch".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "'git branch' timed out after 5000ms");
    }

    #[test]
    fn test_resolve_error_passthrough() {
        let err: ArgsenseError = ResolveError::EmptyCommand.into();
        assert_eq!(err.to_string(), "Cannot resolve arguments of an empty command");
    }
}
