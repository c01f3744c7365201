//! Shell completion generation for argsense
//!
//! Produces the clap completion script for the `argsense` binary itself. The
//! bash script also carries a default completion hook that routes every
//! command line through `argsense complete`.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::Write;

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

/// Generate shell completion script
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish)
/// * `out` - Where the script is written
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion<W: Write>(shell_name: &str, out: &mut W) -> Result<()> {
    let shell = parse_shell(shell_name)?;

    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, "argsense", &mut buffer);
    out.write_all(&buffer)?;

    if shell == Shell::Bash {
        out.write_all(BASH_HOOK.as_bytes())?;
    }
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ConfigError::InvalidValue {
            field: "shell".to_string(),
            value: shell_name.to_string(),
        }
        .into()),
    }
}

const BASH_HOOK: &str = r#"
# Spec-driven completion for any command line
_argsense_line() {
    local line="${COMP_LINE:0:$COMP_POINT}"
    local IFS=$'\n'
    COMPREPLY=($(argsense complete --names-only -- "$line" 2>/dev/null))
    [[ ${#COMPREPLY[@]} -eq 0 ]] && compopt -o default 2>/dev/null
    return 0
}

# Enable with: complete -D -F _argsense_line
"#;
