//! Argsense - spec-driven shell completion
//!
//! Parses a shell command line, resolves it against Fig-style completion
//! specs and prints the completions for the word under the cursor.
//!
//! # Usage
//!
//! ```bash
//! # Complete a command line
//! argsense complete "git checkout ma"
//!
//! # Inspect how a buffer is parsed
//! argsense tree "ls -la | grep foo"
//! argsense tokens --alias gco="git checkout" "gco ma"
//! ```

use argsense::cli::CliInterface;
use argsense::error::Result;
use tracing::Level;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Run the subcommand
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    cli.run().await
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so completion output on stdout stays clean.
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
