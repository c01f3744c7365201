//! Utility functions and helpers for argsense
//!
//! This module provides small helpers shared by the binary and the config layer:
//! - String parsing and display
//! - Duration formatting
//! - Path expansion

use std::path::{Path, PathBuf};
use std::time::Duration;

/// String utilities
pub mod string {
    /// Truncate string to a maximum number of characters
    ///
    /// # Arguments
    /// * `s` - String to truncate
    /// * `max_chars` - Maximum length in characters
    ///
    /// # Returns
    /// * `String` - Truncated string with ellipsis if needed
    pub fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            return s.to_string();
        }
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }

    /// Parse a `key=value` pair, as given to `--alias`
    ///
    /// # Returns
    /// * `Result<(String, String), String>` - The pair, or a message for clap
    pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(format!("invalid alias name '{}'", key));
        }
        Ok((key.to_string(), value.to_string()))
    }
}

/// Time utilities
pub mod time {
    use super::*;

    /// Format duration as human-readable string
    ///
    /// Sub-second durations keep millisecond precision since completion
    /// latencies live there.
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();

        if secs == 0 {
            return format!("{}ms", millis);
        }

        let minutes = secs / 60;
        let seconds = secs % 60;
        if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, millis)
        }
    }
}

/// File system utilities
pub mod fs {
    use super::*;

    /// Expand a leading `~` to the home directory
    ///
    /// # Arguments
    /// * `path` - Path potentially starting with `~`
    ///
    /// # Returns
    /// * `PathBuf` - Expanded path; unchanged when there is no home directory
    pub fn expand_home(path: &Path) -> PathBuf {
        let Ok(rest) = path.strip_prefix("~") else {
            return path.to_path_buf();
        };
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(string::truncate("hello", 10), "hello");
        assert_eq!(string::truncate("hello world", 8), "hello...");
        assert_eq!(string::truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            string::parse_key_value("gco=git checkout"),
            Ok(("gco".to_string(), "git checkout".to_string()))
        );
        assert_eq!(
            string::parse_key_value("x=a=b"),
            Ok(("x".to_string(), "a=b".to_string()))
        );
        assert!(string::parse_key_value("novalue").is_err());
        assert!(string::parse_key_value("=ls").is_err());
        assert!(string::parse_key_value("g co=git").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(time::format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(time::format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(time::format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(time::format_duration(Duration::from_secs(90)), "1m 30s");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(fs::expand_home(Path::new("/etc/specs")), PathBuf::from("/etc/specs"));
        assert_eq!(fs::expand_home(Path::new("specs")), PathBuf::from("specs"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(fs::expand_home(Path::new("~/specs")), home.join("specs"));
            assert_eq!(fs::expand_home(Path::new("~")), home);
        }
    }
}
