//! Command-line argument parsing.
//!
//! Flags override the environment: `--url`, `--conversation`,
//! `--data-dir`, `--files-root`, `--auto-approve`.

use std::path::PathBuf;

use crate::config::SessionConfig;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Run a session (default)
    Run(RunOptions),
}

/// Overrides collected from flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub url: Option<String>,
    pub conversation_id: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub files_root: Option<PathBuf>,
    pub auto_approve: bool,
}

impl RunOptions {
    pub fn apply(self, mut config: SessionConfig) -> SessionConfig {
        if let Some(url) = self.url {
            config = config.with_url(url);
        }
        if let Some(id) = self.conversation_id {
            config = config.with_conversation_id(id);
        }
        if let Some(dir) = self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(root) = self.files_root {
            config = config.with_files_root(root);
        }
        if self.auto_approve {
            config = config.with_auto_approve(true);
        }
        config
    }
}

/// Parse command-line arguments (program name first).
///
/// ```
/// use tether::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["tether".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), Ok(CliCommand::Version));
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, String>
where
    I: Iterator<Item = String>,
{
    let mut options = RunOptions::default();
    let mut args = args.skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(CliCommand::Version),
            "--auto-approve" => options.auto_approve = true,
            "--url" => options.url = Some(value_for(&arg, args.next())?),
            "--conversation" | "-c" => options.conversation_id = Some(value_for(&arg, args.next())?),
            "--data-dir" => options.data_dir = Some(value_for(&arg, args.next())?.into()),
            "--files-root" => options.files_root = Some(value_for(&arg, args.next())?.into()),
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(CliCommand::Run(options))
}

fn value_for(flag: &str, value: Option<String>) -> Result<String, String> {
    value
        .filter(|v| !v.starts_with("--"))
        .ok_or_else(|| format!("{} needs a value", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("tether".to_string())
            .chain(list.iter().map(|s| s.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_parse_version_flag() {
        assert_eq!(parse_args(args(&["-V"])), Ok(CliCommand::Version));
        assert_eq!(parse_args(args(&["--url", "x", "--version"])), Ok(CliCommand::Version));
    }

    #[test]
    fn test_parse_no_args_runs() {
        assert_eq!(
            parse_args(args(&[])),
            Ok(CliCommand::Run(RunOptions::default()))
        );
    }

    #[test]
    fn test_parse_run_options() {
        let command = parse_args(args(&[
            "--url",
            "wss://chat.example.com",
            "-c",
            "conv-1",
            "--auto-approve",
        ]))
        .unwrap();
        let CliCommand::Run(options) = command else {
            panic!("expected run");
        };
        assert_eq!(options.url.as_deref(), Some("wss://chat.example.com"));
        assert_eq!(options.conversation_id.as_deref(), Some("conv-1"));
        assert!(options.auto_approve);

        let config = options.apply(SessionConfig::default());
        assert_eq!(config.url, "wss://chat.example.com");
        assert!(config.auto_approve);
    }

    #[test]
    fn test_missing_value_and_unknown_flag() {
        assert!(parse_args(args(&["--url"])).is_err());
        assert!(parse_args(args(&["--url", "--auto-approve"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }
}
