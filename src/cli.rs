//! Command-line interface
//!
//! Flags are layered over the config file. Overrides given without a
//! duration take the default in effect at their position on the command
//! line, so `-k n -d 60 -k j` gives `n` the old default and `j` 60 ms.
//! `-d` may be given more than once.

use crate::config::{Config, ConfigError, KeyOverride, KeySpecError};
use crate::debounce::DebouncePolicy;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Keyboard Debounce - suppress double-typed key presses
#[derive(Parser, Debug, Clone)]
#[command(name = "keyboard-debounce")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Debounce every key, not only the ones given with --key
    #[arg(short = 'a', long = "all")]
    pub all_keys: bool,

    /// Default release-to-press window in milliseconds (default: 40).
    /// May be repeated; each applies to the keys that follow it
    #[arg(short = 'd', long = "duration", value_name = "MS", action = ArgAction::Append)]
    pub duration_ms: Vec<u64>,

    /// Key to debounce, optionally with its own window, e.g. `n` or `j:60`
    #[arg(short = 'k', long = "key", value_name = "NAME[:MS]", value_parser = parse_key_override)]
    pub keys: Vec<KeyOverride>,

    /// Read settings from this config file instead of the default one
    #[arg(short = 'c', long = "config", value_name = "PATH", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore the default config file
    #[arg(long)]
    pub no_config: bool,

    /// Write the resolved settings to a config file and exit
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,

    /// Print the known key names and exit
    #[arg(long)]
    pub list_keys: bool,

    /// Write a JSON session report here on exit
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Do not print a line for each suppressed press
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

fn parse_key_override(s: &str) -> Result<KeyOverride, KeySpecError> {
    s.parse()
}

/// Error type for turning arguments into an action
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Neither --all nor any key was configured
    #[error("nothing to debounce: pass --all or at least one --key\n\n{0}")]
    Empty(String),
}

/// Parsed arguments plus where the order-sensitive ones appeared
#[derive(Debug, Clone)]
pub struct ParsedArgs {
    pub cli: Cli,
    key_positions: Vec<usize>,
    duration_positions: Vec<usize>,
}

/// What the binary should do
#[derive(Debug)]
pub enum Action {
    ListKeys,
    WriteConfig { path: PathBuf, config: Config },
    Run(RunSettings),
}

/// Everything needed to start intercepting
#[derive(Debug)]
pub struct RunSettings {
    pub policy: DebouncePolicy,
    pub print_drops: bool,
    pub report: Option<PathBuf>,
}

/// Parse process arguments. Help and version requests come back as errors
/// of the matching clap kind.
pub fn parse_args<I, T>(args: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    let positions = |id: &str| -> Vec<usize> {
        matches
            .indices_of(id)
            .map(|indices| indices.collect())
            .unwrap_or_default()
    };
    let key_positions = positions("keys");
    let duration_positions = positions("duration_ms");

    Ok(ParsedArgs {
        cli,
        key_positions,
        duration_positions,
    })
}

/// Usage line for error messages
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

impl ParsedArgs {
    /// Load the config file these arguments point at
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        if self.cli.no_config {
            return Ok(Config::default());
        }
        match &self.cli.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }

    /// Combine the config file with the flags, replaying overrides in order
    pub fn resolve_policy(&self, file: &Config) -> Result<DebouncePolicy, ConfigError> {
        let mut builder = file.policy_builder()?;
        if self.cli.all_keys {
            builder.apply_to_all(true);
        }

        let mut defaults = self
            .cli
            .duration_ms
            .iter()
            .zip(&self.duration_positions)
            .map(|(ms, at)| (*at, Duration::from_millis(*ms)))
            .peekable();

        for (entry, position) in self.cli.keys.iter().zip(&self.key_positions) {
            while let Some((_, duration)) = defaults.next_if(|(at, _)| at < position) {
                builder.set_default(duration);
            }
            builder.add_key(entry.key, entry.duration);
        }
        for (_, duration) in defaults {
            builder.set_default(duration);
        }

        Ok(builder.build())
    }

    /// Decide what to do
    pub fn into_action(self) -> Result<Action, CliError> {
        if self.cli.list_keys {
            return Ok(Action::ListKeys);
        }

        let file = self.load_config()?;
        let policy = self.resolve_policy(&file)?;
        let print_drops = file.output.log_drops && !self.cli.quiet;

        if let Some(path) = self.cli.write_config {
            let config = Config::from_policy(&policy, file.output.log_drops)?;
            return Ok(Action::WriteConfig { path, config });
        }

        if policy.is_empty() {
            return Err(CliError::Empty(usage()));
        }

        Ok(Action::Run(RunSettings {
            policy,
            print_drops,
            report: self.cli.report,
        }))
    }
}
