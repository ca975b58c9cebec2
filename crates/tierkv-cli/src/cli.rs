use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tierkv",
    about = "Tiered string key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Scope to operate on (overrides the configuration)
    #[arg(short, long, global = true)]
    pub scope: Option<String>,

    /// Base directory for the directory tier (overrides the configuration)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the value stored under a key
    Get(KeyArgs),
    /// Store a value under a key in every tier
    Set(SetArgs),
    /// Remove a key from every tier
    Delete(KeyArgs),
    /// Remove every key in the scope from every tier
    Clear,
    /// List keys held by any tier
    Keys,
    /// List assembled tiers by priority
    Tiers,
    /// Show how a key is held across tiers
    Inspect(KeyArgs),
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["tierkv", "get", "theme"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.key, "theme");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_set() {
        let cli = Cli::try_parse_from(["tierkv", "set", "theme", "dark"]).unwrap();
        if let Command::Set(args) = cli.command {
            assert_eq!(args.key, "theme");
            assert_eq!(args.value, "dark");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "tierkv", "keys", "--scope", "app", "--dir", "/tmp/kv", "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Keys));
        assert_eq!(cli.scope.as_deref(), Some("app"));
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/kv")));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config_file() {
        let cli = Cli::try_parse_from(["tierkv", "--config", "kv.toml", "tiers"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("kv.toml")));
        assert!(matches!(cli.command, Command::Tiers));
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["tierkv", "--format", "json", "inspect", "k"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(matches!(cli.command, Command::Inspect(_)));
    }

    #[test]
    fn set_requires_value() {
        assert!(Cli::try_parse_from(["tierkv", "set", "k"]).is_err());
    }
}
