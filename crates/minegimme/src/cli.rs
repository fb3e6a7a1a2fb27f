//! Command-line interface for the MineGimme operator console.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments; every option overrides the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Server to attach to
    pub server: Option<String>,
    /// Bearer credential for the channel and the file API
    pub token: Option<String>,
    /// Override for the REST base URL
    pub api_base: Option<String>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl CliArgs {
    fn command() -> Command {
        Command::new("MineGimme Console")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Attach to a MineGimme server: live console, status and files")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("minegimme.toml"),
            )
            .arg(
                Arg::new("server")
                    .short('s')
                    .long("server")
                    .value_name("NAME")
                    .help("Server to attach to"),
            )
            .arg(
                Arg::new("token")
                    .short('t')
                    .long("token")
                    .value_name("TOKEN")
                    .env("MINEGIMME_TOKEN")
                    .hide_env_values(true)
                    .help("Access token"),
            )
            .arg(
                Arg::new("api-base")
                    .long("api-base")
                    .value_name("URL")
                    .help("REST base URL (e.g., http://127.0.0.1:25401/api/v1/servers)"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
    }

    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&Self::command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("minegimme.toml")),
            server: matches.get_one::<String>("server").cloned(),
            token: matches.get_one::<String>("token").cloned(),
            api_base: matches.get_one::<String>("api-base").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}
