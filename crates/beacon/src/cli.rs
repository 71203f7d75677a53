//! Command-line interface handling for the beacon server.
//!
//! Every flag is optional and overrides the matching value from the
//! configuration file.

use clap::{Arg, ArgAction, ArgMatches, Command};
use socket_server::TransportKind;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    pub transport: Option<TransportKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Message to broadcast; an empty string disables auto-start
    pub message: Option<String>,
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to skip the stdin control console
    pub no_console: bool,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        command().try_get_matches_from(args).map(|m| Self::from_matches(&m))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("beacon.toml")),
            transport: matches.get_one::<TransportKind>("transport").copied(),
            host: matches.get_one::<String>("host").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            message: matches.get_one::<String>("message").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            no_console: matches.get_flag("no-console"),
        }
    }
}

fn command() -> Command {
    Command::new("beacon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runtime-reconfigurable stream/datagram broadcast server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("beacon.toml"),
        )
        .arg(
            Arg::new("transport")
                .short('t')
                .long("transport")
                .value_name("KIND")
                .help("Transport to serve (stream or datagram)")
                .value_parser(|s: &str| s.parse::<TransportKind>()),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("IP")
                .help("Literal IP address to bind (e.g., 127.0.0.1)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to bind; 0 picks a free port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("message")
                .short('m')
                .long("message")
                .value_name("TEXT")
                .help("Message to broadcast; the server starts on launch when set"),
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
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-console")
                .long("no-console")
                .help("Do not read control commands from stdin")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["beacon"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("beacon.toml"));
        assert_eq!(args.transport, None);
        assert_eq!(args.port, None);
        assert!(!args.json_logs);
        assert!(!args.no_console);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "beacon",
            "--config",
            "custom.toml",
            "--transport",
            "udp",
            "--host",
            "0.0.0.0",
            "--port",
            "9100",
            "--message",
            "hello",
            "--json-logs",
            "--no-console",
        ])
        .unwrap();

        assert_eq!(args.config_path, PathBuf::from("custom.toml"));
        assert_eq!(args.transport, Some(TransportKind::Datagram));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.message.as_deref(), Some("hello"));
        assert!(args.json_logs);
        assert!(args.no_console);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CliArgs::try_parse_from(["beacon", "--port", "70000"]).is_err());
        assert!(CliArgs::try_parse_from(["beacon", "--transport", "smoke"]).is_err());
    }
}
