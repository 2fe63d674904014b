//! Command-line argument parsing and validation.
//!
//! Every option can also come from a `BURROW_*` environment variable, so a
//! project can pin its port and forwarding settings in an env file and run
//! plain `burrow -- npm start`.

use clap::Parser;

use burrow_core::config::{Config, DEFAULT_HOST, DEFAULT_SCHEME, DEFAULT_SERVER_BASE_URL};
use burrow_core::error::{Error, Result};

/// Command-line arguments for the `burrow` binary.
#[derive(Parser, Debug)]
#[command(
    name = "burrow",
    about = "Run a command and expose its port through a public tunnel URL.",
    term_width = 0 // Just to make testing across clap features easier
)]
pub struct Args {
    /// Local port the command listens on and tunnel traffic is forwarded to.
    ///
    /// Required, either as the first argument or via the environment.
    #[arg(env = "BURROW_PORT")]
    pub port: Option<u16>,

    /// Host tunnel traffic is forwarded to.
    #[arg(long, env = "BURROW_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Scheme used when forwarding tunnel traffic.
    #[arg(long, env = "BURROW_SCHEME", default_value = DEFAULT_SCHEME)]
    pub scheme: String,

    /// Base URL of the tunnel server to request a public URL from.
    #[arg(long, env = "BURROW_SERVER_BASE_URL", default_value = DEFAULT_SERVER_BASE_URL)]
    pub server_base_url: String,

    /// Restart the command whenever files under the working directory change.
    #[arg(long, short = 'w', action)]
    pub watch: bool,

    /// Run without the terminal dashboard, logging to standard streams.
    ///
    /// Useful under process managers; SIGHUP restarts the command and
    /// SIGUSR1/SIGUSR2 print the public URL.
    #[arg(long, action)]
    pub standalone: bool,

    /// The command to run and expose.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args(0..))]
    pub command: Vec<String>,
}

impl Args {
    /// Resolves the parsed arguments into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPort`] when no port was given by argument or
    /// environment.
    pub fn into_config(self) -> Result<Config> {
        let Some(port) = self.port else {
            return Err(Error::MissingPort);
        };
        Ok(Config {
            host: self.host,
            port,
            scheme: self.scheme,
            server_base_url: self.server_base_url,
            watch: self.watch,
            standalone: self.standalone,
            command: self.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_and_command_from_positionals() {
        let args = Args::parse_from(["burrow", "3000", "npm", "start"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.command, vec!["npm", "start"]);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.scheme, DEFAULT_SCHEME);
        assert_eq!(config.server_base_url, DEFAULT_SERVER_BASE_URL);
        assert!(!config.watch);
        assert!(!config.standalone);
    }

    #[test]
    fn test_command_may_carry_its_own_flags() {
        let args = Args::parse_from(["burrow", "8080", "cargo", "run", "--release"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.command, vec!["cargo", "run", "--release"]);
    }

    #[test]
    fn test_missing_port_is_an_error() {
        let args = Args {
            port: None,
            host: DEFAULT_HOST.to_string(),
            scheme: DEFAULT_SCHEME.to_string(),
            server_base_url: DEFAULT_SERVER_BASE_URL.to_string(),
            watch: false,
            standalone: false,
            command: vec!["npm".to_string(), "start".to_string()],
        };
        assert!(matches!(args.into_config(), Err(Error::MissingPort)));
    }

    #[test]
    fn test_forwarding_overrides() {
        let args = Args::parse_from([
            "burrow",
            "--host",
            "127.0.0.1",
            "--scheme",
            "https",
            "--server-base-url",
            "https://tunnel.example.com",
            "-w",
            "3000",
            "npm",
            "start",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.scheme, "https");
        assert_eq!(config.server_base_url, "https://tunnel.example.com");
        assert!(config.watch);
    }

    #[test]
    fn test_command_may_be_omitted() {
        // The program starts without a command; the supervisor reports the
        // empty command in the pane and the operator edits one in.
        let args = Args::parse_from(["burrow", "3000"]);
        let config = args.into_config().unwrap();
        assert!(config.command.is_empty());
    }

    #[test]
    fn test_standalone_flag() {
        let args = Args::parse_from(["burrow", "--standalone", "3000", "npm", "start"]);
        assert!(args.standalone);
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        assert!(Args::try_parse_from(["burrow", "npm", "start"]).is_err());
    }
}
