//! Runtime configuration for a burrow session.
//!
//! The CLI resolves flags, environment variables and trailing arguments into a
//! single [`Config`] value that every component receives by reference.

/// Default host traffic is forwarded to.
pub const DEFAULT_HOST: &str = "localhost";
/// Default scheme used for forwarding.
pub const DEFAULT_SCHEME: &str = "http";
/// Default tunnel server.
pub const DEFAULT_SERVER_BASE_URL: &str = "https://localtunnel.me";

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host where tunnel traffic is forwarded to.
    pub host: String,
    /// Local port where tunnel traffic is forwarded to.
    pub port: u16,
    /// Scheme used when forwarding.
    pub scheme: String,
    /// Base URL of the tunnel server.
    pub server_base_url: String,
    /// Whether the working directory is watched for changes.
    pub watch: bool,
    /// Whether to run without the terminal dashboard.
    pub standalone: bool,
    /// The command to execute and supervise.
    pub command: Vec<String>,
}

impl Config {
    /// Returns the `host:port` pair traffic is forwarded to.
    pub fn host_with_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the full URL traffic is forwarded to.
    pub fn listen_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host_with_port())
    }
}
