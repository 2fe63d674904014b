use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No program to run.")]
    EmptyCommand,

    #[error("Port needs to be specified, either by the BURROW_PORT environment variable, or by the first argument to the program.")]
    MissingPort,

    #[error("A process is already running; stop it before starting a new one.")]
    StartOverlap,

    #[error("Error spawning `{}`: {}", .command, .original)]
    Spawn {
        command: String,
        original: std::io::Error,
    },

    #[error("Error waiting for sub process: {}", .0)]
    SubProcess(std::io::Error),

    #[error("IO error: {}", .0)]
    Io(#[from] std::io::Error),

    #[error("Error installing logger: {}", .0)]
    Logger(#[from] log::SetLoggerError),

    #[error("Error watching for changes: {}", .0)]
    Watch(#[from] notify::Error),

    #[error("Invalid server base URL `{}`: {}", .url, .original)]
    BaseUrl {
        url: String,
        original: url::ParseError,
    },

    #[error("Error requesting tunnel from `{}`: {}", .base_url, .original)]
    TunnelRequest {
        base_url: String,
        original: reqwest::Error,
    },

    #[error("Tunnel server returned an unusable lease: {}", .0)]
    TunnelLease(String),

    #[error("Error connecting to tunnel endpoint `{}` after {} attempts: {}", .host, .attempts, .original)]
    TunnelConnect {
        host: String,
        attempts: u32,
        original: std::io::Error,
    },

    #[error("Tunnel worker failed: {}", .0)]
    TunnelWorker(String),

    #[error("Error reading request body: {}", .0)]
    RequestBody(hyper::Error),

    #[error("Error forwarding request upstream: {}", .0)]
    Upstream(reqwest::Error),

    #[error("Error building proxy response: {}", .0)]
    Response(#[from] hyper::http::Error),

    #[error("The {} channel closed unexpectedly.", .0)]
    ChannelClosed(&'static str),
}

impl Error {
    pub fn spawn_error(command: String, original: std::io::Error) -> Self {
        Self::Spawn { command, original }
    }

    pub fn base_url_error(url: String, original: url::ParseError) -> Self {
        Self::BaseUrl { url, original }
    }

    pub fn tunnel_request_error(base_url: String, original: reqwest::Error) -> Self {
        Self::TunnelRequest { base_url, original }
    }
}
