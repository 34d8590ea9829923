//! Error types for gns3ops.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for gns3ops operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Console/SSH transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Topology discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Command output did not contain an expected field
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// File persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of an [`Error`], used in operation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Authentication,
    Timeout,
    Parse,
    Persistence,
    Discovery,
    Protocol,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Parse => "parse",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Discovery => "discovery",
            ErrorKind::Protocol => "protocol",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(TransportError::AuthenticationFailed { .. }) => {
                ErrorKind::Authentication
            }
            Error::Transport(TransportError::Timeout(_)) => ErrorKind::Timeout,
            Error::Transport(_) => ErrorKind::Connection,
            Error::Channel(ChannelError::PromptTimeout(_)) => ErrorKind::Timeout,
            Error::Channel(ChannelError::Closed) => ErrorKind::Connection,
            Error::Channel(_) | Error::Driver(_) => ErrorKind::Protocol,
            Error::Discovery(_) => ErrorKind::Discovery,
            Error::Parse(_) => ErrorKind::Parse,
            Error::Store(_) => ErrorKind::Persistence,
        }
    }
}

/// Transport layer errors (TCP/telnet console, SSH).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key did not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (prompt detection).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No prompt seen within the budget
    #[error("Prompt not found within {0:?}")]
    PromptTimeout(Duration),

    /// Peer closed the line
    #[error("Channel closed")]
    Closed,

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session errors (privilege changes, configuration).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Failed to acquire target privilege level
    #[error("Failed to acquire privilege level '{target}'")]
    PrivilegeAcquisitionFailed { target: String },

    /// Prompt did not match any known privilege level
    #[error("Unknown privilege level from prompt: '{prompt}'")]
    UnknownPrivilege { prompt: String },

    /// Invalid session or device configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Errors talking to the GNS3 server.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("GNS3 API error {status}: {body}")]
    Api { status: u16, body: String },

    /// No project with this name
    #[error("Project '{name}' not found")]
    ProjectNotFound { name: String },
}

/// Expected field missing from command output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("field '{field}' not found in output of '{command}'")]
    MissingField {
        field: &'static str,
        command: &'static str,
    },
}

/// File persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Name not usable as a file name
    #[error("Invalid name '{0}'")]
    InvalidName(String),

    /// Named entry does not exist
    #[error("{what} '{name}' not found")]
    NotFound { what: &'static str, name: String },

    /// Every candidate file name is in use
    #[error("{} already exists", .path.display())]
    Exists { path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using gns3ops' Error.
pub type Result<T> = std::result::Result<T, Error>;
