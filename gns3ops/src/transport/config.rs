//! Transport connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// How a device is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProfile {
    /// Telnet to the emulator's virtual serial console. Unauthenticated.
    #[default]
    Console,

    /// SSH to the device's management address.
    Ssh,
}

impl TransportProfile {
    /// Line terminator sent after each command.
    pub fn line_ending(&self) -> &'static str {
        match self {
            TransportProfile::Console => "\r\n",
            TransportProfile::Ssh => "\n",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProfile::Console => "console",
            TransportProfile::Ssh => "ssh",
        }
    }
}

impl fmt::Display for TransportProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and learn unknown keys, reject changed keys.
    AcceptNew,

    /// Accept all keys without checking.
    ///
    /// Emulated routers regenerate their keys whenever `crypto key generate`
    /// runs, so this is the default.
    #[default]
    Disabled,
}

/// Everything needed to open one transport connection.
#[derive(Debug)]
pub struct TransportConfig {
    pub profile: TransportProfile,

    /// Target host (hostname or IP address).
    pub host: String,

    pub port: u16,

    /// Username for SSH authentication. Ignored on the console.
    pub username: Option<String>,

    /// Password for SSH authentication. Ignored on the console.
    pub password: Option<SecretString>,

    /// Connection timeout.
    pub timeout: Duration,

    /// Terminal width for the SSH PTY.
    pub terminal_width: u32,

    /// Terminal height for the SSH PTY.
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file. `None` uses the user's default.
    pub known_hosts_path: Option<PathBuf>,
}

impl TransportConfig {
    /// Create a configuration with defaults for everything but the endpoint.
    pub fn new(profile: TransportProfile, host: impl Into<String>, port: u16) -> Self {
        Self {
            profile,
            host: host.into(),
            port,
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn with_known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// `host:port` form used in log lines.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
