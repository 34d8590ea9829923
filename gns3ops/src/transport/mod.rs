//! Byte transports to a device: telnet console or SSH shell.
//!
//! Both look the same to the layers above: write bytes, read the next
//! chunk of output, close. Telnet negotiation and SSH channel messages
//! never leak past this module.

pub mod config;
#[cfg(test)]
pub(crate) mod scripted;
mod ssh;
mod telnet;

use std::future::Future;

pub use config::{HostKeyVerification, TransportConfig, TransportProfile};
pub use ssh::SshTransport;
pub use telnet::{ConsoleTransport, TelnetDecoder, TelnetStream, escape_iac};

use crate::error::Result;

/// A connected byte stream to a device.
pub trait Transport: Send {
    /// Which profile this transport speaks.
    fn profile(&self) -> TransportProfile;

    /// Write raw bytes.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read the next chunk of device output.
    ///
    /// Returns `Ok(None)` when the peer closed the connection. Pending
    /// until data arrives; callers bound it with a deadline.
    fn read_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// A transport chosen at runtime from a [`TransportConfig`].
pub enum Connection {
    Console(ConsoleTransport),
    Ssh(SshTransport),
}

impl Connection {
    /// Open the transport named by `config.profile`.
    pub async fn open(config: &TransportConfig) -> Result<Self> {
        match config.profile {
            TransportProfile::Console => Ok(Connection::Console(
                ConsoleTransport::connect(config).await?,
            )),
            TransportProfile::Ssh => Ok(Connection::Ssh(SshTransport::connect(config).await?)),
        }
    }
}

impl Transport for Connection {
    fn profile(&self) -> TransportProfile {
        match self {
            Connection::Console(t) => t.profile(),
            Connection::Ssh(t) => t.profile(),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Connection::Console(t) => t.write_all(data).await,
            Connection::Ssh(t) => t.write_all(data).await,
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            Connection::Console(t) => t.read_chunk().await,
            Connection::Ssh(t) => t.read_chunk().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Connection::Console(t) => t.close().await,
            Connection::Ssh(t) => t.close().await,
        }
    }
}
