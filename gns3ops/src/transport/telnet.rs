//! Telnet console transport.
//!
//! GNS3 exposes each router's serial console as a raw telnet port on the
//! server. Only enough of RFC 854 is implemented to keep the stream clean:
//! negotiation sequences are stripped from the data, the server's offer to
//! echo and suppress go-ahead is accepted, and everything else is refused.

use bytes::BytesMut;
use log::{debug, info, trace};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::{TransportConfig, TransportProfile};
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Console transport over a TCP stream.
pub type ConsoleTransport = TelnetStream<TcpStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Output of one [`TelnetDecoder::feed`] call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Application data with telnet commands removed.
    pub data: Vec<u8>,

    /// Negotiation replies to write back to the server.
    pub replies: Vec<u8>,
}

/// Incremental telnet command stripper.
///
/// Sequences may be split across reads, so decoder state survives between
/// calls.
#[derive(Debug)]
pub struct TelnetDecoder {
    state: DecodeState,

    /// (command, option) pairs already answered, so repeats get no reply.
    answered: Vec<(u8, u8)>,
}

impl Default for TelnetDecoder {
    fn default() -> Self {
        Self {
            state: DecodeState::Data,
            answered: Vec::new(),
        }
    }
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk of bytes read from the server.
    pub fn feed(&mut self, input: &[u8]) -> Decoded {
        let mut out = Decoded::default();
        let mut rest = input;

        while !rest.is_empty() {
            match self.state {
                DecodeState::Data => match memchr(IAC, rest) {
                    None => {
                        out.data.extend_from_slice(rest);
                        break;
                    }
                    Some(i) => {
                        out.data.extend_from_slice(&rest[..i]);
                        rest = &rest[i + 1..];
                        self.state = DecodeState::Iac;
                    }
                },
                DecodeState::Iac => {
                    let byte = rest[0];
                    rest = &rest[1..];
                    self.state = match byte {
                        IAC => {
                            out.data.push(IAC);
                            DecodeState::Data
                        }
                        DO | DONT | WILL | WONT => DecodeState::Negotiate(byte),
                        SB => DecodeState::Sub,
                        // NOP, GA, AYT and friends carry no option byte
                        _ => DecodeState::Data,
                    };
                }
                DecodeState::Negotiate(command) => {
                    let option = rest[0];
                    rest = &rest[1..];
                    self.respond(command, option, &mut out.replies);
                    self.state = DecodeState::Data;
                }
                DecodeState::Sub => match memchr(IAC, rest) {
                    None => break,
                    Some(i) => {
                        rest = &rest[i + 1..];
                        self.state = DecodeState::SubIac;
                    }
                },
                DecodeState::SubIac => {
                    let byte = rest[0];
                    rest = &rest[1..];
                    self.state = if byte == SE {
                        DecodeState::Data
                    } else {
                        DecodeState::Sub
                    };
                }
            }
        }

        out
    }

    fn respond(&mut self, command: u8, option: u8, replies: &mut Vec<u8>) {
        let reply = match command {
            WILL if option == OPT_ECHO || option == OPT_SGA => DO,
            WILL => DONT,
            DO => WONT,
            // DONT/WONT only confirm a state we never asked for
            _ => return,
        };

        if self.answered.contains(&(command, option)) {
            return;
        }
        self.answered.push((command, option));

        trace!("telnet: {} {} -> {} {}", command, option, reply, option);
        replies.extend_from_slice(&[IAC, reply, option]);
    }
}

/// Escape literal 0xFF bytes for the telnet data stream.
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out
}

/// Telnet session over any byte stream.
pub struct TelnetStream<S> {
    stream: S,
    decoder: TelnetDecoder,
    read_buf: BytesMut,
}

impl TelnetStream<TcpStream> {
    /// Connect to a console port.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        info!("Connecting to console {}", config.socket_addr());

        let stream = tokio::time::timeout(
            config.timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

        stream.set_nodelay(true).map_err(TransportError::Io)?;
        debug!("Console {} connected", config.socket_addr());

        Ok(Self::new(stream))
    }
}

impl<S> TelnetStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: TelnetDecoder::new(),
            read_buf: BytesMut::with_capacity(4096),
        }
    }
}

impl<S> Transport for TelnetStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn profile(&self) -> TransportProfile {
        TransportProfile::Console
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let escaped = escape_iac(data);
        self.stream
            .write_all(&escaped)
            .await
            .map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            self.read_buf.reserve(4096);
            let n = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Ok(None);
            }

            let raw = self.read_buf.split();
            let decoded = self.decoder.feed(&raw);

            if !decoded.replies.is_empty() {
                self.stream
                    .write_all(&decoded.replies)
                    .await
                    .map_err(TransportError::Io)?;
            }

            // A chunk of pure negotiation carries no data; keep reading
            if !decoded.data.is_empty() {
                return Ok(Some(decoded.data));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_plain_data_passes_through() {
        let mut decoder = TelnetDecoder::new();
        let out = decoder.feed(b"R1>");
        assert_eq!(out.data, b"R1>");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_negotiation_is_stripped_and_answered() {
        let mut decoder = TelnetDecoder::new();
        let out = decoder.feed(&[
            IAC, WILL, OPT_ECHO, IAC, WILL, OPT_SGA, IAC, DO, 24, b'o', b'k',
        ]);
        assert_eq!(out.data, b"ok");
        assert_eq!(
            out.replies,
            vec![IAC, DO, OPT_ECHO, IAC, DO, OPT_SGA, IAC, WONT, 24]
        );
    }

    #[test]
    fn test_repeated_request_answered_once() {
        let mut decoder = TelnetDecoder::new();
        let first = decoder.feed(&[IAC, WILL, 31]);
        let second = decoder.feed(&[IAC, WILL, 31]);
        assert_eq!(first.replies, vec![IAC, DONT, 31]);
        assert!(second.replies.is_empty());
    }

    #[test]
    fn test_sequence_split_across_reads() {
        let mut decoder = TelnetDecoder::new();
        let a = decoder.feed(&[b'a', IAC]);
        let b = decoder.feed(&[WILL]);
        let c = decoder.feed(&[OPT_ECHO, b'b']);
        assert_eq!(a.data, b"a");
        assert!(b.data.is_empty());
        assert_eq!(c.data, b"b");
        assert_eq!(c.replies, vec![IAC, DO, OPT_ECHO]);
    }

    #[test]
    fn test_subnegotiation_and_escaped_iac() {
        let mut decoder = TelnetDecoder::new();
        let out = decoder.feed(&[IAC, SB, 24, 1, IAC, SE, b'x', IAC, IAC, b'y']);
        assert_eq!(out.data, vec![b'x', IAC, b'y']);
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_escape_iac() {
        assert_eq!(escape_iac(&[b'a', IAC, b'b']), vec![b'a', IAC, IAC, b'b']);
        assert_eq!(escape_iac(b"show clock\r\n"), b"show clock\r\n");
    }

    #[tokio::test]
    async fn test_stream_answers_negotiation_then_yields_data() {
        let mock = Builder::new()
            .read(&[IAC, WILL, OPT_ECHO, IAC, DO, 24])
            .write(&[IAC, DO, OPT_ECHO, IAC, WONT, 24])
            .read(b"\r\nR1>")
            .write(b"enable\r\n")
            .build();

        let mut transport = TelnetStream::new(mock);
        let chunk = transport.read_chunk().await.unwrap().unwrap();
        assert_eq!(chunk, b"\r\nR1>");
        transport.write_all(b"enable\r\n").await.unwrap();
        assert_eq!(transport.profile(), TransportProfile::Console);
    }

    #[tokio::test]
    async fn test_stream_eof() {
        let mock = Builder::new().build();
        let mut transport = TelnetStream::new(mock);
        assert!(transport.read_chunk().await.unwrap().is_none());
    }
}
