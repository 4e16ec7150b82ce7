//! Synchronous, non-blocking transport abstraction.
//!
//! Adapted from the teacher's async `Transport` (same `socket2`-based
//! keepalive recipe, same illegal-control-char philosophy) but built on
//! plain non-blocking `std::net::TcpStream` instead of tokio, since this
//! crate's connection model is single-threaded and cooperative rather than
//! async (§5 of the design: only transport I/O may block, and only the one
//! owning thread ever touches it).

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

/// A byte-stream socket the client drives. `recv` must be non-blocking;
/// `send` may block. Implementors that wrap TLS or other transports need
/// only satisfy this interface.
pub trait Transport {
    /// Reads as many bytes as are immediately available into `buf`.
    /// Returns `Err(io::ErrorKind::WouldBlock)` when nothing is ready yet,
    /// and `Ok(0)` when the peer has closed the connection.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes `bytes` to the wire, blocking until the full buffer is sent.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;

    fn error_text(&self, err: &io::Error) -> String {
        err.to_string()
    }
}

/// Plain (non-TLS) TCP transport.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nonblocking(true)?;
        if let Err(e) = enable_keepalive(&stream) {
            tracing::warn!("failed to enable TCP keepalive: {e}");
        }
        Ok(TcpTransport { stream })
    }
}

fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    sock.set_tcp_keepalive(&keepalive)
}

impl Transport for TcpTransport {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.set_nonblocking(false)?;
        let result = self.stream.write_all(bytes);
        let _ = self.stream.set_nonblocking(true);
        result
    }

    fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both)
    }
}

/// Scans a decoded line for control characters the wire format forbids.
/// CTCP's `\x01` delimiter is explicitly permitted, matching the teacher's
/// `read_line_limited` scan.
pub fn has_illegal_control_char(line: &str) -> Option<char> {
    line.chars()
        .find(|&ch| ch == '\0' || (ch.is_control() && ch != '\u{0001}'))
}

#[cfg(feature = "tls")]
pub mod tls {
    //! TLS transport built on `rustls`, the synchronous counterpart of the
    //! teacher's `tokio-rustls`-based transport.

    use super::Transport;
    use std::io::{self, Read, Write};
    use std::net::TcpStream;
    use std::sync::Arc;

    pub struct TlsTransport {
        stream: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
    }

    impl TlsTransport {
        pub fn connect(address: &str, server_name: &str) -> io::Result<Self> {
            let tcp = TcpStream::connect(address)?;
            tcp.set_nonblocking(true)?;
            if let Err(e) = super::enable_keepalive(&tcp) {
                tracing::warn!("failed to enable TCP keepalive: {e}");
            }

            let mut roots = rustls::RootCertStore::empty();
            let certs = rustls_native_certs::load_native_certs()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            roots.add_parsable_certificates(certs);
            let config = rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();

            let server_name: rustls::pki_types::ServerName<'static> = server_name
                .to_string()
                .try_into()
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid server name"))?;
            let conn = rustls::ClientConnection::new(Arc::new(config), server_name)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            Ok(TlsTransport {
                stream: rustls::StreamOwned::new(conn, tcp),
            })
        }
    }

    impl Transport for TlsTransport {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.stream.read(buf)
        }

        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.stream.get_mut().set_nonblocking(false)?;
            let result = self.stream.write_all(bytes);
            let _ = self.stream.get_mut().set_nonblocking(true);
            result
        }

        fn close(&mut self) -> io::Result<()> {
            self.stream.get_mut().shutdown(std::net::Shutdown::Both)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctcp_delimiter_is_permitted() {
        assert_eq!(
            has_illegal_control_char("\u{0001}ACTION waves\u{0001}"),
            None
        );
    }

    #[test]
    fn null_byte_is_rejected() {
        assert_eq!(has_illegal_control_char("hi\0there"), Some('\0'));
    }
}
