//! Byte transports under the telnet layer
//!
//! `NetTransport` is a TCP socket, optionally wrapped in TLS. Anything else
//! implementing [`Transport`] (in-memory pipes in tests) can stand in for it.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::errors::{MuckError, MuckResult};

pub trait Transport: Read + Write + Send {
    /// `None` blocks until data arrives
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

pub enum NetTransport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl NetTransport {
    pub fn connect(server: &ServerConfig, connect_timeout: Duration) -> MuckResult<Self> {
        let tcp = connect_tcp(&server.host, server.port, connect_timeout)?;

        if !server.use_tls {
            tracing::info!("Connected to {}:{}", server.host, server.port);
            return Ok(NetTransport::Plain(tcp));
        }

        let stream = start_tls(tcp, server, connect_timeout)?;
        tracing::info!("Connected to {}:{} with TLS", server.host, server.port);
        Ok(NetTransport::Tls(Box::new(stream)))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, NetTransport::Tls(_))
    }

    fn socket(&self) -> &TcpStream {
        match self {
            NetTransport::Plain(tcp) => tcp,
            NetTransport::Tls(stream) => &stream.sock,
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> MuckResult<TcpStream> {
    let mut last_error = None;

    for addr in (host, port).to_socket_addrs()? {
        tracing::debug!("Trying {}", addr);
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(tcp) => {
                tcp.set_nodelay(true)?;
                return Ok(tcp);
            }
            Err(e) => {
                tracing::debug!("Connection to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) if e.kind() == io::ErrorKind::TimedOut => {
            MuckError::Timeout(format!("connection to {}:{}", host, port))
        }
        Some(e) => MuckError::Io(e),
        None => MuckError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", host),
        )),
    })
}

fn start_tls(
    mut tcp: TcpStream,
    server: &ServerConfig,
    timeout: Duration,
) -> MuckResult<StreamOwned<ClientConnection, TcpStream>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let config = if server.ignore_tls_cert {
        tracing::warn!("TLS certificate checks disabled for {}", server.host);
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert { provider }))
            .with_no_client_auth()
    } else {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    let name = ServerName::try_from(server.host.clone())
        .map_err(|_| MuckError::InvalidServerName(server.host.clone()))?;
    let mut conn = ClientConnection::new(Arc::new(config), name)?;

    // Finish the handshake now so certificate problems surface at connect
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;
    while conn.is_handshaking() {
        conn.complete_io(&mut tcp).map_err(|e| match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                MuckError::Timeout("TLS handshake".to_string())
            }
            _ => MuckError::from(e),
        })?;
    }
    tcp.set_write_timeout(None)?;

    Ok(StreamOwned::new(conn, tcp))
}

impl Read for NetTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NetTransport::Plain(tcp) => tcp.read(buf),
            NetTransport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for NetTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            NetTransport::Plain(tcp) => tcp.write(buf),
            NetTransport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NetTransport::Plain(tcp) => tcp.flush(),
            NetTransport::Tls(stream) => stream.flush(),
        }
    }
}

impl Transport for NetTransport {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self.socket(), timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match self {
            NetTransport::Plain(tcp) => TcpStream::shutdown(tcp, Shutdown::Both),
            NetTransport::Tls(stream) => {
                stream.conn.send_close_notify();
                if let Err(e) = stream.conn.complete_io(&mut stream.sock) {
                    tracing::debug!("Could not send TLS close_notify: {}", e);
                }
                TcpStream::shutdown(&stream.sock, Shutdown::Both)
            }
        }
    }
}

/// Accepts any server certificate; handshake signatures are still verified
#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
