//! Short-lived SMTP session used by the mail-relay check.
//!
//! # States
//! ```text
//! Disconnected → Connected → [Authenticated] → Closed
//! ```
//!
//! # Design Decisions
//! - Only greeting, EHLO, STARTTLS, AUTH LOGIN and QUIT are spoken
//! - One session per check invocation; sessions are never pooled
//! - Dropping a session closes its socket on every exit path

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::ServerName;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::checks::smtp::options::{SmtpOptions, SmtpSecurity};
use crate::net::tls;

/// Name announced in `EHLO`.
const CLIENT_NAME: &str = "localhost";
/// Upper bound on lines in one multi-line reply.
const MAX_REPLY_LINES: usize = 128;
/// Upper bound on one reply line, CRLF included (RFC 5321 §4.5.3.1.5).
const MAX_REPLY_LINE_LEN: u64 = 512;
/// Bound on the courtesy `QUIT` exchange while closing.
const QUIT_TIMEOUT: Duration = Duration::from_secs(1);

const REPLY_READY: u16 = 220;
const REPLY_OK: u16 = 250;
const REPLY_AUTH_SUCCESS: u16 = 235;
const REPLY_AUTH_CONTINUE: u16 = 334;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
    Closed,
}

/// Errors raised by an SMTP session.
#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid server name '{0}'")]
    InvalidServerName(String),

    #[error("expected reply {expected}, server replied {code} {message}")]
    Rejected {
        expected: u16,
        code: u16,
        message: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("operation not valid while {0:?}")]
    InvalidState(SessionState),
}

/// A mail-relay session as seen by the check.
#[async_trait]
pub trait MailConnection: Send {
    /// Open the socket and complete the greeting (and TLS, if configured).
    async fn connect(&mut self) -> Result<(), SmtpError>;

    /// Log in with `AUTH LOGIN`.
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), SmtpError>;

    /// Say goodbye and release the socket. Never fails.
    async fn close(&mut self);

    fn state(&self) -> SessionState;
}

/// Opens a fresh session per check invocation.
pub trait MailConnector: Send + Sync {
    fn open(&self, options: &SmtpOptions) -> Box<dyn MailConnection>;
}

/// Connector producing real TCP sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpMailConnector;

impl MailConnector for TcpMailConnector {
    fn open(&self, options: &SmtpOptions) -> Box<dyn MailConnection> {
        Box::new(SmtpConnection::new(options.clone()))
    }
}

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

type Stream = BufReader<Box<dyn Io>>;

/// One parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    message: String,
}

/// SMTP session over TCP, optionally TLS-wrapped.
pub struct SmtpConnection {
    options: SmtpOptions,
    stream: Option<Stream>,
    state: SessionState,
}

impl SmtpConnection {
    pub fn new(options: SmtpOptions) -> Self {
        Self {
            options,
            stream: None,
            state: SessionState::Disconnected,
        }
    }

    async fn handshake(&mut self) -> Result<(), SmtpError> {
        let security = self.options.effective_security();
        let tcp = TcpStream::connect((self.options.host.as_str(), self.options.port)).await?;
        tcp.set_nodelay(true)?;

        let io: Box<dyn Io> = match security {
            SmtpSecurity::ImplicitTls => wrap_tls(&self.options, Box::new(tcp)).await?,
            _ => Box::new(tcp),
        };
        self.stream = Some(BufReader::new(io));

        self.expect(REPLY_READY).await?;
        self.command(&format!("EHLO {}", CLIENT_NAME), REPLY_OK).await?;

        if security == SmtpSecurity::StartTls {
            self.command("STARTTLS", REPLY_READY).await?;
            let plain = self
                .stream
                .take()
                .ok_or(SmtpError::InvalidState(self.state))?
                .into_inner();
            let secured = wrap_tls(&self.options, plain).await?;
            self.stream = Some(BufReader::new(secured));
            self.command(&format!("EHLO {}", CLIENT_NAME), REPLY_OK).await?;
        }

        Ok(())
    }

    async fn command(&mut self, line: &str, expected: u16) -> Result<Reply, SmtpError> {
        self.send(line).await?;
        self.expect(expected).await
    }

    async fn send(&mut self, line: &str) -> Result<(), SmtpError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(SmtpError::InvalidState(self.state))?;
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }

    async fn expect(&mut self, expected: u16) -> Result<Reply, SmtpError> {
        let reply = self.read_reply().await?;
        if reply.code == expected {
            Ok(reply)
        } else {
            Err(SmtpError::Rejected {
                expected,
                code: reply.code,
                message: reply.message,
            })
        }
    }

    /// Read one possibly multi-line reply (`250-...` continues, `250 ...` ends).
    async fn read_reply(&mut self) -> Result<Reply, SmtpError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(SmtpError::InvalidState(self.state))?;

        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = (&mut *stream)
                .take(MAX_REPLY_LINE_LEN)
                .read_line(&mut line)
                .await?;
            if !line.ends_with('\n') {
                return Err(if read as u64 >= MAX_REPLY_LINE_LEN {
                    SmtpError::Protocol(format!(
                        "reply line exceeds {} octets",
                        MAX_REPLY_LINE_LEN
                    ))
                } else {
                    SmtpError::Protocol("connection closed by server".into())
                });
            }
            let line = line.trim_end_matches(['\r', '\n']);

            let (code, rest) = parse_reply_line(line)?;
            let last = !rest.starts_with('-');
            lines.push(rest.get(1..).unwrap_or("").to_string());

            if last {
                return Ok(Reply {
                    code,
                    message: lines.join(" "),
                });
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(SmtpError::Protocol("reply exceeds line limit".into()));
            }
        }
    }
}

async fn wrap_tls(options: &SmtpOptions, io: Box<dyn Io>) -> Result<Box<dyn Io>, SmtpError> {
    let config = tls::client_config(options.allow_invalid_certificates)?;
    let server_name = ServerName::try_from(options.host.clone())
        .map_err(|_| SmtpError::InvalidServerName(options.host.clone()))?;
    let stream = TlsConnector::from(config).connect(server_name, io).await?;
    Ok(Box::new(stream))
}

fn parse_reply_line(line: &str) -> Result<(u16, &str), SmtpError> {
    let code = line
        .get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| SmtpError::Protocol(format!("malformed reply '{}'", line)))?;
    Ok((code, &line[3..]))
}

#[async_trait]
impl MailConnection for SmtpConnection {
    async fn connect(&mut self) -> Result<(), SmtpError> {
        if self.state != SessionState::Disconnected {
            return Err(SmtpError::InvalidState(self.state));
        }

        let timeout = self.options.connect_timeout();
        match tokio::time::timeout(timeout, self.handshake()).await {
            Ok(Ok(())) => {
                self.state = SessionState::Connected;
                tracing::debug!(
                    host = %self.options.host,
                    port = self.options.port,
                    "SMTP session established"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                self.stream = None;
                Err(e)
            }
            Err(_) => {
                self.stream = None;
                Err(SmtpError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", timeout),
                )))
            }
        }
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), SmtpError> {
        if self.state != SessionState::Connected {
            return Err(SmtpError::InvalidState(self.state));
        }

        self.command("AUTH LOGIN", REPLY_AUTH_CONTINUE).await?;
        self.command(&STANDARD.encode(username), REPLY_AUTH_CONTINUE)
            .await?;
        self.command(&STANDARD.encode(password), REPLY_AUTH_SUCCESS)
            .await?;

        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let quit = async {
                stream.write_all(b"QUIT\r\n").await?;
                stream.flush().await?;
                let mut line = String::new();
                stream.read_line(&mut line).await?;
                stream.shutdown().await
            };
            if let Err(e) = tokio::time::timeout(QUIT_TIMEOUT, quit)
                .await
                .unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into()))
            {
                tracing::trace!(
                    host = %self.options.host,
                    error = %e,
                    "SMTP QUIT not acknowledged"
                );
            }
        }
        self.state = SessionState::Closed;
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

impl Drop for SmtpConnection {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::trace!(
                host = %self.options.host,
                port = self.options.port,
                "SMTP session dropped without QUIT"
            );
        }
    }
}
