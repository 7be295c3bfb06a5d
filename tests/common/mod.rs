//! Shared mock servers for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// A self-signed certificate valid for `localhost` and `127.0.0.1`.
pub struct TestCert {
    pub cert_pem: String,
    pub key_pem: String,
    cert_der: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl TestCert {
    pub fn generate() -> Self {
        let names = vec!["localhost".to_string(), "127.0.0.1".to_string()];
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(names).unwrap();
        Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            cert_der: cert.der().clone(),
            key_der: key_pair.serialize_der(),
        }
    }

    /// Write `<stem>.pem` and `<stem>.key` into `dir`.
    pub fn write_pem(&self, dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
        let cert_path = dir.join(format!("{}.pem", stem));
        let key_path = dir.join(format!("{}.key", stem));
        std::fs::write(&cert_path, &self.cert_pem).unwrap();
        std::fs::write(&key_path, &self.key_pem).unwrap();
        (cert_path, key_path)
    }

    /// Server-side TLS presenting this certificate.
    pub fn acceptor(&self) -> TlsAcceptor {
        self.server_config(None)
    }

    /// Server-side TLS that also demands a client certificate issued as `client`.
    pub fn acceptor_requiring_client(&self, client: &TestCert) -> TlsAcceptor {
        self.server_config(Some(client))
    }

    fn server_config(&self, client: Option<&TestCert>) -> TlsAcceptor {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .unwrap();
        let builder = match client {
            Some(client) => {
                let mut roots = RootCertStore::empty();
                roots.add(client.cert_der.clone()).unwrap();
                let verifier =
                    WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                        .build()
                        .unwrap();
                builder.with_client_cert_verifier(verifier)
            }
            None => builder.with_no_client_auth(),
        };
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()));
        let config = builder
            .with_single_cert(vec![self.cert_der.clone()], key)
            .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }
}

/// What a programmable HTTP backend saw.
#[derive(Default)]
pub struct BackendLog {
    pub requests: AtomicUsize,
    pub handshake_failures: AtomicUsize,
    pub last_request: Mutex<String>,
}

impl BackendLog {
    pub fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn handshake_failures(&self) -> usize {
        self.handshake_failures.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> String {
        self.last_request.lock().unwrap().clone()
    }
}

/// Start an HTTP backend on an ephemeral port whose status code comes from `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<BackendLog>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = u16> + Send + 'static,
{
    start_backend(f, None).await
}

/// Start an HTTP backend that always answers with `status`.
pub async fn start_mock_backend(status: u16) -> (SocketAddr, Arc<BackendLog>) {
    start_programmable_backend(move || async move { status }).await
}

/// Start an HTTPS backend that always answers with `status`.
pub async fn start_tls_backend(
    status: u16,
    acceptor: TlsAcceptor,
) -> (SocketAddr, Arc<BackendLog>) {
    start_backend(move || async move { status }, Some(acceptor)).await
}

async fn start_backend<F, Fut>(f: F, tls: Option<TlsAcceptor>) -> (SocketAddr, Arc<BackendLog>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = u16> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(BackendLog::default());
    let f = Arc::new(f);

    let server_log = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = Arc::clone(&f);
            let log = Arc::clone(&server_log);
            let tls = tls.clone();
            tokio::spawn(async move {
                match tls {
                    Some(acceptor) => match acceptor.accept(socket).await {
                        Ok(stream) => serve_http(stream, f.as_ref(), &log).await,
                        Err(_) => {
                            log.handshake_failures.fetch_add(1, Ordering::SeqCst);
                        }
                    },
                    None => serve_http(socket, f.as_ref(), &log).await,
                }
            });
        }
    });

    (addr, log)
}

async fn serve_http<S, F, Fut>(mut socket: S, f: &F, log: &BackendLog)
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn() -> Fut,
    Fut: Future<Output = u16>,
{
    let mut buf = vec![0u8; 4096];
    let mut request = Vec::new();
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    log.requests.fetch_add(1, Ordering::SeqCst);
    *log.last_request.lock().unwrap() = String::from_utf8_lossy(&request).into_owned();

    let status = f().await;
    let status_text = match status {
        200 => "200 OK",
        401 => "401 Unauthorized",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status_text
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Return an address nothing is listening on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Transport security offered by the mock mail relay.
#[derive(Clone, Default)]
pub enum RelayTls {
    #[default]
    None,
    /// TLS from the first byte.
    Implicit(TlsAcceptor),
    /// Plain greeting, upgraded on `STARTTLS`.
    StartTls(TlsAcceptor),
}

/// How the mock mail relay behaves.
#[derive(Clone)]
pub struct SmtpScript {
    pub greeting: String,
    pub username: &'static str,
    pub password: &'static str,
    /// Never answer `AUTH LOGIN`.
    pub hang_on_auth: bool,
    pub tls: RelayTls,
}

impl Default for SmtpScript {
    fn default() -> Self {
        Self {
            greeting: "220 mock.relay ESMTP ready".to_string(),
            username: "probe",
            password: "secret",
            hang_on_auth: false,
            tls: RelayTls::None,
        }
    }
}

/// What the mock mail relay saw.
#[derive(Default)]
pub struct SmtpLog {
    pub sessions: AtomicUsize,
    pub quits: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub ehlos: AtomicUsize,
    pub tls_sessions: AtomicUsize,
    pub handshake_failures: AtomicUsize,
}

impl SmtpLog {
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn ehlos(&self) -> usize {
        self.ehlos.load(Ordering::SeqCst)
    }

    pub fn tls_sessions(&self) -> usize {
        self.tls_sessions.load(Ordering::SeqCst)
    }

    pub fn handshake_failures(&self) -> usize {
        self.handshake_failures.load(Ordering::SeqCst)
    }

    /// Wait until `n` sessions have ended, so assertions do not race the server.
    pub async fn wait_for_disconnects(&self, n: usize) {
        for _ in 0..100 {
            if self.disconnects() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Start a scripted SMTP relay on an ephemeral port.
pub async fn start_smtp_server(script: SmtpScript) -> (SocketAddr, Arc<SmtpLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(SmtpLog::default());

    let server_log = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let script = script.clone();
            let log = Arc::clone(&server_log);
            tokio::spawn(async move {
                log.sessions.fetch_add(1, Ordering::SeqCst);
                serve_smtp(socket, &script, &log).await;
                log.disconnects.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    (addr, log)
}

trait RelayIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> RelayIo for T {}

type RelaySession = BufReader<Box<dyn RelayIo>>;

async fn serve_smtp(socket: TcpStream, script: &SmtpScript, log: &SmtpLog) {
    let io: Box<dyn RelayIo> = match &script.tls {
        RelayTls::Implicit(acceptor) => match acceptor.accept(socket).await {
            Ok(stream) => {
                log.tls_sessions.fetch_add(1, Ordering::SeqCst);
                Box::new(stream)
            }
            Err(_) => {
                log.handshake_failures.fetch_add(1, Ordering::SeqCst);
                return;
            }
        },
        _ => Box::new(socket),
    };
    let mut session: RelaySession = BufReader::new(io);

    if !send(&mut session, &script.greeting).await || !script.greeting.starts_with("220") {
        return;
    }

    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD;
    let expected_user = b64.encode(script.username);
    let expected_pass = b64.encode(script.password);

    let mut auth_step = 0;
    let mut user_ok = false;

    while let Some(line) = next_line(&mut session).await {
        let reply = if auth_step == 1 {
            auth_step = 2;
            user_ok = line == expected_user;
            "334 UGFzc3dvcmQ6".to_string()
        } else if auth_step == 2 {
            auth_step = 0;
            if user_ok && line == expected_pass {
                "235 2.7.0 Authentication successful".to_string()
            } else {
                "535 5.7.8 Authentication credentials invalid".to_string()
            }
        } else if line.starts_with("EHLO") {
            log.ehlos.fetch_add(1, Ordering::SeqCst);
            match script.tls {
                RelayTls::StartTls(_) => "250-mock.relay\r\n250-STARTTLS\r\n250 AUTH LOGIN",
                _ => "250-mock.relay\r\n250-PIPELINING\r\n250 AUTH LOGIN",
            }
            .to_string()
        } else if line == "STARTTLS" {
            let RelayTls::StartTls(acceptor) = &script.tls else {
                if !send(&mut session, "454 4.7.0 TLS not available").await {
                    return;
                }
                continue;
            };
            if !send(&mut session, "220 2.0.0 Ready to start TLS").await {
                return;
            }
            match acceptor.accept(session.into_inner()).await {
                Ok(stream) => {
                    log.tls_sessions.fetch_add(1, Ordering::SeqCst);
                    let io: Box<dyn RelayIo> = Box::new(stream);
                    session = BufReader::new(io);
                    continue;
                }
                Err(_) => {
                    log.handshake_failures.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            }
        } else if line == "AUTH LOGIN" {
            if script.hang_on_auth {
                // Ignore everything but QUIT.
                while let Some(line) = next_line(&mut session).await {
                    if line == "QUIT" {
                        log.quits.fetch_add(1, Ordering::SeqCst);
                        send(&mut session, "221 2.0.0 Bye").await;
                        break;
                    }
                }
                return;
            }
            auth_step = 1;
            "334 VXNlcm5hbWU6".to_string()
        } else if line == "QUIT" {
            log.quits.fetch_add(1, Ordering::SeqCst);
            send(&mut session, "221 2.0.0 Bye").await;
            return;
        } else {
            "502 5.5.2 Command not recognized".to_string()
        };

        if !send(&mut session, &reply).await {
            return;
        }
    }
}

async fn next_line(session: &mut RelaySession) -> Option<String> {
    let mut line = String::new();
    match session.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

async fn send(session: &mut RelaySession, reply: &str) -> bool {
    session
        .write_all(format!("{}\r\n", reply).as_bytes())
        .await
        .is_ok()
        && session.flush().await.is_ok()
}
