//! Remote session lifecycle: connect, authenticate, run one command, close
//!
//! libssh2 is blocking, so every phase runs on the tokio blocking pool and
//! the calling task only suspends. The connect deadline is enforced on the
//! async side; libssh2 gets a slightly longer timeout as a backstop so the
//! blocking thread cannot hang forever after the caller has given up.

use std::io::{self, ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use ssh2::{Channel, Session};
use tracing::{debug, info, warn};

use crate::{Credential, SessionError, SshTarget};

const BACKSTOP_SLACK: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const READ_CHUNK: usize = 8192;

/// An authenticated session; disconnects when dropped
struct ConnectedSession {
    session: Session,
    address: String,
}

impl Drop for ConnectedSession {
    fn drop(&mut self) {
        self.session.set_blocking(true);
        self.session.set_timeout(millis(BACKSTOP_SLACK));
        if let Err(e) = self.session.disconnect(None, "session closed", None) {
            debug!(address = %self.address, "SSH disconnect failed: {}", e);
        }
    }
}

/// Run `command` on `target` and return everything it wrote to stdout and
/// stderr, in arrival order
///
/// The exit status of the command is ignored. Once the command has been
/// dispatched no timeout applies.
pub async fn execute(target: &SshTarget, command: &str) -> Result<String, SessionError> {
    let connected = connect(target).await?;
    let command = command.to_string();

    debug!(address = %target.address(), command = %command, "Dispatching remote command");

    tokio::task::spawn_blocking(move || run_command(&connected, &command))
        .await
        .map_err(|e| SessionError::Execution(format!("SSH session task failed: {}", e)))?
}

/// Check that `target` accepts a connection with its credential
///
/// Never fails; any error is logged and reported as `false`.
pub async fn probe(target: &SshTarget) -> bool {
    match connect(target).await {
        Ok(connected) => {
            // Disconnect is blocking I/O as well
            let _ = tokio::task::spawn_blocking(move || drop(connected)).await;
            info!(address = %target.address(), "SSH probe succeeded");
            true
        }
        Err(e) => {
            warn!(address = %target.address(), "SSH probe failed: {}", e);
            false
        }
    }
}

async fn connect(target: &SshTarget) -> Result<ConnectedSession, SessionError> {
    let timeout = target.connect_timeout;
    let owned = target.clone();
    let task = tokio::task::spawn_blocking(move || connect_blocking(&owned));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(SessionError::Connection(format!(
            "SSH connect task failed: {}",
            e
        ))),
        Err(_) => Err(SessionError::Connection(format!(
            "Timed out after {:?} connecting to {}",
            timeout,
            target.address()
        ))),
    }
}

/// Trust boundary: the server host key is accepted without verification, so
/// whatever answers at the target address receives the credential.
fn connect_blocking(target: &SshTarget) -> Result<ConnectedSession, SessionError> {
    let address = target.address();
    let backstop = target.connect_timeout + BACKSTOP_SLACK;

    let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| SessionError::Connection(format!("Failed to resolve {}: {}", address, e)))?
        .collect();

    let tcp = connect_tcp(&addrs, backstop)
        .map_err(|e| SessionError::Connection(format!("Failed to connect to {}: {}", address, e)))?;

    let mut session = Session::new()
        .map_err(|e| SessionError::Connection(format!("Failed to create SSH session: {}", e)))?;
    session.set_timeout(millis(backstop));
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| {
        SessionError::Connection(format!("SSH handshake with {} failed: {}", address, e))
    })?;

    let connected = ConnectedSession { session, address };
    authenticate(&connected.session, target)?;

    // Command execution is unbounded
    connected.session.set_timeout(0);

    debug!(
        address = %connected.address,
        username = %target.username,
        credential = target.credential.kind(),
        "SSH session authenticated"
    );

    Ok(connected)
}

fn connect_tcp(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err
        .unwrap_or_else(|| io::Error::new(ErrorKind::NotFound, "no addresses to connect to")))
}

fn authenticate(session: &Session, target: &SshTarget) -> Result<(), SessionError> {
    let result = match &target.credential {
        Credential::PrivateKey { pem, passphrase } => {
            session.userauth_pubkey_memory(&target.username, None, pem, passphrase.as_deref())
        }
        Credential::Password(password) => session.userauth_password(&target.username, password),
    };

    result.map_err(|e| {
        SessionError::Connection(format!(
            "Authentication as {} on {} failed: {}",
            target.username,
            target.address(),
            e
        ))
    })?;

    if !session.authenticated() {
        return Err(SessionError::Connection(format!(
            "Authentication as {} on {} was rejected",
            target.username,
            target.address()
        )));
    }

    Ok(())
}

fn run_command(connected: &ConnectedSession, command: &str) -> Result<String, SessionError> {
    let session = &connected.session;
    let address = &connected.address;

    let mut channel = session.channel_session().map_err(|e| {
        SessionError::Execution(format!("Failed to open channel on {}: {}", address, e))
    })?;
    channel.exec(command).map_err(|e| {
        SessionError::Execution(format!("Failed to dispatch command on {}: {}", address, e))
    })?;

    collect_output(&mut LiveChannel { session, channel }, address)
}

/// The parts of an exec channel the output loop drives
trait ExecChannel {
    fn set_blocking(&mut self, blocking: bool);
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn eof(&self) -> bool;
    /// Wait for the remote side to close and report the exit status
    fn exit_status(&mut self) -> io::Result<i32>;
}

struct LiveChannel<'a> {
    session: &'a Session,
    channel: Channel,
}

impl ExecChannel for LiveChannel<'_> {
    fn set_blocking(&mut self, blocking: bool) {
        self.session.set_blocking(blocking);
    }

    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.channel.read(buf)
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.channel.stderr().read(buf)
    }

    fn eof(&self) -> bool {
        self.channel.eof()
    }

    fn exit_status(&mut self) -> io::Result<i32> {
        self.channel.wait_close()?;
        Ok(self.channel.exit_status()?)
    }
}

/// Drain stdout and stderr into one buffer until EOF
///
/// The exit status is logged and never turns into an error.
fn collect_output<C: ExecChannel>(channel: &mut C, address: &str) -> Result<String, SessionError> {
    channel.set_blocking(false);

    let mut output = Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let mut progressed =
            pump(channel.read_stdout(&mut buf), &buf, &mut output).map_err(|e| {
                SessionError::Execution(format!("stdout read failed on {}: {}", address, e))
            })?;
        progressed |= pump(channel.read_stderr(&mut buf), &buf, &mut output).map_err(|e| {
            SessionError::Execution(format!("stderr read failed on {}: {}", address, e))
        })?;

        if channel.eof() {
            break;
        }
        if !progressed {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    channel.set_blocking(true);
    match channel.exit_status() {
        Ok(code) => debug!(address = %address, exit_status = code, "Remote command finished"),
        Err(e) => debug!(address = %address, "Remote command finished without exit status: {}", e),
    }

    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Append the bytes a read placed in `buf` to `output`; `Ok(false)` when
/// nothing was ready
fn pump(read: io::Result<usize>, buf: &[u8], output: &mut Vec<u8>) -> io::Result<bool> {
    match read {
        Ok(0) => Ok(false),
        Ok(n) => {
            output.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
