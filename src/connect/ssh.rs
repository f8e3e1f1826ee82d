//! Persistent SSH session executing Gerrit server-side commands.
//!
//! One authenticated session serves three uses: the long-lived
//! `gerrit stream-events` reader, the watchdog's `gerrit version` probe, and
//! the enrichment `gerrit query`. Short commands open their own exec channel
//! on the shared session and serialize through the transport's lock; the
//! stream reader owns its channel on a dedicated thread and terminates
//! silently on read errors; the watchdog notices the dead session and asks
//! for a reconnect.
//!
//! Host keys are accepted without verification (trust on first use). Strict
//! checking is a documented hardening item.

use std::io::{BufRead, BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// Server-side commands are namespaced under the `gerrit` top-level command.
const COMMAND_PREFIX: &str = "gerrit ";

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Run-to-completion commands over the server connection. Seam for watchdog
/// and enrichment test doubles.
pub trait CommandRunner: Send + Sync {
    /// Execute `gerrit <cmd>` and return its combined stdout+stderr.
    fn run_once(&self, cmd: &str) -> Result<String>;
}

/// The full transport surface the pipeline drives: one long-lived streaming
/// command plus short probe/query commands, with reconnect support.
pub trait StreamTransport: CommandRunner {
    /// Start `gerrit <cmd>` and scan its output lines into `sink`. At most
    /// one streaming command per session; a second start fails until the
    /// session is reconnected or the reader terminates.
    fn start(&self, cmd: &str, sink: Sender<String>) -> Result<()>;

    /// Drop the current session and dial a fresh one.
    fn reconnect(&self) -> Result<()>;

    /// Close the session. Idempotent.
    fn close(&self);
}

#[derive(Debug, Clone)]
pub struct SshConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub keyfile: PathBuf,
    pub keyfile_password: String,
    /// TCP dial timeout; the watchdog's `timeoutSeconds` when configured.
    pub dial_timeout: Duration,
}

impl SshConfig {
    pub fn new(hostname: &str, port: u16, username: &str, keyfile: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            port,
            username: username.to_string(),
            keyfile: PathBuf::from(keyfile),
            keyfile_password: String::new(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

pub struct SshTransport {
    cfg: SshConfig,
    session: Mutex<Option<ssh2::Session>>,
    streaming: Arc<AtomicBool>,
}

impl SshTransport {
    pub fn new(cfg: SshConfig) -> Self {
        Self {
            cfg,
            session: Mutex::new(None),
            streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Dial the server and authenticate. Retains the session for `start`,
    /// `run_once`, and `reconnect`.
    pub fn open(&self) -> Result<()> {
        let session = self.dial()?;
        *self.session.lock().unwrap() = Some(session);
        Ok(())
    }

    fn dial(&self) -> Result<ssh2::Session> {
        let address = self.cfg.address();

        let addr = address
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve {address}"))?
            .next()
            .with_context(|| format!("no address for {address}"))?;

        debug!(address = %address, "dialing");

        let tcp = TcpStream::connect_timeout(&addr, self.cfg.dial_timeout)
            .with_context(|| format!("failed to connect to {address}"))?;

        let mut session = ssh2::Session::new().context("failed to create session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("failed to handshake")?;

        let passphrase = if self.cfg.keyfile_password.is_empty() {
            None
        } else {
            Some(self.cfg.keyfile_password.as_str())
        };

        session
            .userauth_pubkey_file(&self.cfg.username, None, &self.cfg.keyfile, passphrase)
            .with_context(|| {
                format!("failed to authenticate with key {}", self.cfg.keyfile.display())
            })?;

        Ok(session)
    }
}

impl StreamTransport for SshTransport {
    /// Spawn a reader thread that scans the command's output lines into
    /// `sink`. Stderr is merged into the stream, so diagnostic lines arrive
    /// interleaved with events; the consumer decides what to do with them.
    /// The reader terminates when its channel EOFs or errors, or when the
    /// consumer goes away.
    fn start(&self, cmd: &str, sink: Sender<String>) -> Result<()> {
        let guard = self.session.lock().unwrap();
        let session = guard.as_ref().context("invalid session")?;

        if self.streaming.swap(true, Ordering::SeqCst) {
            bail!("session already streaming");
        }

        let channel = (|| {
            let mut channel = session
                .channel_session()
                .context("failed to create channel")?;
            channel
                .handle_extended_data(ssh2::ExtendedData::Merge)
                .context("failed to merge stderr")?;
            channel
                .exec(&format!("{COMMAND_PREFIX}{cmd}"))
                .context("failed to start command")?;
            Ok::<_, anyhow::Error>(channel)
        })();

        let channel = match channel {
            Ok(channel) => channel,
            Err(err) => {
                self.streaming.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let command = cmd.to_string();
        let streaming = self.streaming.clone();
        thread::Builder::new()
            .name("stream-reader".to_string())
            .spawn(move || {
                let reader = BufReader::new(channel);
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if sink.send(line).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            debug!(command = %command, error = %err, "stream reader stopped");
                            break;
                        }
                    }
                }
                streaming.store(false, Ordering::SeqCst);
            })
            .context("failed to spawn reader thread")?;

        Ok(())
    }

    /// Drop the current session (if any) and dial a fresh one. Idempotent:
    /// safe to call in any state.
    fn reconnect(&self) -> Result<()> {
        let mut guard = self.session.lock().unwrap();

        if let Some(old) = guard.take() {
            let _ = old.disconnect(None, "reconnect", None);
        }

        *guard = Some(self.dial()?);
        self.streaming.store(false, Ordering::SeqCst);
        info!(host = %self.cfg.address(), "reconnected");

        Ok(())
    }

    fn close(&self) {
        if let Some(session) = self.session.lock().unwrap().take() {
            let _ = session.disconnect(None, "shutdown", None);
        }
    }
}

impl CommandRunner for SshTransport {
    fn run_once(&self, cmd: &str) -> Result<String> {
        let guard = self.session.lock().unwrap();
        let session = guard.as_ref().context("invalid session")?;

        let mut channel = session
            .channel_session()
            .context("failed to create channel")?;
        channel
            .handle_extended_data(ssh2::ExtendedData::Merge)
            .context("failed to merge stderr")?;
        channel
            .exec(&format!("{COMMAND_PREFIX}{cmd}"))
            .context("failed to run command")?;

        let mut out = String::new();
        channel
            .read_to_string(&mut out)
            .context("failed to read command output")?;

        channel.wait_close().context("failed to close channel")?;
        let status = channel.exit_status().context("failed to read exit status")?;
        if status != 0 {
            bail!("command exited with status {status}");
        }

        Ok(out)
    }
}
