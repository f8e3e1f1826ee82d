//! Liveness watchdog for the streaming session.
//!
//! Every period the watchdog runs `gerrit version` over the transport and
//! checks the reply prefix. A dead or misbehaving server fails the probe;
//! after the grace timeout the watchdog asks the reconnect controller for a
//! fresh session. The controller answers a successful reconnect with a
//! `Restart`, which relaunches the stream reader.
//!
//! With a zero period or timeout the watchdog is disabled: it emits a single
//! `Restart` (so the stream still starts) and returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::connect::CommandRunner;

const VERSION_PREFIX: &str = "gerrit version";

/// Signals of the reconnect handshake, carried on one control mailbox so a
/// single controller serializes all transport mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// The session looks dead; dial a new one.
    Reconnect,
    /// A session is up; start the stream command on it.
    Restart,
    /// Shutdown requested; stop serializing further signals.
    Stop,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    period: Duration,
    timeout: Duration,
}

impl Watchdog {
    pub fn new(period: Duration, timeout: Duration) -> Self {
        Self { period, timeout }
    }

    pub fn from_seconds(period_seconds: u64, timeout_seconds: u64) -> Self {
        Self::new(
            Duration::from_secs(period_seconds),
            Duration::from_secs(timeout_seconds),
        )
    }

    /// Probe until shutdown. Returns when the shutdown flag is set or the
    /// controller has gone away.
    pub fn run(
        &self,
        transport: &dyn CommandRunner,
        control: &Sender<Control>,
        shutdown: &Arc<AtomicBool>,
    ) {
        if self.period.is_zero() || self.timeout.is_zero() {
            debug!("watchdog disabled");
            let _ = control.send(Control::Restart);
            return;
        }

        while !shutdown.load(Ordering::Relaxed) {
            if !sleep_unless(self.period, shutdown) {
                return;
            }

            if self.check(transport) {
                continue;
            }

            warn!("liveness probe failed, requesting reconnect");
            if !sleep_unless(self.timeout, shutdown) {
                return;
            }
            if control.send(Control::Reconnect).is_err() {
                return;
            }
        }
    }

    fn check(&self, transport: &dyn CommandRunner) -> bool {
        match transport.run_once("version") {
            Ok(out) => out.starts_with(VERSION_PREFIX),
            Err(err) => {
                debug!(error = %err, "version probe error");
                false
            }
        }
    }
}

/// Sleep in short slices so shutdown is honored promptly. Returns false when
/// shutdown was requested mid-sleep.
fn sleep_unless(duration: Duration, shutdown: &Arc<AtomicBool>) -> bool {
    const SLICE: Duration = Duration::from_millis(50);

    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(SLICE.min(deadline.saturating_duration_since(Instant::now())));
    }

    !shutdown.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use std::sync::Mutex;
    use std::sync::mpsc;

    struct FakeTransport {
        replies: Mutex<Vec<Result<String>>>,
    }

    impl FakeTransport {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    impl CommandRunner for FakeTransport {
        fn run_once(&self, cmd: &str) -> Result<String> {
            assert_eq!(cmd, "version");
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                bail!("no more replies");
            }
            replies.remove(0)
        }
    }

    #[test]
    fn disabled_watchdog_emits_one_restart() {
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = FakeTransport::new(vec![]);

        Watchdog::from_seconds(0, 10).run(&transport, &tx, &shutdown);
        drop(tx);

        let signals: Vec<Control> = rx.iter().collect();
        assert_eq!(signals, vec![Control::Restart]);
    }

    #[test]
    fn failed_probe_requests_reconnect() {
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = FakeTransport::new(vec![Ok("not-gerrit".to_string())]);

        let watchdog = Watchdog::new(Duration::from_millis(10), Duration::from_millis(10));
        let flag = shutdown.clone();
        let handle = thread::spawn(move || watchdog.run(&transport, &tx, &flag));

        let signal = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(signal, Control::Reconnect);

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn transport_error_counts_as_failure() {
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = FakeTransport::new(vec![]);

        let watchdog = Watchdog::new(Duration::from_millis(10), Duration::from_millis(10));
        let flag = shutdown.clone();
        let handle = thread::spawn(move || watchdog.run(&transport, &tx, &flag));

        let signal = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(signal, Control::Reconnect);

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn healthy_probe_stays_quiet() {
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = FakeTransport::new(
            (0..64).map(|_| Ok("gerrit version 3.9.1".to_string())).collect(),
        );

        let watchdog = Watchdog::new(Duration::from_millis(5), Duration::from_millis(5));
        let flag = shutdown.clone();
        let handle = thread::spawn(move || watchdog.run(&transport, &tx, &flag));

        thread::sleep(Duration::from_millis(25));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shutdown_interrupts_the_period_sleep() {
        let (tx, _rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let transport = FakeTransport::new(vec![]);

        let watchdog = Watchdog::new(Duration::from_secs(3600), Duration::from_secs(3600));
        let flag = shutdown.clone();
        let handle = thread::spawn(move || watchdog.run(&transport, &tx, &flag));

        thread::sleep(Duration::from_millis(20));
        shutdown.store(true, Ordering::Relaxed);

        let start = Instant::now();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
