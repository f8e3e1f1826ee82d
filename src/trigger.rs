//! Top-level event pipeline.
//!
//! Wires the components together and runs the supervised streaming session:
//!
//! 1. replay missed events through the queue (playback),
//! 2. start the stream reader on the transport,
//! 3. run the watchdog and the reconnect controller,
//! 4. drain the queue, driving each event through enrichment, filter, and
//!    report, persisting the playback marker as it goes.
//!
//! The reconnect handshake runs over a single control mailbox owned by one
//! controller thread (the only place the transport session is replaced), so
//! a flapping watchdog cannot race a restart against a reconnect.
//!
//! The consumer is strict: a malformed stream line, a failed enrichment
//! query, or a failed marker write aborts the run with that error rather
//! than silently dropping events.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::connect::{SshConfig, SshTransport, StreamTransport};
use crate::filter::Filter;
use crate::playback::Playback;
use crate::query::Query;
use crate::queue::EventQueue;
use crate::report::Report;
use crate::watchdog::{Control, Watchdog};

const STREAM_COMMAND: &str = "stream-events";

/// How often the consumer checks the shutdown flag while the queue is idle.
const IDLE_POLL: Duration = Duration::from_millis(100);

pub type ParamBundle = HashMap<String, String>;

pub struct Trigger {
    config: Config,
    filter: Filter,
    playback: Playback,
    query: Query,
    queue: EventQueue,
    report: Report,
    transport: Arc<dyn StreamTransport>,
    watchdog: Watchdog,
    shutdown: Arc<AtomicBool>,
}

impl Trigger {
    /// Initialize every component in deterministic order and open the
    /// server connection. Any failure aborts startup.
    pub fn init(config: Config) -> Result<Self> {
        let connect = &config.spec.connect;

        let mut ssh_config = SshConfig::new(
            &connect.hostname,
            connect.ssh.port,
            &connect.ssh.username,
            &connect.ssh.keyfile,
        );
        ssh_config.keyfile_password = connect.ssh.keyfile_password.clone();
        if config.spec.watchdog.timeout_seconds > 0 {
            ssh_config.dial_timeout = Duration::from_secs(config.spec.watchdog.timeout_seconds);
        }

        let transport = SshTransport::new(ssh_config);
        transport.open().context("failed to open transport")?;

        Ok(Self::assemble(config, Arc::new(transport)))
    }

    /// Wire components around an externally managed transport. Used by tests
    /// to substitute a double for the SSH session.
    pub fn with_transport(config: Config, transport: Arc<dyn StreamTransport>) -> Self {
        Self::assemble(config, transport)
    }

    fn assemble(config: Config, transport: Arc<dyn StreamTransport>) -> Self {
        let filter = Filter::new();
        let playback = Playback::new(&config.spec.playback.events_api);
        let query = Query::new();
        let queue = EventQueue::new();
        let report = Report::new(&config.spec.connect.hostname, &config.spec.connect.name);
        let watchdog = Watchdog::from_seconds(
            config.spec.watchdog.period_seconds,
            config.spec.watchdog.timeout_seconds,
        );

        Self {
            config,
            filter,
            playback,
            query,
            queue,
            report,
            transport,
            watchdog,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the signal handler flips to request shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Substitute the playback store (tests point the marker at a temp dir).
    pub fn set_playback(&mut self, playback: Playback) {
        self.playback = playback;
    }

    /// Run the pipeline until shutdown or a consumer error. Empty rule-set
    /// overrides fall back to the configured defaults.
    pub fn run(
        mut self,
        events_override: Vec<config::Event>,
        projects_override: Vec<config::Project>,
        params: Sender<ParamBundle>,
    ) -> Result<()> {
        let events = if events_override.is_empty() {
            self.config.spec.trigger.events.clone()
        } else {
            events_override
        };
        let projects = if projects_override.is_empty() {
            self.config.spec.trigger.projects.clone()
        } else {
            projects_override
        };

        let lines = self
            .queue
            .take_receiver()
            .context("queue already consumed")?;

        // Replay before the live stream attaches so missed events lead.
        if self.playback.enabled() {
            match self.playback.load() {
                Ok(missed) => {
                    for line in missed {
                        self.queue.put(line);
                    }
                }
                Err(err) => warn!(error = %err, "playback replay failed, continuing live"),
            }
        }

        self.transport
            .start(STREAM_COMMAND, self.queue.sender())
            .context("failed to start stream")?;

        let (control_tx, control_rx) = mpsc::channel();
        let watchdog_handle = self.spawn_watchdog(control_tx.clone());
        let controller_handle = self.spawn_controller(control_tx.clone(), control_rx);

        let result = self.consume(&lines, &events, &projects, &params);

        // Reverse-order teardown; safe to repeat.
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = control_tx.send(Control::Stop);
        let _ = watchdog_handle.join();
        let _ = controller_handle.join();
        self.transport.close();

        result
    }

    fn spawn_watchdog(&self, control: Sender<Control>) -> JoinHandle<()> {
        let watchdog = self.watchdog.clone();
        let transport = self.transport.clone();
        let shutdown = self.shutdown.clone();

        thread::spawn(move || {
            watchdog.run(transport.as_ref(), &control, &shutdown);
            debug!("watchdog stopped");
        })
    }

    /// The single owner of transport mutation: reconnects on demand and
    /// restarts the stream once a session is up.
    fn spawn_controller(
        &self,
        control: Sender<Control>,
        signals: Receiver<Control>,
    ) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let sink = self.queue.sender();

        thread::spawn(move || {
            for signal in signals {
                match signal {
                    Control::Reconnect => match transport.reconnect() {
                        Ok(()) => {
                            let _ = control.send(Control::Restart);
                        }
                        Err(err) => {
                            warn!(error = %err, "reconnect failed, waiting for next probe");
                        }
                    },
                    Control::Restart => {
                        if let Err(err) = transport.start(STREAM_COMMAND, sink.clone()) {
                            debug!(error = %err, "restart skipped");
                        }
                    }
                    Control::Stop => break,
                }
            }
            debug!("reconnect controller stopped");
        })
    }

    fn consume(
        &self,
        lines: &Receiver<String>,
        events: &[config::Event],
        projects: &[config::Project],
        params: &Sender<ParamBundle>,
    ) -> Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            let line = match lines.recv_timeout(IDLE_POLL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            self.process_line(&line, events, projects, params)?;
        }

        Ok(())
    }

    fn process_line(
        &self,
        raw: &str,
        events: &[config::Event],
        projects: &[config::Project],
        params: &Sender<ParamBundle>,
    ) -> Result<()> {
        let mut event: crate::events::Event =
            serde_json::from_str(raw).context("failed to decode event")?;

        self.query
            .run(projects, &mut event, self.transport.as_ref())
            .context("failed to enrich event")?;

        if self.filter.run(events, projects, &event) {
            info!(
                event_type = %event.event_type,
                project = %event.project,
                change = event.change.number,
                "event matched"
            );
            let bundle = self.report.run(&event);
            // A closed output channel means the process is going down.
            let _ = params.send(bundle);
        }

        if self.playback.enabled() {
            self.playback
                .store(raw)
                .context("failed to store playback marker")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Match;
    use crate::connect::CommandRunner;
    use crate::playback::MARKER_FILE;
    use anyhow::bail;
    use std::sync::Mutex;

    /// Transport double: `start` feeds canned lines into the sink from a
    /// thread, `run_once` answers enrichment queries with a canned body.
    struct FakeTransport {
        lines: Mutex<Vec<String>>,
        query_reply: Option<String>,
        reconnects: Mutex<u32>,
    }

    impl FakeTransport {
        fn with_lines(lines: &[&str]) -> Self {
            Self {
                lines: Mutex::new(lines.iter().map(|l| l.to_string()).collect()),
                query_reply: None,
                reconnects: Mutex::new(0),
            }
        }

        fn with_query_reply(mut self, reply: &str) -> Self {
            self.query_reply = Some(reply.to_string());
            self
        }
    }

    impl CommandRunner for FakeTransport {
        fn run_once(&self, _cmd: &str) -> Result<String> {
            match &self.query_reply {
                Some(reply) => Ok(reply.clone()),
                None => bail!("no reply configured"),
            }
        }
    }

    impl StreamTransport for FakeTransport {
        fn start(&self, _cmd: &str, sink: Sender<String>) -> Result<()> {
            let lines: Vec<String> = self.lines.lock().unwrap().drain(..).collect();
            thread::spawn(move || {
                for line in lines {
                    if sink.send(line).is_err() {
                        break;
                    }
                }
            });
            Ok(())
        }

        fn reconnect(&self) -> Result<()> {
            *self.reconnects.lock().unwrap() += 1;
            Ok(())
        }

        fn close(&self) {}
    }

    fn rules_config() -> Config {
        let mut config = Config::default();
        config.spec.connect.hostname = "gerrit.example.org".to_string();
        config.spec.connect.name = "example".to_string();
        config.spec.trigger.events = vec![config::Event {
            name: "patchset-created".to_string(),
            ..config::Event::default()
        }];
        config.spec.trigger.projects = vec![config::Project {
            repo: Match::new("test", "plain"),
            branches: vec![Match::new("master", "plain")],
            ..config::Project::default()
        }];
        config
    }

    const PLAIN_EVENT: &str = r#"{"type":"patchset-created","project":"test","change":{"branch":"master","commitMessage":"x","number":1},"patchSet":{"number":1,"revision":"abc"}}"#;

    /// Run a trigger over canned stream lines, collect emitted bundles until
    /// the timeout, then shut down.
    fn run_collect(
        config: Config,
        transport: FakeTransport,
        expect: usize,
    ) -> (Vec<ParamBundle>, Result<()>) {
        let trigger = Trigger::with_transport(config, Arc::new(transport));
        let shutdown = trigger.shutdown_handle();

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || trigger.run(vec![], vec![], tx));

        let mut bundles = Vec::new();
        while bundles.len() < expect {
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(bundle) => bundles.push(bundle),
                Err(_) => break,
            }
        }
        // Allow a late unexpected bundle to surface before stopping.
        if expect == 0 {
            if let Ok(bundle) = rx.recv_timeout(Duration::from_millis(300)) {
                bundles.push(bundle);
            }
        }

        shutdown.store(true, Ordering::Relaxed);
        let result = worker.join().unwrap();

        (bundles, result)
    }

    #[test]
    fn plain_passthrough_emits_parameters() {
        let transport = FakeTransport::with_lines(&[PLAIN_EVENT]);

        let (bundles, result) = run_collect(rules_config(), transport, 1);

        result.unwrap();
        assert_eq!(bundles.len(), 1);
        let bundle = &bundles[0];
        assert_eq!(bundle["GERRIT_PROJECT"], "test");
        assert_eq!(bundle["GERRIT_EVENT_TYPE"], "patchset-created");
        assert_eq!(bundle["GERRIT_CHANGE_NUMBER"], "1");
        assert_eq!(bundle["GERRIT_HOST"], "gerrit.example.org");
    }

    #[test]
    fn wip_exclusion_vetoes_output() {
        let mut config = rules_config();
        config.spec.trigger.events[0].exclude_wip_changes = true;

        let line = r#"{"type":"patchset-created","project":"test","change":{"branch":"master","commitMessage":"x","number":1,"wip":true},"patchSet":{"number":1,"revision":"abc"}}"#;
        let transport = FakeTransport::with_lines(&[line]);

        let (bundles, result) = run_collect(config, transport, 0);

        result.unwrap();
        assert!(bundles.is_empty());
    }

    #[test]
    fn forbidden_file_vetoes_after_enrichment() {
        let mut config = rules_config();
        config.spec.trigger.projects[0].forbidden_file_paths =
            vec![Match::new("**/secrets.yml", "path")];

        let reply = concat!(
            r#"{"project":"test","number":1,"currentPatchSet":"#,
            r#"{"number":1,"revision":"abc","files":[{"file":"a/secrets.yml","type":"ADDED"}]}}"#,
            "\n",
            r#"{"type":"stats","rowCount":1}"#
        );
        let transport = FakeTransport::with_lines(&[PLAIN_EVENT]).with_query_reply(reply);

        let (bundles, result) = run_collect(config, transport, 0);

        result.unwrap();
        assert!(bundles.is_empty());
    }

    #[test]
    fn file_path_rule_enriches_then_matches() {
        let mut config = rules_config();
        config.spec.trigger.projects[0].file_paths = vec![Match::new("**/README.md", "path")];

        let reply = concat!(
            r#"{"project":"test","number":1,"currentPatchSet":"#,
            r#"{"number":3,"revision":"abc","files":[{"file":"README.md","type":"MODIFIED"}]}}"#,
            "\n",
            r#"{"type":"stats","rowCount":1}"#
        );
        let transport = FakeTransport::with_lines(&[PLAIN_EVENT]).with_query_reply(reply);

        let (bundles, result) = run_collect(config, transport, 1);

        result.unwrap();
        assert_eq!(bundles.len(), 1);
        // The enriched patch set replaced the one on the wire.
        assert_eq!(bundles[0]["GERRIT_PATCHSET_NUMBER"], "3");
    }

    #[test]
    fn malformed_line_aborts_the_consumer() {
        let transport = FakeTransport::with_lines(&["not json"]);

        let trigger = Trigger::with_transport(rules_config(), Arc::new(transport));
        let (tx, _rx) = mpsc::channel();

        let err = trigger.run(vec![], vec![], tx).unwrap_err();
        assert!(err.to_string().contains("failed to decode event"));
    }

    #[test]
    fn overrides_replace_configured_rules() {
        let transport = FakeTransport::with_lines(&[PLAIN_EVENT]);
        let trigger = Trigger::with_transport(rules_config(), Arc::new(transport));
        let shutdown = trigger.shutdown_handle();

        // Override with a rule set that cannot match the event.
        let events = vec![config::Event {
            name: "change-merged".to_string(),
            ..config::Event::default()
        }];

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || trigger.run(events, vec![], tx));

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        shutdown.store(true, Ordering::Relaxed);
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn watchdog_failure_drives_reconnect_and_restart() {
        use std::time::Instant;

        let mut config = rules_config();
        config.spec.watchdog.period_seconds = 1;
        config.spec.watchdog.timeout_seconds = 1;

        // No canned probe reply: every `gerrit version` fails.
        let transport = Arc::new(FakeTransport::with_lines(&[]));
        let trigger = Trigger::with_transport(config, transport.clone());
        let shutdown = trigger.shutdown_handle();

        let (tx, _rx) = mpsc::channel();
        let worker = thread::spawn(move || trigger.run(vec![], vec![], tx));

        // After one period plus one timeout the controller must have dialed
        // a fresh session.
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && *transport.reconnects.lock().unwrap() == 0 {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(*transport.reconnects.lock().unwrap() > 0);

        shutdown.store(true, Ordering::Relaxed);
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn processed_events_update_the_playback_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join(MARKER_FILE);

        let transport = FakeTransport::with_lines(&[PLAIN_EVENT]);
        let mut trigger = Trigger::with_transport(rules_config(), Arc::new(transport));
        trigger.set_playback(Playback::with_marker(
            "http://localhost:1/unreachable-events-api",
            marker.clone(),
        ));
        let shutdown = trigger.shutdown_handle();

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || trigger.run(vec![], vec![], tx));

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        // The marker write races the bundle emit; give the consumer a beat.
        thread::sleep(Duration::from_millis(100));

        shutdown.store(true, Ordering::Relaxed);
        worker.join().unwrap().unwrap();

        assert!(marker.exists());
    }
}
