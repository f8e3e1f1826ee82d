//! Catch-up replay of events missed while the trigger was offline.
//!
//! Every processed event overwrites a one-line marker file holding the raw
//! event, base64-encoded. On startup the marker's `eventCreatedOn` anchors a
//! wall-clock query window against the events-log HTTP API; the returned
//! bodies are replayed through the regular queue before the live stream
//! attaches. The window is inclusive, so downstream must tolerate seeing the
//! tail events again.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Local, TimeZone};
use serde::Deserialize;
use tracing::{debug, info};

use crate::events::Event;

pub const MARKER_FILE: &str = "events-base64.playback";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackRecord {
    event_base64: String,
    #[allow(dead_code)]
    event_created_on: i64,
}

pub struct Playback {
    events_api: String,
    marker: PathBuf,
    agent: ureq::Agent,
}

impl Playback {
    pub fn new(events_api: &str) -> Self {
        Self::with_marker(events_api, PathBuf::from(MARKER_FILE))
    }

    pub fn with_marker(events_api: &str, marker: PathBuf) -> Self {
        Self {
            events_api: events_api.to_string(),
            marker,
            agent: ureq::agent(),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.events_api.trim().is_empty()
    }

    /// Overwrite the marker with this raw event line.
    pub fn store(&self, raw: &str) -> Result<()> {
        fs::write(&self.marker, BASE64.encode(raw))
            .with_context(|| format!("failed to write marker: {}", self.marker.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.marker, fs::Permissions::from_mode(0o644))
                .with_context(|| format!("failed to chmod marker: {}", self.marker.display()))?;
        }

        Ok(())
    }

    /// Raw bodies of events missed since the marker, in server order. An
    /// absent marker means a first run: nothing to replay.
    pub fn load(&self) -> Result<Vec<String>> {
        let Some(marker) = self.load_marker()? else {
            return Ok(Vec::new());
        };

        let window = query_window(marker.event_created_on);
        debug!(window = %window, "replaying missed events");

        let records: Vec<PlaybackRecord> = self
            .agent
            .get(&self.events_api)
            .query("q", &window)
            .call()
            .context("failed to query events api")?
            .into_json()
            .context("failed to decode events api response")?;

        let replayed = decode_records(records)?;
        info!(count = replayed.len(), "playback events loaded");

        Ok(replayed)
    }

    fn load_marker(&self) -> Result<Option<Event>> {
        let encoded = match fs::read_to_string(&self.marker) {
            Ok(encoded) => encoded,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read marker: {}", self.marker.display())
                });
            }
        };

        let raw = BASE64
            .decode(encoded.trim())
            .context("failed to decode marker")?;
        let event: Event =
            serde_json::from_slice(&raw).context("failed to decode marker event")?;

        Ok(Some(event))
    }
}

/// `since:<marker + 1s> until:<now>`, local time. One second past the marker
/// keeps the already-processed event out of the window on servers with
/// second-granularity timestamps.
fn query_window(last_created_on: i64) -> String {
    let since = Local
        .timestamp_opt(last_created_on + 1, 0)
        .single()
        .unwrap_or_else(Local::now);
    let until = Local::now();

    format!(
        "since:{} until:{}",
        since.format(TIME_FORMAT),
        until.format(TIME_FORMAT)
    )
}

fn decode_records(records: Vec<PlaybackRecord>) -> Result<Vec<String>> {
    records
        .into_iter()
        .map(|record| {
            let raw = BASE64
                .decode(&record.event_base64)
                .context("failed to decode replayed event")?;
            String::from_utf8(raw).context("replayed event is not utf-8")
        })
        .collect()
}
