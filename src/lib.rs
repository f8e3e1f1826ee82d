//! Gerrit stream-events trigger.
//!
//! Listens to a Gerrit server's event stream over SSH, filters events
//! against a declarative rule set, enriches them with patch-set file lists
//! when file-path rules demand it, and emits one parameter bundle per
//! matched event for a downstream CI orchestrator. A watchdog supervises
//! the session and drives reconnects; a playback marker replays events
//! missed across restarts.

pub mod cli;
pub mod config;
pub mod connect;
pub mod events;
pub mod filter;
pub mod matcher;
pub mod params;
pub mod playback;
pub mod query;
pub mod queue;
pub mod report;
pub mod trigger;
pub mod watchdog;
