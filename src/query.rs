//! On-demand patch-set enrichment.
//!
//! File-path predicates need the list of files touched by the current patch
//! set, which most stream events do not carry. When the rule set contains
//! such predicates, the event's patch set is replaced with the result of a
//! server-side `gerrit query --current-patch-set --files` before filtering.

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config;
use crate::connect::CommandRunner;
use crate::events::{Event, PatchSet};

/// The query response is the change record plus a trailing stats record.
const RESPONSE_LINES: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid count")]
    InvalidCount,
    #[error("invalid patchset")]
    InvalidPatchSet,
}

#[derive(Debug, Default)]
pub struct Query;

impl Query {
    pub fn new() -> Self {
        Self
    }

    /// Enrich `event.patch_set` in place when file-path predicates demand
    /// it; otherwise leave the event untouched.
    pub fn run(
        &self,
        projects: &[config::Project],
        event: &mut Event,
        transport: &dyn CommandRunner,
    ) -> Result<()> {
        let wanted = projects
            .iter()
            .any(|p| !p.file_paths.is_empty() || !p.forbidden_file_paths.is_empty());
        if !wanted {
            return Ok(());
        }

        let Some(term) = search_term(event) else {
            return Ok(());
        };

        debug!(term = %term, "querying current patch set");

        let buf = transport
            .run_once(&format!(
                "query --current-patch-set --files --format=JSON limit:1 {term}"
            ))
            .context("failed to query")?;
        if buf.is_empty() {
            return Ok(());
        }

        event.patch_set = parse(&buf).context("failed to parse")?;

        Ok(())
    }
}

/// Prefer the exact commit; fall back to the change number; with neither
/// there is nothing to ask the server.
fn search_term(event: &Event) -> Option<String> {
    if !event.patch_set.revision.is_empty() {
        Some(format!(
            "project:{} commit:{}",
            event.project, event.patch_set.revision
        ))
    } else if event.change.number > 0 {
        Some(format!(
            "project:{} change:{}",
            event.project, event.change.number
        ))
    } else {
        None
    }
}

fn parse(data: &str) -> Result<PatchSet> {
    let lines: Vec<&str> = data.trim_matches('\n').split('\n').collect();
    if lines.len() != RESPONSE_LINES {
        return Err(QueryError::InvalidCount.into());
    }

    let record: Value =
        serde_json::from_str(lines[0]).context("failed to decode change record")?;

    let current = record
        .get("currentPatchSet")
        .ok_or(QueryError::InvalidPatchSet)?;

    serde_json::from_value(current.clone()).context("failed to decode patch set")
}
