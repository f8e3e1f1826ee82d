//! Declarative trigger configuration, loaded once at startup.
//!
//! A single YAML file describes the Gerrit connection, the playback catch-up
//! endpoint, the watchdog cadence, and the rule set (event predicates and
//! project predicates) the filter evaluates against every stream event.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const MATCH_PATH: &str = "path";
pub const MATCH_PLAIN: &str = "plain";
pub const MATCH_REGEXP: &str = "regexp";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub api_version: String,
    pub kind: String,
    #[serde(rename = "metadata")]
    pub meta_data: MetaData,
    pub spec: Spec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetaData {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Spec {
    pub connect: Connect,
    pub playback: Playback,
    pub trigger: Trigger,
    pub watchdog: Watchdog,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Connect {
    pub frontend_url: String,
    pub hostname: String,
    pub name: String,
    pub http: Http,
    pub ssh: Ssh,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Http {
    pub password: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ssh {
    pub keyfile: String,
    pub keyfile_password: String,
    pub port: u16,
    pub username: String,
}

impl Default for Ssh {
    fn default() -> Self {
        Self {
            keyfile: String::new(),
            keyfile_password: String::new(),
            port: default_ssh_port(),
            username: String::new(),
        }
    }
}

fn default_ssh_port() -> u16 {
    29418
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Playback {
    pub events_api: String,
}

impl Playback {
    /// Playback is active iff an events API endpoint is configured.
    pub fn enabled(&self) -> bool {
        !self.events_api.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Trigger {
    pub events: Vec<Event>,
    pub projects: Vec<Project>,
}

/// One event predicate. Conditions inside a predicate are AND-combined;
/// predicates in the list are OR-combined.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    pub name: String,
    pub commit_message: String,
    pub uploader_name: String,
    pub exclude_drafts: bool,
    pub exclude_no_code_change: bool,
    pub exclude_private_changes: bool,
    pub exclude_trivial_rebase: bool,
    #[serde(rename = "excludeWIPChanges")]
    pub exclude_wip_changes: bool,
    pub comment_added: CommentAdded,
    pub comment_added_regex: String,
}

/// Vote condition for `comment-added` predicates. Empty fields disable the
/// condition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentAdded {
    pub verdict_category: String,
    pub value: String,
}

/// One project predicate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub repo: Match,
    pub branches: Vec<Match>,
    pub file_paths: Vec<Match>,
    pub forbidden_file_paths: Vec<Match>,
    pub topics: Vec<Match>,
}

/// A single pattern with its dialect: `path`, `plain`, or `regexp`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Match {
    pub pattern: String,
    #[serde(rename = "type")]
    pub match_type: String,
}

impl Match {
    pub fn new(pattern: &str, match_type: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            match_type: match_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Watchdog {
    pub period_seconds: u64,
    pub timeout_seconds: u64,
}

impl Config {
    /// Load and decode the YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&buf)
            .with_context(|| format!("failed to decode config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
apiVersion: v1
kind: trigger
metadata:
  name: gerrit-trigger
spec:
  connect:
    frontendUrl: https://gerrit.example.org
    hostname: gerrit.example.org
    name: example
    http:
      username: reader
      password: hunter2
    ssh:
      keyfile: /home/ci/.ssh/id_ed25519
      keyfilePassword: ""
      port: 29418
      username: ci
  playback:
    eventsApi: https://gerrit.example.org/plugins/events-log/events/
  trigger:
    events:
      - name: patchset-created
        excludeDrafts: true
        excludeWIPChanges: true
      - name: comment-added
        commentAdded:
          verdictCategory: Code-Review
          value: "2"
    projects:
      - repo:
          pattern: platform/tools
          type: plain
        branches:
          - pattern: "**/master"
            type: path
        filePaths:
          - pattern: "src/**"
            type: path
  watchdog:
    periodSeconds: 30
    timeoutSeconds: 10
"#;

    #[test]
    fn load_sample_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.api_version, "v1");
        assert_eq!(config.meta_data.name, "gerrit-trigger");
        assert_eq!(config.spec.connect.hostname, "gerrit.example.org");
        assert_eq!(config.spec.connect.ssh.port, 29418);
        assert_eq!(config.spec.watchdog.period_seconds, 30);
        assert!(config.spec.playback.enabled());

        let events = &config.spec.trigger.events;
        assert_eq!(events.len(), 2);
        assert!(events[0].exclude_drafts);
        assert!(events[0].exclude_wip_changes);
        assert_eq!(events[1].comment_added.verdict_category, "Code-Review");
        assert_eq!(events[1].comment_added.value, "2");

        let projects = &config.spec.trigger.projects;
        assert_eq!(projects[0].repo.pattern, "platform/tools");
        assert_eq!(projects[0].branches[0].match_type, "path");
    }

    #[test]
    fn load_missing_file_fails() {
        let err = Config::load(Path::new("/nonexistent/trigger.yml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn load_malformed_yaml_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"spec: [not, a, mapping").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to decode config file"));
    }

    #[test]
    fn defaults_when_sections_absent() {
        let config: Config = serde_yaml::from_str("apiVersion: v1").unwrap();
        assert_eq!(config.spec.connect.ssh.port, 29418);
        assert_eq!(config.spec.watchdog.period_seconds, 0);
        assert!(!config.spec.playback.enabled());
        assert!(config.spec.trigger.events.is_empty());
    }
}
