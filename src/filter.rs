//! Two-stage declarative event filter.
//!
//! A rule set is a list of event predicates and a list of project predicates.
//! An event matches when at least one event predicate passes AND at least one
//! project predicate passes. Conditions inside a single predicate are
//! AND-combined; an empty rule list never matches.

use tracing::debug;

use crate::config;
use crate::events::{self, Event};
use crate::matcher;

const STATUS_DRAFT: &str = "DRAFT";
const KIND_NO_CODE_CHANGE: &str = "NO_CODE_CHANGE";
const KIND_TRIVIAL_REBASE: &str = "TRIVIAL_REBASE";

#[derive(Debug, Default)]
pub struct Filter;

impl Filter {
    pub fn new() -> Self {
        Self
    }

    /// Verdict for one event against the full rule set.
    pub fn run(
        &self,
        events_cfg: &[config::Event],
        projects_cfg: &[config::Project],
        event: &Event,
    ) -> bool {
        if events_cfg.is_empty() || projects_cfg.is_empty() {
            return false;
        }

        self.filter_events(events_cfg, event) && self.filter_projects(projects_cfg, event)
    }

    fn filter_events(&self, cfg: &[config::Event], event: &Event) -> bool {
        cfg.iter().any(|predicate| {
            let hit = self.event_matches(predicate, event);
            if hit {
                debug!(name = %predicate.name, "event predicate matched");
            }
            hit
        })
    }

    fn filter_projects(&self, cfg: &[config::Project], event: &Event) -> bool {
        cfg.iter().any(|predicate| {
            let hit = self.project_matches(predicate, event);
            if hit {
                debug!(repo = %predicate.repo.pattern, "project predicate matched");
            }
            hit
        })
    }

    fn event_matches(&self, predicate: &config::Event, event: &Event) -> bool {
        if predicate.name.is_empty() || predicate.name != event.event_type {
            return false;
        }

        match event.event_type.as_str() {
            events::COMMENT_ADDED => self.comment_added(predicate, event),
            events::PATCHSET_CREATED => self.patchset_created(predicate, event),
            // Any other type: the name match is the whole condition.
            _ => true,
        }
    }

    /// `comment-added` passes on a configured vote or a comment-body match.
    /// An empty sub-condition is disabled and contributes no match.
    fn comment_added(&self, predicate: &config::Event, event: &Event) -> bool {
        let vote = &predicate.comment_added;
        if !vote.verdict_category.is_empty() && !vote.value.is_empty() {
            let hit = event.approvals.iter().any(|approval| {
                approval.approval_type == vote.verdict_category && approval.value == vote.value
            });
            if hit {
                return true;
            }
        }

        !predicate.comment_added_regex.is_empty()
            && matcher::regex_matches(&predicate.comment_added_regex, &event.comment)
    }

    /// `patchset-created` passes when the commit-message and uploader
    /// patterns hold and no exclusion gate fires. A gate fires when the
    /// event carries the excluded state and the predicate enables the gate.
    fn patchset_created(&self, predicate: &config::Event, event: &Event) -> bool {
        let drafts = event.change.status == STATUS_DRAFT || event.patch_set.is_draft;
        if drafts && predicate.exclude_drafts {
            return false;
        }

        if event.patch_set.kind == KIND_NO_CODE_CHANGE && predicate.exclude_no_code_change {
            return false;
        }

        if event.change.private && predicate.exclude_private_changes {
            return false;
        }

        if event.patch_set.kind == KIND_TRIVIAL_REBASE && predicate.exclude_trivial_rebase {
            return false;
        }

        if event.change.wip && predicate.exclude_wip_changes {
            return false;
        }

        self.commit_message(predicate, event) && self.uploader_name(predicate, event)
    }

    fn commit_message(&self, predicate: &config::Event, event: &Event) -> bool {
        if predicate.commit_message.is_empty() {
            return true;
        }

        matcher::regex_matches(&predicate.commit_message, &event.change.commit_message)
    }

    /// The uploader pattern may match either the event-level uploader or the
    /// patch-set uploader.
    fn uploader_name(&self, predicate: &config::Event, event: &Event) -> bool {
        if predicate.uploader_name.is_empty() {
            return true;
        }

        matcher::regex_matches(&predicate.uploader_name, &event.uploader.name)
            || matcher::regex_matches(&predicate.uploader_name, &event.patch_set.uploader.name)
    }

    fn project_matches(&self, predicate: &config::Project, event: &Event) -> bool {
        if !matcher::matches(
            &predicate.repo.pattern,
            &predicate.repo.match_type,
            &event.project,
        ) {
            return false;
        }

        if !self.branches(predicate, event) {
            return false;
        }

        self.file_paths(predicate, event)
            && !self.forbidden_file_paths(predicate, event)
            && self.topics(predicate, event)
    }

    /// At least one branch pattern is required; an empty list never matches.
    fn branches(&self, predicate: &config::Project, event: &Event) -> bool {
        predicate
            .branches
            .iter()
            .any(|m| matcher::matches(&m.pattern, &m.match_type, &event.change.branch))
    }

    fn file_paths(&self, predicate: &config::Project, event: &Event) -> bool {
        if predicate.file_paths.is_empty() {
            return true;
        }

        predicate
            .file_paths
            .iter()
            .any(|m| self.any_file(m, event))
    }

    /// True when a forbidden pattern matches some file: the caller vetoes.
    fn forbidden_file_paths(&self, predicate: &config::Project, event: &Event) -> bool {
        predicate
            .forbidden_file_paths
            .iter()
            .any(|m| self.any_file(m, event))
    }

    fn topics(&self, predicate: &config::Project, event: &Event) -> bool {
        if predicate.topics.is_empty() {
            return true;
        }

        predicate
            .topics
            .iter()
            .any(|m| matcher::matches(&m.pattern, &m.match_type, &event.change.topic))
    }

    fn any_file(&self, m: &config::Match, event: &Event) -> bool {
        event
            .patch_set
            .files
            .iter()
            .any(|f| matcher::matches(&m.pattern, &m.match_type, &f.file))
    }
}
