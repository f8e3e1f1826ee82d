//! Typed representation of Gerrit stream events.
//!
//! Mirrors the JSON emitted by `gerrit stream-events` and by
//! `gerrit query --format=JSON`. Missing keys decode to their default value
//! so the filter can read nested fields without unwrapping at every step.
//!
//! <https://gerrit-review.googlesource.com/Documentation/cmd-stream-events.html#events>

use serde::{Deserialize, Serialize};

pub const CHANGE_ABANDONED: &str = "change-abandoned";
pub const CHANGE_MERGED: &str = "change-merged";
pub const CHANGE_RESTORED: &str = "change-restored";
pub const COMMENT_ADDED: &str = "comment-added";
pub const DRAFT_PUBLISHED: &str = "draft-published";
pub const HASHTAGS_CHANGED: &str = "hashtags-changed";
pub const MERGE_FAILED: &str = "merge-failed";
pub const PATCHSET_CREATED: &str = "patchset-created";
pub const PATCHSET_NOTIFIED: &str = "patchset-notified";
pub const PRIVATE_STATE_CHANGED: &str = "private-state-changed";
pub const PROJECT_CREATED: &str = "project-created";
pub const REF_REPLICATED: &str = "ref-replicated";
pub const REF_REPLICATED_DONE: &str = "ref-replicated-done";
pub const REF_UPDATED: &str = "ref-updated";
pub const RERUN_CHECK: &str = "rerun-check";
pub const REVIEWER_ADDED: &str = "reviewer-added";
pub const TOPIC_CHANGED: &str = "topic-changed";
pub const VOTE_DELETED: &str = "vote-deleted";
pub const WIP_STATE_CHANGED: &str = "wip-state-changed";

/// One event from the stream, tagged by `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,

    pub change: Change,
    pub patch_set: PatchSet,
    pub approvals: Vec<Approval>,

    pub abandoner: Account,
    pub changer: Account,
    pub submitter: Account,
    pub restorer: Account,
    pub author: Account,
    pub uploader: Account,
    pub editor: Account,
    pub reviewer: Account,

    pub new_rev: String,
    pub old_assignee: String,
    pub old_topic: String,
    pub reason: String,
    pub comment: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    #[serde(rename = "hashtags")]
    pub hash_tags: Vec<String>,
    pub project_name: String,
    pub project_head: String,
    pub project: String,
    pub ref_name: String,
    pub ref_update: RefUpdate,
    pub change_key: ChangeKey,

    pub event_created_on: i64,
}

/// The change under review.
///
/// <https://gerrit-review.googlesource.com/Documentation/json.html#change>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Change {
    pub project: String,
    pub branch: String,
    pub topic: String,
    pub id: String,
    pub number: u32,
    pub subject: String,
    pub owner: Account,
    pub url: String,
    pub commit_message: String,
    pub created_on: i64,
    pub last_update: i64,
    pub open: bool,
    pub private: bool,
    pub wip: bool,

    /// NEW, DRAFT, MERGED, or ABANDONED.
    pub status: String,

    pub comments: Vec<Message>,
    #[serde(rename = "trackingIds")]
    pub tracking_ids: Vec<TrackingId>,
    pub current_patch_set: Option<Box<PatchSet>>,
    pub patch_sets: Vec<PatchSet>,
    pub depends_on: Option<Dependency>,
    pub needed_by: Option<Dependency>,
    pub submit_records: Vec<SubmitRecord>,
    pub all_reviewers: Vec<Account>,
}

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub username: String,
}

/// One revision of a change.
///
/// <https://gerrit-review.googlesource.com/Documentation/json.html#patchSet>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchSet {
    pub number: u32,
    pub revision: String,
    pub parents: Vec<String>,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub uploader: Account,
    pub author: Account,
    pub created_on: i64,
    pub is_draft: bool,

    /// REWORK, TRIVIAL_REBASE, MERGE_FIRST_PARENT_UPDATE, NO_CODE_CHANGE,
    /// or NO_CHANGE.
    pub kind: String,

    pub approvals: Vec<Approval>,
    pub comments: Vec<PatchSetComment>,
    pub files: Vec<File>,
    pub size_insertions: i64,
    pub size_deletions: i64,
}

/// A review approval granted to a patch set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Approval {
    #[serde(rename = "type")]
    pub approval_type: String,
    pub description: String,
    pub value: String,
    pub old_value: String,
    pub granted_on: i64,
    pub author: Account,
}

/// A ref that was updated outside review (direct push, tag, replication).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefUpdate {
    pub old_rev: String,
    pub new_rev: String,
    pub ref_name: String,
    pub project: String,
}

/// Submit status of a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitRecord {
    /// OK, NOT_READY, or RULE_ERROR.
    pub status: String,
    pub labels: Vec<Label>,
}

/// A review label's standing on a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub label: String,
    /// OK, REJECT, NEED, MAY, or IMPOSSIBLE.
    pub status: String,
    pub by: Account,
}

/// A change or patch-set dependency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dependency {
    pub id: String,
    pub number: String,
    pub revision: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub is_current_patch_set: bool,
}

/// A top-level review comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub timestamp: String,
    pub reviewer: Account,
    pub message: String,
}

/// An inline comment on a patch set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSetComment {
    pub file: String,
    pub line: i64,
    pub reviewer: Account,
    pub message: String,
}

/// One file touched by a patch set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct File {
    pub file: String,
    pub file_old: String,
    /// ADDED, MODIFIED, DELETED, RENAMED, COPIED, or REWRITE.
    #[serde(rename = "type")]
    pub file_type: String,
    pub insertions: i64,
    pub deletions: i64,
}

/// A link to an issue-tracking system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingId {
    pub system: String,
    pub id: String,
}

/// Change key for a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeKey {
    pub id: String,
}
