//! Parameter bundle for downstream consumers.
//!
//! Flattens a matched event into the fixed `GERRIT_*` key set a CI
//! orchestrator expects. The commit message is base64-encoded since it is
//! multi-line; everything else is plain text.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::events::{Account, Event};
use crate::params;

const PORT: &str = "29418";
const SCHEME: &str = "ssh";

pub struct Report {
    hostname: String,
    name: String,
}

impl Report {
    pub fn new(hostname: &str, name: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            name: name.to_string(),
        }
    }

    /// Build the parameter map for one matched event.
    pub fn run(&self, event: &Event) -> HashMap<String, String> {
        let mut buf = HashMap::new();

        self.fetch_change(event, &mut buf);
        self.fetch_event(event, &mut buf);
        self.fetch_general(&mut buf);

        buf
    }

    fn fetch_change(&self, event: &Event, data: &mut HashMap<String, String>) {
        let change = &event.change;
        let patch_set = &event.patch_set;

        data.insert(params::GERRIT_BRANCH.into(), change.branch.clone());
        data.insert(
            params::GERRIT_CHANGE_COMMIT_MESSAGE.into(),
            BASE64.encode(&change.commit_message),
        );
        data.insert(params::GERRIT_CHANGE_ID.into(), change.id.clone());
        data.insert(params::GERRIT_CHANGE_NUMBER.into(), change.number.to_string());
        data.insert(params::GERRIT_CHANGE_OWNER.into(), format_account(&change.owner));
        data.insert(params::GERRIT_CHANGE_OWNER_EMAIL.into(), change.owner.email.clone());
        data.insert(params::GERRIT_CHANGE_OWNER_NAME.into(), change.owner.name.clone());
        data.insert(
            params::GERRIT_CHANGE_PRIVATE_STATE.into(),
            change.private.to_string(),
        );
        data.insert(params::GERRIT_CHANGE_SUBJECT.into(), change.subject.clone());
        data.insert(params::GERRIT_CHANGE_URL.into(), change.url.clone());
        data.insert(params::GERRIT_CHANGE_WIP_STATE.into(), change.wip.to_string());
        data.insert(
            params::GERRIT_PATCHSET_NUMBER.into(),
            patch_set.number.to_string(),
        );
        data.insert(
            params::GERRIT_PATCHSET_REVISION.into(),
            patch_set.revision.clone(),
        );
        data.insert(
            params::GERRIT_PATCHSET_UPLOADER.into(),
            format_account(&patch_set.uploader),
        );
        data.insert(
            params::GERRIT_PATCHSET_UPLOADER_EMAIL.into(),
            patch_set.uploader.email.clone(),
        );
        data.insert(
            params::GERRIT_PATCHSET_UPLOADER_NAME.into(),
            patch_set.uploader.name.clone(),
        );
        data.insert(params::GERRIT_PROJECT.into(), event.project.clone());
        data.insert(params::GERRIT_REFSPEC.into(), patch_set.ref_name.clone());
        data.insert(params::GERRIT_TOPIC.into(), change.topic.clone());
    }

    fn fetch_event(&self, event: &Event, data: &mut HashMap<String, String>) {
        data.insert(params::GERRIT_EVENT_TYPE.into(), event.event_type.clone());
    }

    fn fetch_general(&self, data: &mut HashMap<String, String>) {
        data.insert(params::GERRIT_HOST.into(), self.hostname.clone());
        data.insert(params::GERRIT_NAME.into(), self.name.clone());
        data.insert(params::GERRIT_PORT.into(), PORT.into());
        data.insert(params::GERRIT_SCHEME.into(), SCHEME.into());
    }
}

/// `"name" <email>`, with the name quoted.
fn format_account(account: &Account) -> String {
    format!("{:?} <{}>", account.name, account.email)
}
