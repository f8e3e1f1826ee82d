//! Fixed key names of the emitted parameter bundle.

pub const GERRIT_BRANCH: &str = "GERRIT_BRANCH";
pub const GERRIT_CHANGE_COMMIT_MESSAGE: &str = "GERRIT_CHANGE_COMMIT_MESSAGE";
pub const GERRIT_CHANGE_ID: &str = "GERRIT_CHANGE_ID";
pub const GERRIT_CHANGE_NUMBER: &str = "GERRIT_CHANGE_NUMBER";
pub const GERRIT_CHANGE_OWNER: &str = "GERRIT_CHANGE_OWNER";
pub const GERRIT_CHANGE_OWNER_EMAIL: &str = "GERRIT_CHANGE_OWNER_EMAIL";
pub const GERRIT_CHANGE_OWNER_NAME: &str = "GERRIT_CHANGE_OWNER_NAME";
pub const GERRIT_CHANGE_PRIVATE_STATE: &str = "GERRIT_CHANGE_PRIVATE_STATE";
pub const GERRIT_CHANGE_SUBJECT: &str = "GERRIT_CHANGE_SUBJECT";
pub const GERRIT_CHANGE_URL: &str = "GERRIT_CHANGE_URL";
pub const GERRIT_CHANGE_WIP_STATE: &str = "GERRIT_CHANGE_WIP_STATE";
pub const GERRIT_EVENT_TYPE: &str = "GERRIT_EVENT_TYPE";
pub const GERRIT_HOST: &str = "GERRIT_HOST";
pub const GERRIT_NAME: &str = "GERRIT_NAME";
pub const GERRIT_PATCHSET_NUMBER: &str = "GERRIT_PATCHSET_NUMBER";
pub const GERRIT_PATCHSET_REVISION: &str = "GERRIT_PATCHSET_REVISION";
pub const GERRIT_PATCHSET_UPLOADER: &str = "GERRIT_PATCHSET_UPLOADER";
pub const GERRIT_PATCHSET_UPLOADER_EMAIL: &str = "GERRIT_PATCHSET_UPLOADER_EMAIL";
pub const GERRIT_PATCHSET_UPLOADER_NAME: &str = "GERRIT_PATCHSET_UPLOADER_NAME";
pub const GERRIT_PORT: &str = "GERRIT_PORT";
pub const GERRIT_PROJECT: &str = "GERRIT_PROJECT";
pub const GERRIT_REFSPEC: &str = "GERRIT_REFSPEC";
pub const GERRIT_SCHEME: &str = "GERRIT_SCHEME";
pub const GERRIT_TOPIC: &str = "GERRIT_TOPIC";
