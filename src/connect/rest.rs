//! Gerrit REST API client.
//!
//! Covers the change endpoints the trigger's operators script against:
//! change detail, change query, server version, and review voting. When
//! basic-auth credentials are configured the authenticated `/a` path prefix
//! is used. Gerrit prefixes every JSON body with the XSSI guard `)]}'`,
//! which is stripped before decoding.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use thiserror::Error;

const CHANGES: &str = "/changes/";
const DETAIL: &str = "/detail";
const REVIEW: &str = "/review";
const REVISIONS: &str = "/revisions/";
const VERSION: &str = "/config/server/version";

const AUTH_PREFIX: &str = "/a";

const OPTION_ACCOUNTS: &str = "DETAILED_ACCOUNTS";
const OPTION_COMMIT: &str = "CURRENT_COMMIT";
const OPTION_REVISION: &str = "CURRENT_REVISION";

const XSSI_GUARD: &str = ")]}'";

#[derive(Debug, Error)]
pub enum RestError {
    #[error("invalid status: {0}")]
    Status(u16),
    #[error("not matched")]
    NotMatched,
}

pub struct RestClient {
    url: String,
    user: String,
    pass: String,
    agent: ureq::Agent,
}

impl RestClient {
    pub fn new(frontend_url: &str, username: &str, password: &str) -> Self {
        Self {
            url: frontend_url.trim_end_matches('/').to_string(),
            user: username.to_string(),
            pass: password.to_string(),
            agent: ureq::agent(),
        }
    }

    /// Full change detail: `GET /changes/<n>/detail`.
    pub fn detail(&self, change: u32) -> Result<Value> {
        let url = self.endpoint(&format!("{CHANGES}{change}{DETAIL}"));
        let body = self.get(&url)?;
        decode_json(&body)
    }

    /// First match of a change query: `GET /changes/?q=<search>&start=<n>`.
    pub fn query(&self, search: &str, start: u32) -> Result<Value> {
        let url = self.endpoint(CHANGES);

        let request = self
            .authorize(self.agent.get(&url))
            .query("o", OPTION_ACCOUNTS)
            .query("o", OPTION_COMMIT)
            .query("o", OPTION_REVISION)
            .query("q", search)
            .query("start", &start.to_string());

        let body = Self::read(request.call())?;
        let decoded: Value = decode_json(&body)?;

        match decoded.as_array().and_then(|matches| matches.first()) {
            Some(first) => Ok(first.clone()),
            None => Err(RestError::NotMatched.into()),
        }
    }

    /// Server version string: `GET /config/server/version`.
    pub fn version(&self) -> Result<String> {
        let url = self.endpoint(VERSION);
        let body = self.get(&url)?;
        let decoded: Value = decode_json(&body)?;

        decoded
            .as_str()
            .map(str::to_string)
            .context("version is not a string")
    }

    /// Cast a review vote: `POST /changes/<n>/revisions/<r>/review`.
    pub fn vote(
        &self,
        change: u32,
        revision: u32,
        label: &str,
        message: &str,
        vote: &str,
    ) -> Result<()> {
        let url = self.endpoint(&format!("{CHANGES}{change}{REVISIONS}{revision}{REVIEW}"));

        let body = serde_json::json!({
            "comments": null,
            "labels": { label: vote },
            "message": message,
        });

        let request = self.authorize(self.agent.post(&url));
        Self::read(request.send_json(body))?;

        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        if self.authenticated() {
            format!("{}{}{}", self.url, AUTH_PREFIX, path)
        } else {
            format!("{}{}", self.url, path)
        }
    }

    fn authenticated(&self) -> bool {
        !self.user.is_empty() && !self.pass.is_empty()
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        if !self.authenticated() {
            return request;
        }

        let token = BASE64.encode(format!("{}:{}", self.user, self.pass));
        request.set("Authorization", &format!("Basic {token}"))
    }

    fn get(&self, url: &str) -> Result<String> {
        Self::read(self.authorize(self.agent.get(url)).call())
    }

    fn read(result: Result<ureq::Response, ureq::Error>) -> Result<String> {
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(RestError::Status(code).into()),
            Err(err) => return Err(err).context("failed to send request"),
        };

        response.into_string().context("failed to read response")
    }
}

/// Strip the XSSI guard and decode.
fn decode_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let stripped = body.strip_prefix(XSSI_GUARD).unwrap_or(body);
    serde_json::from_str(stripped).context("failed to decode response")
}
