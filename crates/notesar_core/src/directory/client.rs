//! Sharing directory HTTP client.
//!
//! # Responsibility
//! - List anchor identifiers stored for a grouping key.
//! - Register a freshly uploaded identifier under a grouping key.
//!
//! # Invariants
//! - A listing never yields more than `MAX_WATCH_IDENTIFIERS` entries.
//! - Registration bodies are exactly `<identifier>|<grouping_key>`.
//! - Failures degrade discovery only; the `AnchorDirectory` surface never errors.

use crate::config::{CoordinatorConfig, RESERVED_KEY_CHARS};
use log::{error, info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A watch accepts at most this many identifiers.
pub const MAX_WATCH_IDENTIFIERS: usize = 10;

/// Directory operations as consumed by the workflows.
///
/// Implementations swallow and log their own failures: an empty listing and a
/// `false` registration are the only failure signals.
pub trait AnchorDirectory: Send + Sync {
    fn list_identifiers(&self, grouping_key: &str) -> Vec<String>;
    fn register_identifier(&self, identifier: &str, grouping_key: &str) -> bool;
}

/// Directory call failure.
#[derive(Debug)]
pub enum DirectoryError {
    InvalidGroupingKey(String),
    InvalidIdentifier(String),
    Transport(reqwest::Error),
    HttpStatus(u16),
    Malformed(String),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGroupingKey(value) => write!(f, "invalid grouping key: `{value}`"),
            Self::InvalidIdentifier(value) => write!(f, "invalid anchor identifier: `{value}`"),
            Self::Transport(err) => write!(f, "directory transport failure: {err}"),
            Self::HttpStatus(code) => write!(f, "directory returned status {code}"),
            Self::Malformed(details) => write!(f, "malformed directory response: {details}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

/// Blocking client for the sharing directory.
#[derive(Clone)]
pub struct HttpDirectoryClient {
    client: Client,
    base_url: String,
}

impl HttpDirectoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &CoordinatorConfig) -> Result<Self, DirectoryError> {
        Self::new(config.directory_url.as_str(), config.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET <base>/<grouping_key>`, parsed and truncated.
    pub fn fetch_identifiers(&self, grouping_key: &str) -> Result<Vec<String>, DirectoryError> {
        check_segment(grouping_key).map_err(DirectoryError::InvalidGroupingKey)?;

        let url = format!("{}/{}", self.base_url, grouping_key);
        let response = self.client.get(url).send()?;
        let status = response.status();
        info!(
            "event=directory_list module=directory status=response http_status={} grouping_key={}",
            status.as_u16(),
            grouping_key
        );
        if !status.is_success() {
            return Err(DirectoryError::HttpStatus(status.as_u16()));
        }

        let body = response.text()?;
        parse_identifier_list(&body)
    }

    /// `POST <base>` with `<identifier>|<grouping_key>`; returns the HTTP status.
    pub fn post_identifier(
        &self,
        identifier: &str,
        grouping_key: &str,
    ) -> Result<u16, DirectoryError> {
        check_segment(grouping_key).map_err(DirectoryError::InvalidGroupingKey)?;
        check_segment(identifier).map_err(DirectoryError::InvalidIdentifier)?;

        let response = self
            .client
            .post(self.base_url.as_str())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(format!("{identifier}|{grouping_key}"))
            .send()?;
        Ok(response.status().as_u16())
    }
}

impl AnchorDirectory for HttpDirectoryClient {
    fn list_identifiers(&self, grouping_key: &str) -> Vec<String> {
        match self.fetch_identifiers(grouping_key) {
            Ok(identifiers) => {
                info!(
                    "event=directory_list module=directory status=ok count={}",
                    identifiers.len()
                );
                identifiers
            }
            Err(err @ DirectoryError::Malformed(_)) => {
                warn!("event=directory_list module=directory status=malformed error={err}");
                Vec::new()
            }
            Err(err) => {
                error!("event=directory_list module=directory status=error error={err}");
                Vec::new()
            }
        }
    }

    fn register_identifier(&self, identifier: &str, grouping_key: &str) -> bool {
        match self.post_identifier(identifier, grouping_key) {
            Ok(status) => {
                info!(
                    "event=directory_register module=directory status=ok identifier={} http_status={}",
                    identifier, status
                );
                true
            }
            Err(err) => {
                error!(
                    "event=directory_register module=directory status=error identifier={} error={}",
                    identifier, err
                );
                false
            }
        }
    }
}

/// Parses the directory's bracketed identifier list.
///
/// Quotes and brackets are stripped, entries are split on `,` and trimmed,
/// blanks are dropped and only the first `MAX_WATCH_IDENTIFIERS` are kept.
/// A body that is not wrapped in `[` `]` is rejected as malformed.
pub fn parse_identifier_list(body: &str) -> Result<Vec<String>, DirectoryError> {
    let trimmed = body.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return Err(DirectoryError::Malformed(format!(
            "expected a bracketed list, got {} bytes",
            trimmed.len()
        )));
    }

    let stripped = trimmed.replace(['"', '[', ']'], "");
    Ok(stripped
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .take(MAX_WATCH_IDENTIFIERS)
        .map(str::to_string)
        .collect())
}

fn check_segment(value: &str) -> Result<(), String> {
    if value.trim().is_empty() || value.contains(RESERVED_KEY_CHARS) {
        return Err(value.to_string());
    }
    Ok(())
}
