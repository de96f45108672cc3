use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::PreviewError;

/// Longest identifier accepted as an image tag by the container runtime.
pub const MAX_ID_LEN: usize = 128;

/// Length of the hex digest suffix appended to truncated identifiers.
const DIGEST_SUFFIX_LEN: usize = 16;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Stable identifier of one preview, safe to use as a directory name, an
/// image tag and a container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewId(String);

impl PreviewId {
    /// Derive the identifier for an (owner, repo, commit-reference) triple.
    ///
    /// The three parts are joined with `_` and every character outside
    /// `[A-Za-z0-9_-]` becomes `_`. A leading `-` is replaced as well, and
    /// results longer than [`MAX_ID_LEN`] are cut and suffixed with a digest
    /// of the untruncated input so they remain distinct.
    pub fn derive(owner: &str, repo: &str, commit: &str) -> Self {
        let joined = format!("{}_{}_{}", owner, repo, commit);
        let mut id: String = joined
            .chars()
            .map(|c| if is_id_char(c) { c } else { '_' })
            .collect();

        if id.starts_with('-') {
            id.replace_range(..1, "_");
        }

        if id.len() > MAX_ID_LEN {
            let digest = Sha256::digest(joined.as_bytes());
            let suffix: String = digest
                .iter()
                .take(DIGEST_SUFFIX_LEN / 2)
                .map(|b| format!("{:02x}", b))
                .collect();
            id.truncate(MAX_ID_LEN - DIGEST_SUFFIX_LEN - 1);
            id.push('-');
            id.push_str(&suffix);
        }

        Self(id)
    }

    /// Accept an identifier received from a client (e.g. a URL path segment).
    /// Only strings that `derive` could have produced are accepted, which keeps
    /// them from escaping the workspace root when joined onto a path.
    pub fn parse(raw: &str) -> Result<Self, PreviewError> {
        if raw.is_empty() || raw.len() > MAX_ID_LEN || raw.starts_with('-') {
            return Err(PreviewError::not_found(raw));
        }
        if !raw.chars().all(is_id_char) {
            return Err(PreviewError::not_found(raw));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn container_name(&self) -> String {
        format!("preview-{}", self.0)
    }

    pub fn image_tag(&self) -> String {
        format!("preview:{}", self.0)
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a preview session.
///
/// ```text
/// queued → cloning → building → running → ready
///             └──────────┴──────────┴────→ error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewStatus {
    Queued,
    Cloning,
    Building,
    Running,
    Ready,
    Error,
}

impl PreviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Cloning => "cloning",
            Self::Building => "building",
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    /// The stage that follows this one on the success path.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Queued => Some(Self::Cloning),
            Self::Cloning => Some(Self::Building),
            Self::Building => Some(Self::Running),
            Self::Running => Some(Self::Ready),
            Self::Ready | Self::Error => None,
        }
    }

    /// Whether a session in `self` may move to `to`. Terminal states are final;
    /// `error` is reachable from any other state.
    pub fn can_transition_to(&self, to: PreviewStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Error || self.next() == Some(to)
    }
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "cloning" => Ok(Self::Cloning),
            "building" => Ok(Self::Building),
            "running" => Ok(Self::Running),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid preview status: {}", s)),
        }
    }
}

/// Web-application toolchain detected in a fetched tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "nextjs")]
    NextJs,
    #[serde(rename = "react-cra")]
    ReactCra,
    #[serde(rename = "vite")]
    Vite,
    #[serde(rename = "nestjs")]
    NestJs,
    #[serde(rename = "generic-node")]
    GenericNode,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NextJs => "nextjs",
            Self::ReactCra => "react-cra",
            Self::Vite => "vite",
            Self::NestJs => "nestjs",
            Self::GenericNode => "generic-node",
        }
    }

    /// Directory a static-export build writes into, for types served by a
    /// static file server. `None` for types that run their own server.
    pub fn static_output_dir(&self) -> Option<&'static str> {
        match self {
            Self::ReactCra => Some("build"),
            Self::Vite => Some("dist"),
            Self::NextJs | Self::NestJs | Self::GenericNode => None,
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names under which the container runtime knows one preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub container_name: String,
    pub image_tag: String,
}

impl From<&PreviewId> for ContainerHandle {
    fn from(id: &PreviewId) -> Self {
        Self {
            container_name: id.container_name(),
            image_tag: id.image_tag(),
        }
    }
}

/// Inbound build request. Fields are optional so that a missing field is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewRequest {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub commit: Option<String>,
}

/// A request whose fields have all been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub owner: String,
    pub repo: String,
    pub commit: String,
}

impl ValidatedRequest {
    pub fn id(&self) -> PreviewId {
        PreviewId::derive(&self.owner, &self.repo, &self.commit)
    }
}

impl PreviewRequest {
    pub fn new(owner: &str, repo: &str, commit: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            repo: Some(repo.to_string()),
            commit: Some(commit.to_string()),
        }
    }

    pub fn validate(self) -> Result<ValidatedRequest, PreviewError> {
        fn field(name: &str, value: Option<String>) -> Result<String, PreviewError> {
            let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
            if value.is_empty() {
                return Err(PreviewError::Validation(
                    "owner, repo, commit required".to_string(),
                ));
            }
            if value.starts_with('-') {
                return Err(PreviewError::Validation(format!(
                    "{} must not start with '-'",
                    name
                )));
            }
            Ok(value)
        }

        Ok(ValidatedRequest {
            owner: field("owner", self.owner)?,
            repo: field("repo", self.repo)?,
            commit: field("commit", self.commit)?,
        })
    }
}

/// Registry record of one preview.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSession {
    pub status: PreviewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PreviewSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: PreviewStatus::Queued,
            url: None,
            error: None,
            logs: Vec::new(),
            project_type: None,
            commit_sha: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a partial update. Status changes must follow the lifecycle order;
    /// log lines are appended.
    pub fn apply(&mut self, update: SessionUpdate) -> Result<(), PreviewError> {
        if let Some(to) = update.status
            && to != self.status
        {
            if !self.status.can_transition_to(to) {
                return Err(PreviewError::InvalidTransition {
                    from: self.status,
                    to,
                });
            }
            self.status = to;
        }
        if update.url.is_some() {
            self.url = update.url;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        if update.project_type.is_some() {
            self.project_type = update.project_type;
        }
        if update.commit_sha.is_some() {
            self.commit_sha = update.commit_sha;
        }
        self.logs.extend(update.logs);
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for PreviewSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial session state written by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub status: Option<PreviewStatus>,
    pub url: Option<String>,
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub project_type: Option<ProjectType>,
    pub commit_sha: Option<String>,
}

impl SessionUpdate {
    pub fn status(status: PreviewStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn ready(url: impl Into<String>) -> Self {
        Self {
            status: Some(PreviewStatus::Ready),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(PreviewStatus::Error),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn log(line: impl Into<String>) -> Self {
        Self {
            logs: vec![line.into()],
            ..Default::default()
        }
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }
}
