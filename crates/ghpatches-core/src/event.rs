//! Archive event model and per-line enrichment.
//!
//! Each line of a decompressed chunk is one JSON event. Only the fields below
//! are decoded; anything else on the line is dropped. Enrichment adds a patch
//! URL per commit and the third-party domains referenced anywhere on the line.

use crate::domains::DomainFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded archive line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,

    /// Event type as named by the feed, e.g. `PushEvent`.
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub actor: Actor,

    #[serde(default)]
    pub repo: Repo,

    #[serde(default)]
    pub payload: Payload,

    #[serde(default)]
    pub public: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Org>,
}

impl RawEvent {
    /// Classify the event by its `type` field.
    pub fn kind(&self) -> EventKind {
        EventKind::from_type(&self.event_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actor {
    pub id: u64,
    pub login: String,
    pub gravatar_id: String,
    pub url: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repo {
    pub id: u64,
    /// `owner/name`.
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Org {
    pub id: u64,
    pub login: String,
    pub gravatar_id: String,
    pub url: String,
    pub avatar_url: String,
}

/// Event payload. Push fields are populated for `PushEvent`; other event
/// types mostly carry `action`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_size: Option<u64>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub sha: String,
    pub author: Author,
    pub message: String,
    pub distinct: bool,
    /// API URL, `https://api.github.com/repos/{owner}/{repo}/commits/{sha}`.
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub email: String,
    pub name: String,
}

/// Event types recognized by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    Create,
    Delete,
    Fork,
    Gollum,
    CommitComment,
    IssueComment,
    Issues,
    Member,
    Public,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    Release,
    Watch,
    /// Anything else, with the original type name.
    Other(String),
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "PushEvent" => Self::Push,
            "CreateEvent" => Self::Create,
            "DeleteEvent" => Self::Delete,
            "ForkEvent" => Self::Fork,
            "GollumEvent" => Self::Gollum,
            "CommitCommentEvent" => Self::CommitComment,
            "IssueCommentEvent" => Self::IssueComment,
            "IssuesEvent" => Self::Issues,
            "MemberEvent" => Self::Member,
            "PublicEvent" => Self::Public,
            "PullRequestEvent" => Self::PullRequest,
            "PullRequestReviewEvent" => Self::PullRequestReview,
            "PullRequestReviewCommentEvent" => Self::PullRequestReviewComment,
            "ReleaseEvent" => Self::Release,
            "WatchEvent" => Self::Watch,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A decoded event with derived patch URLs and referenced domains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: RawEvent,

    /// One patch URL per commit, index-aligned with `event.payload.commits`.
    pub patch_urls: Vec<String>,

    /// Third-party domains referenced anywhere on the raw line.
    pub domains: Vec<String>,
}

impl EnrichedEvent {
    /// Patch URL of the first commit, if the event has any commits.
    pub fn patch_url(&self) -> Option<&str> {
        self.patch_urls.first().map(String::as_str)
    }

    /// Commits paired with their patch URLs.
    pub fn commit_patches(&self) -> impl Iterator<Item = (&Commit, &str)> {
        self.event
            .payload
            .commits
            .iter()
            .zip(self.patch_urls.iter().map(String::as_str))
    }
}

/// Derive the web patch URL from a commit's API URL.
///
/// `https://api.<host>/repos/o/r/commits/sha` becomes
/// `https://<host>/o/r/commit/sha.patch`. URLs of any other shape are not
/// rejected; the substitutions simply do not apply.
pub fn make_patch_url(api_url: &str) -> String {
    let web_url = api_url
        .strip_prefix("https://api.")
        .and_then(|rest| rest.split_once("/repos/"))
        .filter(|(host, _)| !host.contains('/'))
        .map(|(host, path)| format!("https://{host}/{path}"))
        .unwrap_or_else(|| api_url.to_string());

    format!("{}.patch", web_url.replacen("/commits/", "/commit/", 1))
}

/// Decode and enrich one archive line.
pub fn enrich_line(line: &str, filter: &DomainFilter) -> serde_json::Result<EnrichedEvent> {
    let event: RawEvent = serde_json::from_str(line)?;

    let patch_urls = event
        .payload
        .commits
        .iter()
        .map(|commit| make_patch_url(&commit.url))
        .collect();

    let domains = filter.extract(line);

    Ok(EnrichedEvent {
        event,
        patch_urls,
        domains,
    })
}
