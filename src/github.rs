use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::{error::*, Result};

pub mod client;
pub mod date;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
	pub login: String,
	pub id: Option<i64>,
	pub avatar_url: Option<String>,
	pub html_url: Option<String>,
	#[serde(rename = "type")]
	pub type_field: Option<String>,
	pub site_admin: Option<bool>,
}

/// Author identity as it appears in git data (push payload `pusher`, commit
/// `author`/`committer`). Unlike [`User`] it has no account login.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitUser {
	pub name: Option<String>,
	pub email: Option<String>,
	pub username: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
	pub id: Option<i64>,
	pub name: String,
	pub full_name: Option<String>,
	pub owner: Option<User>,
	pub html_url: Option<String>,
	pub url: Option<String>,
	pub description: Option<String>,
	pub fork: Option<bool>,
	pub private: Option<bool>,
	pub default_branch: Option<String>,
	// Push payloads carry these as epoch seconds, REST responses as
	// ISO-8601 strings.
	#[serde(default, with = "date::opt")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default, with = "date::opt")]
	pub updated_at: Option<DateTime<Utc>>,
	#[serde(default, with = "date::opt")]
	pub pushed_at: Option<DateTime<Utc>>,
}

impl Repository {
	pub fn slug(&self) -> String {
		match (self.owner.as_ref(), self.full_name.as_ref()) {
			(Some(owner), _) => format!("{}/{}", owner.login, self.name),
			(None, Some(full_name)) => full_name.clone(),
			_ => self.name.clone(),
		}
	}
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
	// `sha` in REST responses, `id` in push payloads
	#[serde(alias = "id")]
	pub sha: String,
	pub message: Option<String>,
	pub url: Option<String>,
	pub distinct: Option<bool>,
	#[serde(default, with = "date::opt")]
	pub timestamp: Option<DateTime<Utc>>,
	pub author: Option<GitUser>,
	pub committer: Option<GitUser>,
	#[serde(default)]
	pub added: Vec<String>,
	#[serde(default)]
	pub removed: Vec<String>,
	#[serde(default)]
	pub modified: Vec<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookConfig {
	pub url: Option<String>,
	pub content_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub secret: Option<String>,
	pub insecure_ssl: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryHook {
	pub id: i64,
	pub name: Option<String>,
	#[serde(default)]
	pub events: Vec<String>,
	pub active: Option<bool>,
	pub config: Option<HookConfig>,
	pub url: Option<String>,
	pub test_url: Option<String>,
	pub ping_url: Option<String>,
	#[serde(default, with = "date::opt")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default, with = "date::opt")]
	pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for hook creation. `name` is always `"web"` for webhooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateHook {
	pub name: String,
	pub active: bool,
	pub events: Vec<String>,
	pub config: HookConfig,
}

impl CreateHook {
	pub fn web(url: &str, secret: &str, events: &[&str]) -> Self {
		Self {
			name: "web".to_string(),
			active: true,
			events: events.iter().map(|e| e.to_string()).collect(),
			config: HookConfig {
				url: Some(url.to_string()),
				content_type: Some("json".to_string()),
				secret: Some(secret.to_string()),
				insecure_ssl: Some("0".to_string()),
			},
		}
	}
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRef {
	pub label: Option<String>,
	#[serde(rename = "ref")]
	pub ref_field: Option<String>,
	pub sha: Option<String>,
	pub user: Option<User>,
	pub repo: Option<Repository>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
	pub id: Option<i64>,
	pub number: i64,
	pub url: Option<String>,
	pub html_url: String,
	pub state: Option<String>,
	pub title: Option<String>,
	pub body: Option<String>,
	pub user: Option<User>,
	pub merged: Option<bool>,
	pub mergeable: Option<bool>,
	pub merge_commit_sha: Option<String>,
	// Head might be missing when e.g. the branch has been deleted
	pub head: Option<PullRequestRef>,
	pub base: Option<PullRequestRef>,
	#[serde(default, with = "date::opt")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default, with = "date::opt")]
	pub updated_at: Option<DateTime<Utc>>,
	pub merged_at: Option<String>,
	pub closed_at: Option<String>,
}

impl PullRequest {
	pub fn head_sha(&self) -> Result<&String> {
		self.head
			.as_ref()
			.context(MissingField {
				field: "pull_request.head",
			})?
			.sha
			.as_ref()
			.context(MissingField {
				field: "pull_request.head.sha",
			})
	}

	pub fn base_repo_html_url(&self) -> Option<&String> {
		self.base
			.as_ref()
			.and_then(|base| base.repo.as_ref())
			.and_then(|repo| repo.html_url.as_ref())
	}
}

/// `ping` hook delivery, sent by GitHub right after a hook is created.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingPayload {
	pub zen: Option<String>,
	pub hook_id: Option<i64>,
	pub hook: Option<RepositoryHook>,
	pub repository: Option<Repository>,
	pub sender: Option<User>,
}

/// `push` hook delivery.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
	#[serde(rename = "ref")]
	pub ref_field: String,
	pub before: Option<String>,
	pub after: Option<String>,
	// Either head or head_commit
	pub head: Option<String>,
	pub head_commit: Option<Commit>,
	#[serde(default)]
	pub created: bool,
	#[serde(default)]
	pub deleted: bool,
	#[serde(default)]
	pub forced: bool,
	#[serde(default)]
	pub commits: Vec<Commit>,
	pub repository: Option<Repository>,
	pub pusher: Option<GitUser>,
	pub sender: Option<User>,
}

/// `pull_request` hook delivery.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestPayload {
	pub action: String,
	pub number: i64,
	pub pull_request: PullRequest,
}

pub fn parse_repository_full_name(full_name: &str) -> Option<(String, String)> {
	let mut parts = full_name.splitn(2, '/');
	match (parts.next(), parts.next()) {
		(Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
			Some((owner.to_string(), name.to_string()))
		}
		_ => None,
	}
}

/// Server, owner and repository name extracted from a repository html URL
/// such as `https://github.com/octocat/example`.
#[derive(Debug, Clone, PartialEq)]
pub struct GithubRepoInfo {
	pub server: String,
	pub owner: String,
	pub name: String,
}

impl GithubRepoInfo {
	pub fn from_url(html_url: &str) -> Option<Self> {
		let parsed = url::Url::parse(html_url).ok()?;
		let server = parsed.host_str()?.to_string();
		let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
		let owner = segments.next()?.to_string();
		let name = segments.next()?.trim_end_matches(".git").to_string();
		if name.is_empty() {
			return None;
		}
		Some(Self {
			server,
			owner,
			name,
		})
	}
}
