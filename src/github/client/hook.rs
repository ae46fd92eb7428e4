use super::GithubClient;
use crate::{
	github::{CreateHook, RepositoryHook},
	Result,
};

impl GithubClient {
	pub async fn hooks(
		&self,
		owner: &str,
		repo: &str,
	) -> Result<Vec<RepositoryHook>> {
		self.client
			.get_all(format!(
				"{}/repos/{}/{}/hooks",
				self.github_api_url, owner, repo
			))
			.await
	}

	pub async fn hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
	) -> Result<RepositoryHook> {
		self.client
			.get(format!(
				"{}/repos/{}/{}/hooks/{}",
				self.github_api_url, owner, repo, id
			))
			.await
	}

	pub async fn create_hook(
		&self,
		owner: &str,
		repo: &str,
		hook: &CreateHook,
	) -> Result<RepositoryHook> {
		self.client
			.post(
				format!(
					"{}/repos/{}/{}/hooks",
					self.github_api_url, owner, repo
				),
				hook,
			)
			.await
	}

	pub async fn delete_hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
	) -> Result<()> {
		self.client
			.delete_response(
				format!(
					"{}/repos/{}/{}/hooks/{}",
					self.github_api_url, owner, repo, id
				),
				&serde_json::json!({}),
			)
			.await
			.map(|_| ())
	}

	/// PATCH arbitrary hook fields; GitHub answers with the updated hook.
	pub async fn patch_hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
		patch: &serde_json::Value,
	) -> Result<RepositoryHook> {
		self.client
			.patch(
				format!(
					"{}/repos/{}/{}/hooks/{}",
					self.github_api_url, owner, repo, id
				),
				patch,
			)
			.await
	}

	pub async fn enable_hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
	) -> Result<RepositoryHook> {
		self.patch_hook(owner, repo, id, &serde_json::json!({ "active": true }))
			.await
	}

	pub async fn disable_hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
	) -> Result<RepositoryHook> {
		self.patch_hook(
			owner,
			repo,
			id,
			&serde_json::json!({ "active": false }),
		)
		.await
	}

	pub async fn set_hook_events(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
		events: &[&str],
	) -> Result<RepositoryHook> {
		self.patch_hook(owner, repo, id, &serde_json::json!({ "events": events }))
			.await
	}

	/// Ask GitHub to redeliver the latest push payload to the hook.
	pub async fn test_hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
	) -> Result<()> {
		self.client
			.post_response(
				format!(
					"{}/repos/{}/{}/hooks/{}/tests",
					self.github_api_url, owner, repo, id
				),
				&serde_json::json!({}),
			)
			.await
			.map(|_| ())
	}

	/// Ask GitHub to send a fresh `ping` delivery to the hook.
	pub async fn ping_hook(
		&self,
		owner: &str,
		repo: &str,
		id: i64,
	) -> Result<()> {
		self.client
			.post_response(
				format!(
					"{}/repos/{}/{}/hooks/{}/pings",
					self.github_api_url, owner, repo, id
				),
				&serde_json::json!({}),
			)
			.await
			.map(|_| ())
	}
}
