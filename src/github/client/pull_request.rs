use std::time::Duration;

use super::GithubClient;
use crate::{github::PullRequest, Result};

impl GithubClient {
	pub async fn pull_request(
		&self,
		owner: &str,
		repo: &str,
		number: i64,
	) -> Result<PullRequest> {
		self.client
			.get(format!(
				"{}/repos/{}/{}/pulls/{}",
				self.github_api_url, owner, repo, number
			))
			.await
	}

	/// GitHub computes the merge commit asynchronously after a pull request
	/// changes, so `merge_commit_sha` may be absent right after a hook
	/// delivery. Poll until it shows up or attempts run out.
	pub async fn pull_request_merge_sha(
		&self,
		owner: &str,
		repo: &str,
		number: i64,
		attempts: u32,
		delay: Duration,
	) -> Result<Option<String>> {
		for attempt in 0..attempts {
			if attempt > 0 {
				tokio::time::sleep(delay).await;
			}
			let pull_request = self.pull_request(owner, repo, number).await?;
			if let Some(sha) = pull_request.merge_commit_sha {
				return Ok(Some(sha));
			}
			log::debug!(
				"Merge commit for {}/{}#{} not ready yet (attempt {})",
				owner,
				repo,
				number,
				attempt + 1
			);
		}
		Ok(None)
	}
}
