use crate::{config::MainConfig, http};

mod hook;
mod pull_request;

pub struct GithubClient {
	pub client: http::Client,
	github_api_url: String,
}

impl GithubClient {
	pub fn new(config: &MainConfig) -> Self {
		let client = http::Client::new(config.github_token.as_str());

		Self {
			client,
			github_api_url: config.github_api_url.clone(),
		}
	}
}
