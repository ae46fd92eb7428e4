use std::net::SocketAddr;
use std::sync::Arc;

use github_hooks::{
	config::MainConfig,
	github::client::GithubClient,
	server::init_server,
	webhook::{AppState, HookState},
};

#[tokio::main]
async fn main() {
	if let Err(error) = run().await {
		panic!("{}", error);
	}
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
	let config = MainConfig::from_env();
	env_logger::from_env(env_logger::Env::default().default_filter_or("info"))
		.init();

	log::info!("Connecting to GitHub API at {}", config.github_api_url);
	let github_client = GithubClient::new(&config);

	let state = Arc::new(AppState {
		github_client,
		hook_state: HookState::default(),
		webhook_secret: config.webhook_secret.clone(),
		max_payload_size: config.max_payload_size(),
	});

	let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
	init_server(addr, state).await?;

	Ok(())
}
