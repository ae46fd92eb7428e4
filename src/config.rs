#[derive(Debug, Clone)]
pub struct MainConfig {
	pub github_api_url: String,
	pub github_token: String,
	pub webhook_secret: String,
	pub webhook_port: u16,
	/// Hook deliveries above this size are rejected.
	pub max_payload_kb: u64,
}

impl MainConfig {
	pub fn from_env() -> Self {
		dotenv::dotenv().ok();

		let github_api_url = dotenv::var("GITHUB_API_URL")
			.unwrap_or_else(|_| "https://api.github.com".to_string());
		let github_token = dotenv::var("GITHUB_TOKEN").expect("GITHUB_TOKEN");
		let webhook_secret =
			dotenv::var("WEBHOOK_SECRET").expect("WEBHOOK_SECRET");
		let webhook_port = dotenv::var("WEBHOOK_PORT")
			.unwrap_or_else(|_| "4567".to_string())
			.parse::<u16>()
			.expect("parse WEBHOOK_PORT");
		let max_payload_kb = dotenv::var("MAX_PAYLOAD_KB")
			.unwrap_or_else(|_| "5120".to_string())
			.parse::<u64>()
			.expect("parse MAX_PAYLOAD_KB");

		Self {
			github_api_url,
			github_token,
			webhook_secret,
			webhook_port,
			max_payload_kb,
		}
	}

	pub fn max_payload_size(&self) -> usize {
		(self.max_payload_kb * 1024) as usize
	}
}
