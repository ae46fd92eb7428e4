use std::sync::Arc;

use hyper::StatusCode;

use github_hooks::{
	config::MainConfig,
	fakes::{FakeRequestFactory, FakeResponse},
	github::client::GithubClient,
	webhook::{webhook, AppState, HookState},
};

const SECRET: &str = "it's a secret to everybody";

fn app_state(max_payload_size: usize) -> Arc<AppState> {
	let config = MainConfig {
		github_api_url: "http://localhost:0".to_string(),
		github_token: "token".to_string(),
		webhook_secret: SECRET.to_string(),
		webhook_port: 0,
		max_payload_kb: 5120,
	};
	Arc::new(AppState {
		github_client: GithubClient::new(&config),
		hook_state: HookState::default(),
		webhook_secret: SECRET.to_string(),
		max_payload_size,
	})
}

async fn deliver(
	state: &Arc<AppState>,
	event: &str,
	payload: &[u8],
) -> FakeResponse {
	let factory = FakeRequestFactory::new("");
	let request = factory
		.github_event(event, SECRET, payload)
		.into_request()
		.unwrap();
	let response = webhook(request, Arc::clone(state)).await.unwrap();
	FakeResponse::capture(response).await.unwrap()
}

#[tokio::test]
async fn unknown_path_is_not_found() {
	let state = app_state(1024 * 1024);
	let factory = FakeRequestFactory::new("");
	let request = factory.get("/somewhere/else", "").into_request().unwrap();

	let response = webhook(request, Arc::clone(&state)).await.unwrap();
	let captured = FakeResponse::capture(response).await.unwrap();
	assert_eq!(captured.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_event_header_is_rejected() {
	let state = app_state(1024 * 1024);
	let factory = FakeRequestFactory::new("");
	let mut fake = factory.get("/webhook", "");
	fake.set_method("POST");

	let response = webhook(fake.into_request().unwrap(), Arc::clone(&state))
		.await
		.unwrap();
	let captured = FakeResponse::capture(response).await.unwrap();
	assert_eq!(captured.status(), StatusCode::BAD_REQUEST);
	assert!(captured.output_string().contains("X-GitHub-Event"));
}

#[tokio::test]
async fn unsupported_events_are_acknowledged_and_ignored() {
	let state = app_state(1024 * 1024);
	let captured = deliver(&state, "issues", b"{}").await;
	assert_eq!(captured.status(), StatusCode::ACCEPTED);
	assert!(captured.output_string().contains("Unsupported event type"));
}

#[tokio::test]
async fn missing_signature_is_rejected() {
	let state = app_state(1024 * 1024);
	let factory = FakeRequestFactory::new("");
	let mut fake = factory.get("/webhook", "");
	fake.set_method("POST");
	fake.set_header("x-github-event", "ping");

	let response = webhook(fake.into_request().unwrap(), Arc::clone(&state))
		.await
		.unwrap();
	let captured = FakeResponse::capture(response).await.unwrap();
	assert_eq!(captured.status(), StatusCode::BAD_REQUEST);
	assert!(captured.output_string().contains("X-Hub-Signature"));
}

#[tokio::test]
async fn wrong_secret_is_forbidden() {
	let state = app_state(1024 * 1024);
	let factory = FakeRequestFactory::new("");
	let request = factory
		.github_event("ping", "not the right secret", b"{}")
		.into_request()
		.unwrap();

	let response = webhook(request, Arc::clone(&state)).await.unwrap();
	let captured = FakeResponse::capture(response).await.unwrap();
	assert_eq!(captured.status(), StatusCode::FORBIDDEN);
	assert!(state.hook_state.last_used().is_none());
}

#[tokio::test]
async fn oversized_payloads_are_rejected() {
	let state = app_state(16);
	let payload = include_bytes!("fixtures/ping.json");
	let captured = deliver(&state, "ping", payload).await;
	assert_eq!(captured.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn garbage_payloads_report_a_parse_failure() {
	let state = app_state(1024 * 1024);
	let captured = deliver(&state, "push", b"{\"ref\": 42}").await;
	assert_eq!(captured.status(), StatusCode::SERVICE_UNAVAILABLE);
	assert!(captured.output_string().contains("Failed to parse payload"));
}

#[tokio::test]
async fn ping_marks_the_hook_alive() {
	let state = app_state(1024 * 1024);
	let captured =
		deliver(&state, "ping", include_bytes!("fixtures/ping.json")).await;
	assert_eq!(captured.status(), StatusCode::OK);
	assert!(state.hook_state.last_used().is_some());
}

#[tokio::test]
async fn push_records_the_branch_revision() {
	let state = app_state(1024 * 1024);
	let captured =
		deliver(&state, "push", include_bytes!("fixtures/push.json")).await;
	assert_eq!(captured.status(), StatusCode::OK);
	assert_eq!(
		state.hook_state.branch_revision("refs/heads/master").as_deref(),
		Some("0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c")
	);
}

#[tokio::test]
async fn pull_request_records_head_and_merge_revisions() {
	let state = app_state(1024 * 1024);
	let captured = deliver(
		&state,
		"pull_request",
		include_bytes!("fixtures/pull-request-opened.json"),
	)
	.await;
	assert_eq!(captured.status(), StatusCode::OK);
	assert_eq!(
		state.hook_state.branch_revision("refs/pull/7/head").as_deref(),
		Some("0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c")
	);
	assert_eq!(
		state.hook_state.branch_revision("refs/pull/7/merge").as_deref(),
		Some("c4e33431a30e01e8b4f7cd26b6fe32b0b5afcbd9")
	);
}

#[tokio::test]
async fn synchronize_updates_the_recorded_revisions() {
	let state = app_state(1024 * 1024);
	deliver(
		&state,
		"pull_request",
		include_bytes!("fixtures/pull-request-opened.json"),
	)
	.await;
	deliver(
		&state,
		"pull_request",
		include_bytes!("fixtures/pull-request-synchronize.json"),
	)
	.await;
	assert_eq!(
		state.hook_state.branch_revision("refs/pull/7/head").as_deref(),
		Some("f427bd7c3f8ac9f9a37f6fb897cbd52e36e0c102")
	);
	assert_eq!(
		state.hook_state.branch_revision("refs/pull/7/merge").as_deref(),
		Some("7f2a8ac0ab0ecf7b1b385b9fdc2b9b28be4e5f8c")
	);
}

#[tokio::test]
async fn unrelated_pull_request_actions_are_ignored() {
	let state = app_state(1024 * 1024);
	let payload = br#"{
		"action": "assigned",
		"number": 7,
		"pull_request": {
			"number": 7,
			"html_url": "https://github.com/octocat/example/pull/7"
		}
	}"#;
	let captured = deliver(&state, "pull_request", payload).await;
	assert_eq!(captured.status(), StatusCode::ACCEPTED);
	assert!(captured.output_string().contains("Unrelated action"));
	assert!(state.hook_state.last_used().is_none());
}

#[tokio::test]
async fn pull_request_without_base_repo_url_is_rejected() {
	let state = app_state(1024 * 1024);
	let payload = br#"{
		"action": "opened",
		"number": 7,
		"pull_request": {
			"number": 7,
			"html_url": "https://github.com/octocat/example/pull/7"
		}
	}"#;
	let captured = deliver(&state, "pull_request", payload).await;
	assert_eq!(captured.status(), StatusCode::BAD_REQUEST);
	assert!(captured
		.output_string()
		.contains("pull_request.base.repo.html_url"));
}
