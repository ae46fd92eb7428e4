use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use hyper::{Body, Request, Response, StatusCode};
use parking_lot::RwLock;
use ring::hmac;
use snafu::OptionExt;

use crate::{
	error::*,
	github::{
		client::GithubClient, GithubRepoInfo, PingPayload, PullRequestPayload,
		PushPayload, Repository,
	},
	Result,
};

pub const WEBHOOK_PATH: &str = "/webhook";
pub const X_GITHUB_EVENT: &str = "x-github-event";
pub const X_HUB_SIGNATURE: &str = "x-hub-signature";

pub const SUPPORTED_EVENTS: &[&str] = &["ping", "push", "pull_request"];

const ACCEPTED_PULL_REQUEST_ACTIONS: &[&str] = &[
	"opened",
	"edited",
	"closed",
	"reopened",
	"synchronize",
	"labeled",
	"unlabeled",
];

/// This data gets passed along with each hook delivery to the handler.
pub struct AppState {
	pub github_client: GithubClient,
	pub hook_state: HookState,
	pub webhook_secret: String,
	pub max_payload_size: usize,
}

/// Liveness and branch bookkeeping for the installed hook, shared across
/// handler invocations.
#[derive(Default)]
pub struct HookState {
	last_used: RwLock<Option<DateTime<Utc>>>,
	branch_revisions: RwLock<HashMap<String, String>>,
}

impl HookState {
	pub fn update_last_used(&self) {
		*self.last_used.write() = Some(Utc::now());
	}

	pub fn last_used(&self) -> Option<DateTime<Utc>> {
		*self.last_used.read()
	}

	pub fn update_branch(&self, reference: &str, sha: &str) {
		self.branch_revisions
			.write()
			.insert(reference.to_string(), sha.to_string());
	}

	pub fn branch_revision(&self, reference: &str) -> Option<String> {
		self.branch_revisions.read().get(reference).cloned()
	}
}

/// Produce the `sha1=<hex>` digest GitHub puts in `X-Hub-Signature`.
pub fn sign(secret: &[u8], msg: &[u8]) -> String {
	let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
	let tag = hmac::sign(&key, msg);
	format!("sha1={}", base16::encode_lower(tag.as_ref()))
}

/// Check the SHA1 signature on a webhook payload.
fn verify(
	secret: &[u8],
	msg: &[u8],
	signature: &[u8],
) -> Result<(), ring::error::Unspecified> {
	let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
	hmac::verify(&key, msg, signature)
}

fn plain_response(status: StatusCode, text: &str) -> Result<Response<Body>> {
	Response::builder()
		.status(status)
		.header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
		.body(Body::from(text.to_string()))
		.ok()
		.context(Message {
			msg: "Error building response".to_string(),
		})
}

fn repo_slug(repository: Option<&Repository>) -> String {
	repository
		.map(Repository::slug)
		.unwrap_or_else(|| "<unknown>".to_string())
}

/// Hook delivery entrypoint. Only `POST {WEBHOOK_PATH}` is served; handler
/// failures never kill the connection, they come back as a 500.
pub async fn webhook(
	req: Request<Body>,
	state: Arc<AppState>,
) -> Result<Response<Body>> {
	if req.uri().path() != WEBHOOK_PATH {
		return plain_response(StatusCode::NOT_FOUND, "Not found.");
	}

	match webhook_inner(req, &state).await {
		Ok(response) => Ok(response),
		Err(e) => {
			log::error!("Error handling hook delivery: {}", e);
			plain_response(
				StatusCode::INTERNAL_SERVER_ERROR,
				"Error handling hook delivery",
			)
		}
	}
}

/// Validate headers, size and signature, then dispatch on the event type.
pub async fn webhook_inner(
	mut req: Request<Body>,
	state: &AppState,
) -> Result<Response<Body>> {
	let event = match req
		.headers()
		.get(X_GITHUB_EVENT)
		.and_then(|v| v.to_str().ok())
		.map(str::to_owned)
	{
		Some(event) => event,
		None => {
			return plain_response(
				StatusCode::BAD_REQUEST,
				"'X-GitHub-Event' header is missing",
			)
		}
	};

	if !SUPPORTED_EVENTS.contains(&event.as_str()) {
		log::info!("Received unsupported event type '{}', ignoring", event);
		return plain_response(
			StatusCode::ACCEPTED,
			&format!("Unsupported event type '{}'", event),
		);
	}

	let signature = req
		.headers()
		.get(X_HUB_SIGNATURE)
		.and_then(|v| v.to_str().ok())
		.unwrap_or("")
		.trim()
		.to_string();
	if signature.is_empty() {
		log::warn!("Received {} event without signature", event);
		return plain_response(
			StatusCode::BAD_REQUEST,
			"'X-Hub-Signature' header is missing",
		);
	}

	if let Some(length) = req
		.headers()
		.get(hyper::header::CONTENT_LENGTH)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.parse::<usize>().ok())
	{
		if length > state.max_payload_size {
			return payload_too_large(state);
		}
	}

	let mut msg_bytes = vec![];
	while let Some(item) = req.body_mut().next().await {
		let chunk = item.ok().context(Message {
			msg: "Error getting bytes from request body".to_string(),
		})?;
		if msg_bytes.len() + chunk.len() > state.max_payload_size {
			return payload_too_large(state);
		}
		msg_bytes.extend_from_slice(&chunk);
	}

	let sig_hex = signature.trim_start_matches("sha1=");
	let sig_bytes = match base16::decode(sig_hex.as_bytes()) {
		Ok(bytes) => bytes,
		Err(_) => return signature_mismatch(&event),
	};
	if verify(
		state.webhook_secret.trim().as_bytes(),
		&msg_bytes,
		&sig_bytes,
	)
	.is_err()
	{
		return signature_mismatch(&event);
	}

	match event.as_str() {
		"ping" => match serde_json::from_slice::<PingPayload>(&msg_bytes) {
			Ok(payload) => handle_ping(payload, state),
			Err(e) => parse_failure(&event, &e),
		},
		"push" => match serde_json::from_slice::<PushPayload>(&msg_bytes) {
			Ok(payload) => handle_push(payload, state),
			Err(e) => parse_failure(&event, &e),
		},
		"pull_request" => {
			match serde_json::from_slice::<PullRequestPayload>(&msg_bytes) {
				Ok(payload) => handle_pull_request(payload, state),
				Err(e) => parse_failure(&event, &e),
			}
		}
		_ => unreachable!("filtered against SUPPORTED_EVENTS above"),
	}
}

fn payload_too_large(state: &AppState) -> Result<Response<Body>> {
	plain_response(
		StatusCode::PAYLOAD_TOO_LARGE,
		&format!(
			"Payload size exceeds {} byte limit",
			state.max_payload_size
		),
	)
}

fn signature_mismatch(event: &str) -> Result<Response<Body>> {
	log::warn!("HMac verification failed for {} event", event);
	plain_response(
		StatusCode::FORBIDDEN,
		"Payload signature verification failed. Ensure the \
		 'X-Hub-Signature' header and payload are correct",
	)
}

fn parse_failure(
	event: &str,
	err: &serde_json::Error,
) -> Result<Response<Body>> {
	log::warn!("Failed to parse {} payload: {}", event, err);
	plain_response(
		StatusCode::SERVICE_UNAVAILABLE,
		&format!("Failed to parse payload: {}", err),
	)
}

fn handle_ping(
	payload: PingPayload,
	state: &AppState,
) -> Result<Response<Body>> {
	log::info!(
		"Received ping payload from webhook {:?} for repo {}",
		payload.hook_id,
		repo_slug(payload.repository.as_ref())
	);
	state.hook_state.update_last_used();
	plain_response(StatusCode::OK, "OK")
}

fn handle_push(
	payload: PushPayload,
	state: &AppState,
) -> Result<Response<Body>> {
	log::info!(
		"Received push payload for repo {}, ref {}",
		repo_slug(payload.repository.as_ref()),
		payload.ref_field
	);
	state.hook_state.update_last_used();
	if let Some(after) = payload.after.as_ref() {
		state.hook_state.update_branch(&payload.ref_field, after);
	}
	plain_response(StatusCode::OK, "OK")
}

fn handle_pull_request(
	payload: PullRequestPayload,
	state: &AppState,
) -> Result<Response<Body>> {
	if !ACCEPTED_PULL_REQUEST_ACTIONS.contains(&payload.action.as_str()) {
		log::info!(
			"Ignoring 'pull_request' event with action '{}' as unrelated",
			payload.action
		);
		return plain_response(
			StatusCode::ACCEPTED,
			&format!(
				"Unrelated action, expected one of {:?}",
				ACCEPTED_PULL_REQUEST_ACTIONS
			),
		);
	}

	let repo_url = match payload.pull_request.base_repo_html_url() {
		Some(url) => url,
		None => {
			let message = "'pull_request' event payload has no repository \
			               url specified in 'pull_request.base.repo.html_url'";
			log::warn!("{}", message);
			return plain_response(StatusCode::BAD_REQUEST, message);
		}
	};
	let info = match GithubRepoInfo::from_url(repo_url) {
		Some(info) => info,
		None => {
			let message = format!(
				"Cannot determine repository info from url '{}'",
				repo_url
			);
			log::warn!("{}", message);
			return plain_response(StatusCode::SERVICE_UNAVAILABLE, &message);
		}
	};
	log::info!(
		"Received pull_request payload for repo {}/{}, action: {}",
		info.owner,
		info.name,
		payload.action
	);

	state.hook_state.update_last_used();
	let number = payload.number;
	if let Some(sha) = payload
		.pull_request
		.head
		.as_ref()
		.and_then(|head| head.sha.as_ref())
	{
		state
			.hook_state
			.update_branch(&format!("refs/pull/{}/head", number), sha);
	}
	// The merge commit may not be computed yet right after the PR changes;
	// callers can poll it via the REST client later.
	if let Some(sha) = payload
		.pull_request
		.merge_commit_sha
		.as_ref()
		.filter(|sha| !sha.is_empty())
	{
		state
			.hook_state
			.update_branch(&format!("refs/pull/{}/merge", number), sha);
	}
	plain_response(StatusCode::OK, "OK")
}
