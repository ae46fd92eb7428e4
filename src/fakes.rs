//! In-memory stand-ins for container-provided HTTP request, response and
//! session objects. They exist so handler code can be unit-tested without
//! binding a socket: build a [`FakeRequest`], convert it into a real
//! `hyper::Request`, run the handler, and capture the answer in a
//! [`FakeResponse`]. All interior state is behind locks so concurrent test
//! harnesses can share one instance across threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, TimeZone, Utc};
use hyper::{Body, Request, Response, StatusCode};
use parking_lot::{Mutex, RwLock};
use snafu::{OptionExt, ResultExt};

use crate::{
	error,
	webhook::{self, WEBHOOK_PATH, X_GITHUB_EVENT, X_HUB_SIGNATURE},
	Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
	pub name: String,
	pub value: String,
	/// `Some(0)` marks the cookie for deletion, mirroring the container
	/// convention.
	pub max_age: Option<i64>,
	pub path: Option<String>,
}

impl Cookie {
	pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			max_age: None,
			path: None,
		}
	}
}

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fake of a container-managed session: process-unique id, creation time and
/// a concurrent attribute map. After [`invalidate`](Self::invalidate),
/// attribute reads panic the way a container would reject them.
pub struct FakeSession {
	id: String,
	created_at: SystemTime,
	max_inactive_interval: AtomicU64,
	attributes: RwLock<HashMap<String, serde_json::Value>>,
	invalidated: AtomicBool,
}

impl FakeSession {
	pub fn new() -> Self {
		Self {
			id: (SESSION_COUNTER.fetch_add(1, Ordering::SeqCst) + 1)
				.to_string(),
			created_at: SystemTime::now(),
			max_inactive_interval: AtomicU64::new(0),
			attributes: RwLock::new(HashMap::new()),
			invalidated: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn created_at(&self) -> SystemTime {
		self.created_at
	}

	pub fn set_max_inactive_interval(&self, secs: u64) {
		self.max_inactive_interval.store(secs, Ordering::SeqCst);
	}

	pub fn max_inactive_interval(&self) -> u64 {
		self.max_inactive_interval.load(Ordering::SeqCst)
	}

	pub fn attribute(&self, name: &str) -> Option<serde_json::Value> {
		self.check_valid();
		self.attributes.read().get(name).cloned()
	}

	pub fn set_attribute<V: Into<serde_json::Value>>(
		&self,
		name: &str,
		value: V,
	) {
		self.attributes
			.write()
			.insert(name.to_string(), value.into());
	}

	pub fn remove_attribute(&self, name: &str) {
		self.attributes.write().remove(name);
	}

	pub fn attribute_names(&self) -> Vec<String> {
		self.check_valid();
		self.attributes.read().keys().cloned().collect()
	}

	pub fn invalidate(&self) {
		self.attributes.write().clear();
		self.invalidated.store(true, Ordering::SeqCst);
	}

	pub fn is_invalidated(&self) -> bool {
		self.invalidated.load(Ordering::SeqCst)
	}

	fn check_valid(&self) {
		assert!(!self.is_invalidated(), "session invalidated");
	}
}

impl Default for FakeSession {
	fn default() -> Self {
		Self::new()
	}
}

/// Fake of a container-provided HTTP request. Scalar fields are set through
/// `&mut` setters during test setup; collections stay behind locks so the
/// built request can be shared between test threads.
pub struct FakeRequest {
	method: String,
	request_uri: String,
	request_url: String,
	query_string: Option<String>,
	context_path: String,
	remote_addr: String,
	server_name: String,
	server_port: u16,
	// keys are stored lowercase, header lookup is case-insensitive
	headers: RwLock<BTreeMap<String, String>>,
	parameters: RwLock<HashMap<String, Vec<String>>>,
	cookies: RwLock<Vec<Cookie>>,
	attributes: RwLock<HashMap<String, serde_json::Value>>,
	body: RwLock<Vec<u8>>,
	session: RwLock<Option<Arc<FakeSession>>>,
}

impl FakeRequest {
	pub fn new() -> Self {
		Self {
			method: "GET".to_string(),
			request_uri: "/".to_string(),
			request_url: "http://localhost/".to_string(),
			query_string: None,
			context_path: String::new(),
			remote_addr: "127.0.0.1".to_string(),
			server_name: "localhost".to_string(),
			server_port: 80,
			headers: RwLock::new(BTreeMap::new()),
			parameters: RwLock::new(HashMap::new()),
			cookies: RwLock::new(Vec::new()),
			attributes: RwLock::new(HashMap::new()),
			body: RwLock::new(Vec::new()),
			session: RwLock::new(None),
		}
	}

	pub fn method(&self) -> &str {
		&self.method
	}

	pub fn set_method(&mut self, method: &str) {
		self.method = method.to_string();
	}

	pub fn request_uri(&self) -> &str {
		&self.request_uri
	}

	pub fn set_request_uri(&mut self, uri: &str) {
		self.request_uri = uri.to_string();
	}

	pub fn request_url(&self) -> &str {
		&self.request_url
	}

	pub fn set_request_url<U: Into<String>>(&mut self, url: U) {
		self.request_url = url.into();
	}

	pub fn query_string(&self) -> Option<&str> {
		self.query_string.as_deref()
	}

	/// Stores the query string and folds its pairs into the parameter map.
	pub fn set_query_string(&mut self, query: &str) {
		self.query_string = if query.is_empty() {
			None
		} else {
			Some(query.to_string())
		};
		for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
			self.add_parameter(&name, &value);
		}
	}

	pub fn context_path(&self) -> &str {
		&self.context_path
	}

	pub fn set_context_path(&mut self, context_path: &str) {
		self.context_path = context_path.to_string();
	}

	pub fn remote_addr(&self) -> &str {
		&self.remote_addr
	}

	pub fn set_remote_addr(&mut self, addr: &str) {
		self.remote_addr = addr.to_string();
	}

	pub fn server_name(&self) -> &str {
		&self.server_name
	}

	pub fn server_port(&self) -> u16 {
		self.server_port
	}

	/// Sets the `Host` header and splits it into server name and port.
	pub fn set_host(&mut self, host: &str) {
		self.set_header("host", host);
		let mut parts = host.splitn(2, ':');
		if let Some(name) = parts.next() {
			self.server_name = name.to_string();
		}
		if let Some(port) = parts.next().and_then(|p| p.parse().ok()) {
			self.server_port = port;
		}
	}

	pub fn header(&self, name: &str) -> Option<String> {
		self.headers.read().get(&name.to_lowercase()).cloned()
	}

	pub fn set_header(&self, name: &str, value: &str) {
		self.headers
			.write()
			.insert(name.to_lowercase(), value.to_string());
	}

	pub fn header_names(&self) -> Vec<String> {
		self.headers.read().keys().cloned().collect()
	}

	pub fn int_header(&self, name: &str) -> Option<i64> {
		self.header(name).and_then(|v| v.parse().ok())
	}

	/// Parses a date header in the formats containers accept: RFC 1123
	/// (preferred), the obsolete RFC 850 form, and asctime.
	pub fn date_header(&self, name: &str) -> Option<DateTime<Utc>> {
		let value = self.header(name)?;
		DateTime::parse_from_rfc2822(&value)
			.map(|dt| dt.with_timezone(&Utc))
			.ok()
			.or_else(|| {
				chrono::NaiveDateTime::parse_from_str(
					&value,
					"%A, %d-%b-%y %H:%M:%S GMT",
				)
				.ok()
				.map(|naive| Utc.from_utc_datetime(&naive))
			})
			.or_else(|| {
				chrono::NaiveDateTime::parse_from_str(
					&value,
					"%a %b %e %H:%M:%S %Y",
				)
				.ok()
				.map(|naive| Utc.from_utc_datetime(&naive))
			})
	}

	pub fn parameter(&self, name: &str) -> Option<String> {
		self.parameters
			.read()
			.get(name)
			.and_then(|values| values.first().cloned())
	}

	pub fn parameter_values(&self, name: &str) -> Option<Vec<String>> {
		self.parameters.read().get(name).cloned()
	}

	pub fn parameter_names(&self) -> Vec<String> {
		self.parameters.read().keys().cloned().collect()
	}

	pub fn add_parameter(&self, name: &str, value: &str) {
		self.parameters
			.write()
			.entry(name.to_string())
			.or_insert_with(Vec::new)
			.push(value.to_string());
	}

	pub fn set_parameter(&self, name: &str, values: &[&str]) {
		self.parameters.write().insert(
			name.to_string(),
			values.iter().map(|v| v.to_string()).collect(),
		);
	}

	pub fn cookies(&self) -> Vec<Cookie> {
		self.cookies.read().clone()
	}

	pub fn add_cookie(&self, cookie: Cookie) {
		self.cookies.write().push(cookie);
	}

	pub fn attribute(&self, name: &str) -> Option<serde_json::Value> {
		self.attributes.read().get(name).cloned()
	}

	pub fn set_attribute<V: Into<serde_json::Value>>(
		&self,
		name: &str,
		value: V,
	) {
		self.attributes
			.write()
			.insert(name.to_string(), value.into());
	}

	pub fn remove_attribute(&self, name: &str) {
		self.attributes.write().remove(name);
	}

	pub fn clear_attributes(&self) {
		self.attributes.write().clear();
	}

	pub fn body(&self) -> Vec<u8> {
		self.body.read().clone()
	}

	pub fn set_body<B: Into<Vec<u8>>>(&self, body: B) {
		*self.body.write() = body.into();
	}

	/// Returns the session, lazily creating it when `create` is set.
	pub fn session(&self, create: bool) -> Option<Arc<FakeSession>> {
		if create {
			let mut slot = self.session.write();
			if slot.is_none() {
				*slot = Some(Arc::new(FakeSession::new()));
			}
			slot.clone()
		} else {
			self.session.read().clone()
		}
	}

	pub fn set_session(&self, session: Arc<FakeSession>) {
		*self.session.write() = Some(session);
	}

	/// Builds the real request the handler under test consumes.
	pub fn into_request(self) -> Result<Request<Body>> {
		let uri = match self.query_string {
			Some(ref query) => format!("{}?{}", self.request_uri, query),
			None => self.request_uri.clone(),
		};
		let mut builder =
			Request::builder().method(self.method.as_str()).uri(uri);
		for (name, value) in self.headers.read().iter() {
			builder = builder.header(name.as_str(), value.as_str());
		}
		let body = self.body.read().clone();
		builder.body(Body::from(body)).ok().context(error::Message {
			msg: "Error building request".to_string(),
		})
	}
}

impl Default for FakeRequest {
	fn default() -> Self {
		Self::new()
	}
}

/// Fake of a container-provided HTTP response: a status, a header multimap,
/// cookies and a buffered body. Can also capture a real `hyper::Response`
/// so tests can assert on handler output.
pub struct FakeResponse {
	status: RwLock<StatusCode>,
	content_type: RwLock<Option<String>>,
	redirect_url: RwLock<Option<String>>,
	// multimap preserving insertion order
	headers: RwLock<Vec<(String, String)>>,
	cookies: RwLock<Vec<Cookie>>,
	body: Mutex<Vec<u8>>,
}

impl FakeResponse {
	pub fn new() -> Self {
		Self {
			status: RwLock::new(StatusCode::OK),
			content_type: RwLock::new(None),
			redirect_url: RwLock::new(None),
			headers: RwLock::new(Vec::new()),
			cookies: RwLock::new(Vec::new()),
			body: Mutex::new(Vec::new()),
		}
	}

	pub fn status(&self) -> StatusCode {
		*self.status.read()
	}

	pub fn set_status(&self, status: StatusCode) {
		*self.status.write() = status;
	}

	pub fn send_error(&self, status: StatusCode) {
		self.set_status(status);
	}

	pub fn content_type(&self) -> Option<String> {
		self.content_type.read().clone()
	}

	pub fn set_content_type(&self, content_type: &str) {
		*self.content_type.write() = Some(content_type.to_string());
	}

	pub fn send_redirect(&self, url: &str) {
		*self.redirect_url.write() = Some(url.to_string());
		self.set_status(StatusCode::FOUND);
	}

	pub fn redirect_url(&self) -> Option<String> {
		self.redirect_url.read().clone()
	}

	pub fn add_header(&self, name: &str, value: &str) {
		self.headers
			.write()
			.push((name.to_lowercase(), value.to_string()));
	}

	/// Replaces every value previously added under `name`.
	pub fn set_header(&self, name: &str, value: &str) {
		let name = name.to_lowercase();
		let mut headers = self.headers.write();
		headers.retain(|(stored, _)| *stored != name);
		headers.push((name, value.to_string()));
	}

	pub fn contains_header(&self, name: &str) -> bool {
		let name = name.to_lowercase();
		self.headers.read().iter().any(|(stored, _)| *stored == name)
	}

	pub fn header(&self, name: &str) -> Option<String> {
		let name = name.to_lowercase();
		self.headers
			.read()
			.iter()
			.find(|(stored, _)| *stored == name)
			.map(|(_, value)| value.clone())
	}

	pub fn headers(&self, name: &str) -> Vec<String> {
		let name = name.to_lowercase();
		self.headers
			.read()
			.iter()
			.filter(|(stored, _)| *stored == name)
			.map(|(_, value)| value.clone())
			.collect()
	}

	pub fn header_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self
			.headers
			.read()
			.iter()
			.map(|(name, _)| name.clone())
			.collect();
		names.dedup();
		names
	}

	/// A cookie with `max_age == 0` removes previously added cookies of the
	/// same name instead of being stored.
	pub fn add_cookie(&self, cookie: Cookie) {
		let mut cookies = self.cookies.write();
		if cookie.max_age == Some(0) {
			cookies.retain(|stored| stored.name != cookie.name);
		} else {
			cookies.push(cookie);
		}
	}

	pub fn cookies(&self) -> Vec<Cookie> {
		self.cookies.read().clone()
	}

	pub fn write(&self, bytes: &[u8]) {
		self.body.lock().extend_from_slice(bytes);
	}

	pub fn output(&self) -> Vec<u8> {
		self.body.lock().clone()
	}

	pub fn output_string(&self) -> String {
		String::from_utf8_lossy(&self.output()).into_owned()
	}

	/// Drains a real response into a fake one for assertions.
	pub async fn capture(response: Response<Body>) -> Result<Self> {
		let (parts, body) = response.into_parts();
		let fake = Self::new();
		fake.set_status(parts.status);
		for (name, value) in parts.headers.iter() {
			fake.add_header(
				name.as_str(),
				value.to_str().unwrap_or_default(),
			);
		}
		if let Some(content_type) = parts
			.headers
			.get(hyper::header::CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
		{
			fake.set_content_type(content_type);
		}
		let bytes = hyper::body::to_bytes(body)
			.await
			.context(error::Hyper)?;
		fake.write(&bytes);
		Ok(fake)
	}
}

impl Default for FakeResponse {
	fn default() -> Self {
		Self::new()
	}
}

/// Builds fully-formed fake requests the way a container would hand them to
/// a controller.
pub struct FakeRequestFactory {
	context_path: String,
}

impl FakeRequestFactory {
	pub fn new<C: Into<String>>(context_path: C) -> Self {
		Self {
			context_path: context_path.into(),
		}
	}

	pub fn get(&self, path: &str, query: &str) -> FakeRequest {
		let mut request = FakeRequest::new();
		request.set_method("GET");
		request.set_request_url(format!(
			"http://localhost{}{}",
			self.context_path, path
		));
		request.set_request_uri(path);
		request.set_query_string(query);
		request.set_context_path(&self.context_path);
		request
	}

	/// A signed GitHub hook delivery for `event`, ready to feed to the
	/// webhook handler.
	pub fn github_event(
		&self,
		event: &str,
		secret: &str,
		payload: &[u8],
	) -> FakeRequest {
		let mut request = FakeRequest::new();
		request.set_method("POST");
		request.set_request_url(format!(
			"http://localhost{}{}",
			self.context_path, WEBHOOK_PATH
		));
		request.set_request_uri(WEBHOOK_PATH);
		request.set_context_path(&self.context_path);
		request.set_header("content-type", "application/json");
		request.set_header(X_GITHUB_EVENT, event);
		request
			.set_header(X_HUB_SIGNATURE, &webhook::sign(secret.as_bytes(), payload));
		request.set_body(payload.to_vec());
		request
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread;

	#[test]
	fn session_ids_are_unique() {
		let first = FakeSession::new();
		let second = FakeSession::new();
		assert_ne!(first.id(), second.id());
	}

	#[test]
	fn session_attributes_last_write_wins() {
		let session = FakeSession::new();
		session.set_attribute("user", "alice");
		session.set_attribute("user", "bob");
		assert_eq!(
			session.attribute("user"),
			Some(serde_json::Value::from("bob"))
		);
		session.remove_attribute("user");
		assert_eq!(session.attribute("user"), None);
	}

	#[test]
	fn session_survives_concurrent_writers() {
		let session = Arc::new(FakeSession::new());
		let handles: Vec<_> = (0..8)
			.map(|i| {
				let session = Arc::clone(&session);
				thread::spawn(move || {
					for j in 0..100 {
						session.set_attribute(
							&format!("key-{}-{}", i, j),
							j,
						);
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(session.attribute_names().len(), 800);
	}

	#[test]
	fn invalidate_clears_attributes() {
		let session = FakeSession::new();
		session.set_attribute("user", "alice");
		session.invalidate();
		assert!(session.is_invalidated());
	}

	#[test]
	#[should_panic(expected = "session invalidated")]
	fn attribute_access_after_invalidate_panics() {
		let session = FakeSession::new();
		session.invalidate();
		session.attribute("user");
	}

	#[test]
	fn request_headers_are_case_insensitive() {
		let request = FakeRequest::new();
		request.set_header("X-GitHub-Event", "push");
		assert_eq!(request.header("x-github-event"), Some("push".to_string()));
		assert_eq!(request.header("X-GITHUB-EVENT"), Some("push".to_string()));
	}

	#[test]
	fn request_parses_date_headers() {
		let request = FakeRequest::new();
		request.set_header("If-Modified-Since", "Fri, 27 Nov 2015 17:50:23 GMT");
		assert_eq!(
			request.date_header("if-modified-since").map(|d| d.timestamp()),
			Some(1448646623)
		);
		request.set_header("If-Modified-Since", "not a date");
		assert_eq!(request.date_header("if-modified-since"), None);
	}

	#[test]
	fn request_parameters_are_multi_valued() {
		let request = FakeRequest::new();
		request.add_parameter("branch", "master");
		request.add_parameter("branch", "develop");
		assert_eq!(request.parameter("branch"), Some("master".to_string()));
		assert_eq!(
			request.parameter_values("branch"),
			Some(vec!["master".to_string(), "develop".to_string()])
		);
		request.set_parameter("branch", &["main"]);
		assert_eq!(
			request.parameter_values("branch"),
			Some(vec!["main".to_string()])
		);
	}

	#[test]
	fn request_session_created_lazily() {
		let request = FakeRequest::new();
		assert!(request.session(false).is_none());
		let session = request.session(true).unwrap();
		let again = request.session(false).unwrap();
		assert_eq!(session.id(), again.id());
	}

	#[test]
	fn factory_builds_get_requests() {
		let factory = FakeRequestFactory::new("/app");
		let request = factory.get("/hooks/github", "repository=octocat%2Fexample");
		assert_eq!(request.method(), "GET");
		assert_eq!(request.request_url(), "http://localhost/app/hooks/github");
		assert_eq!(request.request_uri(), "/hooks/github");
		assert_eq!(
			request.parameter("repository"),
			Some("octocat/example".to_string())
		);
	}

	#[test]
	fn factory_signs_github_events() {
		let factory = FakeRequestFactory::new("");
		let request = factory.github_event("ping", "secret", b"{}");
		assert_eq!(request.header("x-github-event"), Some("ping".to_string()));
		assert_eq!(
			request.header("x-hub-signature"),
			Some(webhook::sign(b"secret", b"{}"))
		);
		assert_eq!(request.body(), b"{}".to_vec());
	}

	#[test]
	fn into_request_preserves_method_headers_and_body() {
		let factory = FakeRequestFactory::new("");
		let fake = factory.github_event("push", "secret", b"{\"ref\":\"x\"}");
		let request = fake.into_request().unwrap();
		assert_eq!(request.method(), hyper::Method::POST);
		assert_eq!(request.uri().path(), WEBHOOK_PATH);
		assert_eq!(
			request.headers().get("x-github-event").unwrap(),
			"push"
		);
	}

	#[test]
	fn response_set_header_replaces_added_values() {
		let response = FakeResponse::new();
		response.add_header("Warning", "a");
		response.add_header("Warning", "b");
		assert_eq!(response.headers("warning"), vec!["a", "b"]);
		response.set_header("warning", "c");
		assert_eq!(response.headers("Warning"), vec!["c"]);
		assert!(response.contains_header("WARNING"));
	}

	#[test]
	fn response_zero_max_age_cookie_removes() {
		let response = FakeResponse::new();
		response.add_cookie(Cookie::new("sid", "1"));
		let mut removal = Cookie::new("sid", "");
		removal.max_age = Some(0);
		response.add_cookie(removal);
		assert!(response.cookies().is_empty());
	}

	#[test]
	fn response_buffers_output() {
		let response = FakeResponse::new();
		response.write(b"hello ");
		response.write(b"world");
		assert_eq!(response.output_string(), "hello world");
	}

	#[tokio::test]
	async fn response_captures_real_responses() {
		let real = Response::builder()
			.status(StatusCode::ACCEPTED)
			.header("content-type", "text/plain; charset=utf-8")
			.body(Body::from("ignored"))
			.unwrap();
		let fake = FakeResponse::capture(real).await.unwrap();
		assert_eq!(fake.status(), StatusCode::ACCEPTED);
		assert_eq!(
			fake.content_type(),
			Some("text/plain; charset=utf-8".to_string())
		);
		assert_eq!(fake.output_string(), "ignored");
	}
}
