use std::net::SocketAddr;
use std::sync::Arc;

use hyper::{
	service::{make_service_fn, service_fn},
	Body, Request, Server,
};
use snafu::ResultExt;

use crate::{
	error,
	webhook::{webhook, AppState},
	Result,
};

/// Bind `addr` and serve the webhook handler until the server is stopped.
pub async fn init_server(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
	let service = make_service_fn(move |_| {
		let state = Arc::clone(&state);
		async move {
			Ok::<_, crate::error::Error>(service_fn(
				move |req: Request<Body>| {
					let state = Arc::clone(&state);
					webhook(req, state)
				},
			))
		}
	});

	let server = Server::try_bind(&addr).context(error::Hyper)?.serve(service);
	log::info!("Listening on {}", addr);

	server.await.context(error::Hyper)
}
