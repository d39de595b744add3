//! HTTP front end: a pool of blocking tiny_http workers that hand each
//! request to the async [`Router`].

pub mod auth;
pub mod multipart;
pub mod routes;

use std::{
    io::Read,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use tiny_http::{Header, Request, Response, Server};
use tokio::runtime::Handle;
use uuid::Uuid;

pub use auth::Credentials;
pub use routes::{ApiRequest, ApiResponse, Router};

use crate::config::ServerConfig;

pub struct HttpServer {
    server: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
    shutting_down: Arc<AtomicBool>,
}

impl HttpServer {
    pub fn start(config: &ServerConfig, router: Router, runtime: Handle) -> Result<Self> {
        let server = Server::http(config.bind.as_str())
            .map_err(|err| anyhow!("failed to bind {}: {err}", config.bind))?;
        let server = Arc::new(server);
        let router = Arc::new(router);
        let shutting_down = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let server = Arc::clone(&server);
            let router = Arc::clone(&router);
            let runtime = runtime.clone();
            let shutting_down = Arc::clone(&shutting_down);
            let max_upload_bytes = config.max_upload_bytes;

            let worker = thread::Builder::new()
                .name(format!("chemviz-http-{index}"))
                .spawn(move || loop {
                    let request = match server.recv() {
                        Ok(request) => request,
                        Err(_) if shutting_down.load(Ordering::SeqCst) => break,
                        Err(err) => {
                            error!("Failed to accept request: {err}");
                            continue;
                        }
                    };
                    serve(request, &router, &runtime, max_upload_bytes);
                })
                .context("failed to spawn HTTP worker thread")?;
            workers.push(worker);
        }

        let http = Self {
            server,
            workers,
            shutting_down,
        };
        match http.local_addr() {
            Some(addr) => info!("Listening on http://{addr}"),
            None => info!("Listening on {}", config.bind),
        }
        Ok(http)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub fn shutdown(self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        for worker in self.workers {
            if let Err(err) = worker.join() {
                error!("Failed to join HTTP worker: {err:?}");
            }
        }
        info!("HTTP server stopped");
    }
}

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_string())
}

/// Read the body, or `None` when it exceeds `limit`. A declared
/// `Content-Length` over the limit is refused before any byte is read.
fn read_body(request: &mut Request, limit: usize) -> std::io::Result<Option<Vec<u8>>> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Ok(None);
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body)?;
    Ok((body.len() <= limit).then_some(body))
}

fn serve(mut request: Request, router: &Router, runtime: &Handle, max_upload_bytes: usize) {
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().to_string();
    let url = request.url().to_string();
    let authorization = header_value(&request, "Authorization");

    let response = if let Some(rejection) = router.admit(&url, authorization.as_deref()) {
        rejection
    } else {
        match read_body(&mut request, max_upload_bytes) {
            Ok(Some(body)) => {
                let api_request = ApiRequest {
                    method: method.clone(),
                    url: url.clone(),
                    authorization,
                    content_type: header_value(&request, "Content-Type"),
                    body,
                };
                runtime.block_on(router.dispatch(api_request))
            }
            Ok(None) => ApiResponse::error(
                413,
                &format!("Request body exceeds {max_upload_bytes} bytes"),
            ),
            Err(err) => {
                warn!("[{request_id}] Failed to read request body: {err}");
                ApiResponse::error(400, "Failed to read request body")
            }
        }
    };

    let status = response.status;
    let response = response.with_header("X-Request-Id", &request_id);

    let mut reply = Response::from_data(response.body).with_status_code(status);
    for (name, value) in &response.headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => reply.add_header(header),
            Err(()) => warn!("[{request_id}] Dropping invalid header {name}"),
        }
    }

    if let Err(err) = request.respond(reply) {
        warn!("[{request_id}] Failed to send response: {err}");
    }

    info!(
        "[{request_id}] {method} {url} -> {status} ({} ms)",
        started.elapsed().as_millis()
    );
}
