use std::sync::Arc;

use deadbolt_lock::Transport;

use crate::{Hub, UnlockError};

pub type HttpResult<E = std::io::Error> = Result<HttpResponse, E>;

pub type HttpResponse =
    hyper::Response<http_body_util::combinators::BoxBody<hyper::body::Bytes, std::io::Error>>;

pub async fn run_server<T: Transport>(addr: &str, hub: Arc<Hub<T>>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::task::spawn(handle_connection(stream, Arc::clone(&hub)));
            }
            Err(e) => {
                tracing::warn!("failed to accept: {e:?}");
                continue;
            }
        }
    }
}

async fn handle_connection<T: Transport>(stream: tokio::net::TcpStream, hub: Arc<Hub<T>>) {
    let io = hyper_util::rt::TokioIo::new(stream);

    let builder =
        hyper_util::server::conn::auto::Builder::new(hyper_util::rt::tokio::TokioExecutor::new());
    let conn = builder.serve_connection(
        io,
        hyper::service::service_fn(|r| handle_request(r, Arc::clone(&hub))),
    );

    if let Err(e) = conn.await {
        tracing::warn!("connection error: {e:?}");
    }
}

async fn handle_request<T: Transport>(
    r: hyper::Request<hyper::body::Incoming>,
    hub: Arc<Hub<T>>,
) -> HttpResult {
    let response = route(r.method(), r.uri().path(), &hub).await;
    if let Ok(resp) = &response {
        tracing::info!("{} {} {}", r.method(), r.uri().path(), resp.status().as_u16());
    }
    response
}

pub async fn route<T: Transport>(method: &hyper::Method, path: &str, hub: &Hub<T>) -> HttpResult {
    match path {
        "/api/unlock" if *method == hyper::Method::GET => unlock(hub).await,
        "/api/unlock" => deadbolt_hub::method_not_allowed!("{method} not allowed"),
        t => deadbolt_hub::not_found!("not found: {t}"),
    }
}

async fn unlock<T: Transport>(hub: &Hub<T>) -> HttpResult {
    match hub.unlock().await {
        Ok(()) => bytes_to_resp(vec![], hyper::StatusCode::NO_CONTENT),
        Err(UnlockError::NoLock) => {
            bytes_to_resp(vec![], hyper::StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(UnlockError::Lock(e)) => {
            tracing::warn!("unlock failed: {e}");
            deadbolt_hub::bad_gateway!("unlock failed: {e}")
        }
    }
}

pub fn bytes_to_resp(bytes: Vec<u8>, status: hyper::StatusCode) -> HttpResult {
    use http_body_util::BodyExt;

    let mut r = hyper::Response::new(
        http_body_util::Full::new(hyper::body::Bytes::from(bytes))
            .map_err(|e| match e {})
            .boxed(),
    );
    *r.status_mut() = status;
    Ok(r)
}

pub fn not_found_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::NOT_FOUND)
}

pub fn method_not_allowed_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::METHOD_NOT_ALLOWED)
}

pub fn bad_gateway_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::BAD_GATEWAY)
}

#[macro_export]
macro_rules! not_found {
    ($($t:tt)*) => {{
        deadbolt_hub::http::not_found_(format!($($t)*))
    }};
}

#[macro_export]
macro_rules! method_not_allowed {
    ($($t:tt)*) => {{
        deadbolt_hub::http::method_not_allowed_(format!($($t)*))
    }};
}

#[macro_export]
macro_rules! bad_gateway {
    ($($t:tt)*) => {{
        deadbolt_hub::http::bad_gateway_(format!($($t)*))
    }};
}
