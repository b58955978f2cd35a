//! HTTP Surface
//!
//! Thin hyper front end over a shared [`CacheCoordinator`].
//!
//! | Route                    | Method | Response                              |
//! |--------------------------|--------|---------------------------------------|
//! | `/`                      | GET    | service banner                        |
//! | `/data/{key}`            | GET    | cached JSON value, 502 on origin fail |
//! | `/data/{key}`            | DELETE | 204 if invalidated, 404 if absent     |
//! | `/metrics`               | GET    | counters as JSON                      |
//! | `/metrics/prometheus`    | GET    | counters as Prometheus text           |
//! | `/healthz` `/livez` `/readyz` | GET | `ok`                              |

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cache::CacheCoordinator;
use crate::error::{Error, Result};

/// Response header naming the path that produced a `/data` value
pub const CACHE_SOURCE_HEADER: &str = "x-cache-source";

const BANNER: &str = "Multi-layer cache service running";
const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

type HttpResponse = Response<Full<Bytes>>;

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => respond(status, JSON, bytes),
        Err(e) => {
            error!("Failed to encode response body: {}", e);
            respond(StatusCode::INTERNAL_SERVER_ERROR, TEXT, "internal error")
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> HttpResponse {
    respond(status, TEXT, body)
}

/// Dispatch a single request
pub async fn route(coordinator: &CacheCoordinator, method: &Method, path: &str) -> HttpResponse {
    if let Some(raw_key) = path.strip_prefix("/data/") {
        return data_route(coordinator, method, raw_key).await;
    }

    let known = matches!(
        path,
        "/" | "/metrics" | "/metrics/prometheus" | "/healthz" | "/livez" | "/readyz"
    );
    if !known {
        return text(StatusCode::NOT_FOUND, "not found");
    }
    if *method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    match path {
        "/" => json_response(StatusCode::OK, &json!({ "message": BANNER })),
        "/metrics" => json_response(StatusCode::OK, &coordinator.metrics()),
        "/metrics/prometheus" => match coordinator.metrics_handle().encode_prometheus() {
            Ok(body) => respond(StatusCode::OK, PROMETHEUS_TEXT, body),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        },
        _ => text(StatusCode::OK, "ok"),
    }
}

async fn data_route(coordinator: &CacheCoordinator, method: &Method, raw_key: &str) -> HttpResponse {
    let key = match urlencoding::decode(raw_key) {
        Ok(key) if !key.is_empty() => key,
        Ok(_) => return text(StatusCode::NOT_FOUND, "not found"),
        Err(_) => return text(StatusCode::BAD_REQUEST, "key is not valid UTF-8"),
    };

    match *method {
        Method::GET => match coordinator.lookup_traced(&key).await {
            Ok(outcome) => {
                let mut response = json_response(StatusCode::OK, &outcome.value);
                response.headers_mut().insert(
                    CACHE_SOURCE_HEADER,
                    HeaderValue::from_static(outcome.source.as_str()),
                );
                response
            }
            Err(e) => {
                warn!(key = %key, "Lookup failed: {}", e);
                let status = match e {
                    Error::Origin { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                json_response(status, &json!({ "key": key, "error": e.to_string() }))
            }
        },
        Method::DELETE => {
            if coordinator.invalidate(&key).await {
                respond(StatusCode::NO_CONTENT, TEXT, Bytes::new())
            } else {
                text(StatusCode::NOT_FOUND, "not found")
            }
        }
        _ => text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    }
}

/// Bind the listening socket
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", addr, e)))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        Error::Io(e)
    })?;

    info!("Cache server listening on {}", addr);
    Ok(listener)
}

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, coordinator: Arc<CacheCoordinator>) -> Result<()> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Cache server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let coordinator = Arc::clone(&coordinator);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let coordinator = Arc::clone(&coordinator);
                async move {
                    let response = route(&coordinator, req.method(), req.uri().path()).await;
                    Ok::<_, Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(%peer, "Cache server connection error: {}", e);
            }
        });
    }
}

/// Bind `addr` and serve until the accept loop fails
pub async fn run_server(addr: &str, coordinator: Arc<CacheCoordinator>) -> Result<()> {
    let listener = bind(addr).await?;
    serve(listener, coordinator).await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, SimulatedOrigin};
    use crate::cache::CoordinatorConfig;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;

    fn coordinator() -> CacheCoordinator {
        let origin = SimulatedOrigin::new(Duration::ZERO).failing_on("bad:");
        CacheCoordinator::new(
            CoordinatorConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(origin),
        )
        .unwrap()
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn source(response: &HttpResponse) -> &str {
        response.headers()[CACHE_SOURCE_HEADER].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_banner() {
        let c = coordinator();
        let response = route(&c, &Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], BANNER);
    }

    #[tokio::test]
    async fn test_data_lookup_and_source_header() {
        let c = coordinator();

        let first = route(&c, &Method::GET, "/data/user%3A1").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(source(&first), "leader");
        assert_eq!(body_json(first).await["key"], "user:1");

        let second = route(&c, &Method::GET, "/data/user:1").await;
        assert_eq!(source(&second), "l1");
    }

    #[tokio::test]
    async fn test_origin_failure_is_bad_gateway() {
        let c = coordinator();
        let response = route(&c, &Method::GET, "/data/bad:1").await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["key"], "bad:1");
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let c = coordinator();
        route(&c, &Method::GET, "/data/k").await;

        let response = route(&c, &Method::DELETE, "/data/k").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = route(&c, &Method::DELETE, "/data/k").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_json() {
        let c = coordinator();
        route(&c, &Method::GET, "/data/a").await;
        route(&c, &Method::GET, "/data/a").await;

        let metrics = body_json(route(&c, &Method::GET, "/metrics").await).await;
        assert_eq!(metrics["l1_hits"], 1);
        assert_eq!(metrics["l2_hits"], 0);
        assert_eq!(metrics["cache_misses"], 1);
        assert_eq!(metrics["l1_evictions"], 0);
    }

    #[tokio::test]
    async fn test_prometheus_text() {
        let c = coordinator();
        route(&c, &Method::GET, "/data/a").await;

        let response = route(&c, &Method::GET, "/metrics/prometheus").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("stampede_cache_cache_misses_total 1"));
    }

    #[tokio::test]
    async fn test_probes_and_unknown_routes() {
        let c = coordinator();
        for path in ["/healthz", "/livez", "/readyz"] {
            assert_eq!(route(&c, &Method::GET, path).await.status(), StatusCode::OK);
        }
        assert_eq!(route(&c, &Method::GET, "/nope").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(route(&c, &Method::GET, "/data/").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            route(&c, &Method::POST, "/metrics").await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            route(&c, &Method::PUT, "/data/k").await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        assert!(matches!(bind("not-an-addr").await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_io_error() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        match bind(&addr).await {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AddrInUse),
            other => panic!("expected Io error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, Arc::new(coordinator())));

        let url = format!("http://{}/data/k", addr);
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()[CACHE_SOURCE_HEADER], "leader");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["value"], "data_for_k");

        server.abort();
    }
}
