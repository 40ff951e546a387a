use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    config::{GatewayConfig, UpstreamRoute},
    models::{ApiEnvelope, HealthStatus},
    observability,
};

// Hop-by-hop headers (RFC 9110 §7.6.1) describe one connection and are not forwarded.
// `host` and `content-length` are recomputed for the upstream connection.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// RouteTable
///
/// Reverse-dispatch table: path prefix to upstream base URL. Entries are kept longest
/// prefix first so the most specific registration wins.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<UpstreamRoute>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<UpstreamRoute>) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    /// resolve
    ///
    /// Matches on whole path segments: `/api/students` covers `/api/students` and
    /// `/api/students/7`, but not `/api/studentsx`.
    pub fn resolve(&self, path: &str) -> Option<&UpstreamRoute> {
        self.routes.iter().find(|route| {
            let prefix = route.prefix.trim_end_matches('/');
            match path.strip_prefix(prefix) {
                Some(rest) => prefix.is_empty() || rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }
}

/// GatewayState
///
/// Shared by every forwarded request: the immutable route table and one pooled
/// outbound client.
#[derive(Clone)]
pub struct GatewayState {
    pub routes: Arc<RouteTable>,
    pub client: reqwest::Client,
}

impl GatewayState {
    pub fn new(routes: Vec<UpstreamRoute>, upstream_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(upstream_timeout).build()?;
        Ok(Self {
            routes: Arc::new(RouteTable::new(routes)),
            client,
        })
    }
}

/// forward
///
/// Proxies one request to the upstream that owns its path. Method, path, query,
/// headers (the `Authorization` header included) and body go through untouched; the
/// upstream's status, headers and body come back untouched. The gateway itself never
/// looks at the credential.
pub async fn forward(State(state): State<GatewayState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let Some(route) = state.routes.resolve(&path) else {
        tracing::warn!(%path, "no upstream registered for path");
        return gateway_error(StatusCode::NOT_FOUND, format!("未注册的路由: {path}"));
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", route.base_url, path_and_query);

    let method = request.method().clone();
    let headers = strip_hop_by_hop(request.headers());

    // The body limit comes from `DefaultBodyLimit`; only an oversized body is a 413,
    // a body the client abandoned halfway is a 400.
    let body = match Bytes::from_request(request, &state).await {
        Ok(bytes) => bytes,
        Err(rejection) => {
            tracing::warn!(%path, error = %rejection, "request body could not be buffered");
            return gateway_error(rejection.status(), format!("读取请求体失败: {rejection}"));
        }
    };

    let upstream = state
        .client
        .request(method.clone(), &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            tracing::error!(%url, error = %e, "upstream request timed out");
            return gateway_error(StatusCode::GATEWAY_TIMEOUT, format!("上游服务超时: {e}"));
        }
        Err(e) => {
            tracing::error!(%url, error = %e, "upstream request failed");
            return gateway_error(StatusCode::BAD_GATEWAY, format!("上游服务不可用: {e}"));
        }
    };

    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(%url, error = %e, "upstream body could not be read");
            return gateway_error(StatusCode::BAD_GATEWAY, format!("读取上游响应失败: {e}"));
        }
    };

    tracing::debug!(%method, %url, status = status.as_u16(), "forwarded");

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP {
        forwarded.remove(name);
    }
    forwarded
}

fn gateway_error(status: StatusCode, message: String) -> Response {
    let body = ApiEnvelope::failure(i32::from(status.as_u16()), message);
    (status, Json(body)).into_response()
}

async fn gateway_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        service: "api-gateway".to_string(),
    })
}

/// create_gateway_router
///
/// The gateway answers `/health` itself and forwards everything else. Forwarded
/// bodies are buffered up to `max_body_bytes`.
pub fn create_gateway_router(state: GatewayState, config: &GatewayConfig) -> Router {
    let router = Router::new()
        .route("/health", get(gateway_health))
        .fallback(forward)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state);

    observability::wrap(router, &config.cors_origins, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            UpstreamRoute {
                prefix: "/api".to_string(),
                base_url: "http://fallback".to_string(),
            },
            UpstreamRoute {
                prefix: "/api/students".to_string(),
                base_url: "http://student-info".to_string(),
            },
            UpstreamRoute {
                prefix: "/api/students/register".to_string(),
                base_url: "http://user-service".to_string(),
            },
        ])
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table();
        assert_eq!(
            table.resolve("/api/students/register").unwrap().base_url,
            "http://user-service"
        );
        assert_eq!(
            table.resolve("/api/students/17").unwrap().base_url,
            "http://student-info"
        );
        assert_eq!(
            table.resolve("/api/teachers").unwrap().base_url,
            "http://fallback"
        );
    }

    #[test]
    fn prefixes_match_whole_segments() {
        let table = table();
        assert_eq!(
            table.resolve("/api/studentsx").unwrap().base_url,
            "http://fallback"
        );
        assert!(table.resolve("/apix").is_none());
        assert!(table.resolve("/health").is_none());
    }

    #[test]
    fn hop_by_hop_headers_are_dropped_but_authorization_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(header::HOST, "gateway:8080".parse().unwrap());
        headers.insert("x-custom", "1".parse().unwrap());

        let forwarded = strip_hop_by_hop(&headers);
        assert_eq!(forwarded.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(forwarded.get("x-custom").unwrap(), "1");
        assert!(forwarded.get(header::CONNECTION).is_none());
        assert!(forwarded.get(header::HOST).is_none());
    }
}
