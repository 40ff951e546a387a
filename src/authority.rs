use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use std::{
    error::Error as StdError,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    error::AdmissionError,
    models::{AuthorityEnvelope, Identity},
};

/// Path of the Authority's permission-validation endpoint, relative to its base URL.
pub const VALIDATE_PERMISSION_PATH: &str = "/api/auth/validate-permission";

// 1. Authority Contract
/// Authority
///
/// The verification seam of the admission chain. The production implementation
/// calls the auth-service over HTTP; tests swap in `MockAuthority` without touching
/// the middleware.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Resolves the caller's identity from the raw `Authorization` header value.
    /// Implementations hold no per-request state and no cache.
    async fn validate(&self, credential: &HeaderValue) -> Result<Identity, AdmissionError>;
}

/// AuthorityState
///
/// Shared, immutable handle to the configured Authority.
pub type AuthorityState = Arc<dyn Authority>;

/// credential
///
/// Extracts the `Authorization` header exactly as received. Absent or empty headers
/// fail here, before any network traffic.
pub fn credential(headers: &HeaderMap) -> Result<&HeaderValue, AdmissionError> {
    headers
        .get(header::AUTHORIZATION)
        .filter(|value| !value.is_empty())
        .ok_or(AdmissionError::MissingCredential)
}

// 2. The Real Implementation
/// HttpAuthorityClient
///
/// Calls `GET {base}/api/auth/validate-permission` with the caller's header forwarded
/// byte-for-byte. The inner `reqwest::Client` is a pooled handle and is cloned freely;
/// its timeout bounds every round trip.
#[derive(Clone, Debug)]
pub struct HttpAuthorityClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuthorityClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                VALIDATE_PERMISSION_PATH
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Authority for HttpAuthorityClient {
    async fn validate(&self, credential: &HeaderValue) -> Result<Identity, AdmissionError> {
        if credential.is_empty() {
            return Err(AdmissionError::MissingCredential);
        }

        let started = Instant::now();
        let response = self
            .client
            .get(&self.endpoint)
            .header(header::AUTHORIZATION, credential.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| AdmissionError::AuthorityUnreachable {
                cause: error_chain(&e),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AdmissionError::UnreadableBody {
                cause: error_chain(&e),
            })?;

        tracing::debug!(
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "authority round trip completed"
        );

        interpret(status, &body)
    }
}

/// interpret
///
/// Turns one Authority reply into an identity or an admission error. Pure, so the
/// same reply always yields the same result.
///
/// A parseable envelope with a non-zero code is a rejection whatever the HTTP status,
/// since the Authority answers bad credentials with 401 plus an envelope. A non-2xx
/// reply without such an envelope is an Authority failure.
pub fn interpret(status: StatusCode, body: &[u8]) -> Result<Identity, AdmissionError> {
    match serde_json::from_slice::<AuthorityEnvelope>(body) {
        Ok(envelope) if envelope.code != 0 => Err(AdmissionError::Rejected {
            message: envelope.message,
        }),
        Ok(_) if !status.is_success() => Err(AdmissionError::AuthorityStatus {
            status: status.as_u16(),
        }),
        Ok(envelope) => {
            let data = envelope
                .data
                .ok_or_else(|| AdmissionError::MalformedEnvelope {
                    cause: "data is missing".to_string(),
                })?;
            serde_json::from_value(data).map_err(|e| AdmissionError::MalformedEnvelope {
                cause: e.to_string(),
            })
        }
        Err(_) if !status.is_success() => Err(AdmissionError::AuthorityStatus {
            status: status.as_u16(),
        }),
        Err(e) => Err(AdmissionError::MalformedEnvelope {
            cause: e.to_string(),
        }),
    }
}

// reqwest's top-level Display hides the OS error ("Connection refused"); walk the chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

// 3. The Mock Implementation (For Tests)
/// MockAuthority
///
/// Returns a fixed outcome and counts how often it was consulted, so tests can
/// assert that a request never reached the Authority.
#[derive(Clone)]
pub struct MockAuthority {
    outcome: Result<Identity, AdmissionError>,
    calls: Arc<AtomicUsize>,
}

impl MockAuthority {
    pub fn accepting(identity: Identity) -> Self {
        Self {
            outcome: Ok(identity),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: AdmissionError) -> Self {
        Self {
            outcome: Err(error),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authority for MockAuthority {
    async fn validate(&self, credential: &HeaderValue) -> Result<Identity, AdmissionError> {
        if credential.is_empty() {
            return Err(AdmissionError::MissingCredential);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDENT_REPLY: &str = r#"{"code":0,"message":"","data":{"user_id":"42","username":"alice","user_type":"student","role":"class_monitor","status":"active","real_name":"Alice"}}"#;

    #[test]
    fn success_envelope_yields_every_attribute() {
        let identity = interpret(StatusCode::OK, STUDENT_REPLY.as_bytes()).unwrap();
        assert_eq!(
            identity,
            Identity {
                user_id: "42".to_string(),
                username: "alice".to_string(),
                user_type: "student".to_string(),
                role: Some("class_monitor".to_string()),
                status: "active".to_string(),
                real_name: "Alice".to_string(),
            }
        );
    }

    #[test]
    fn same_reply_same_identity() {
        let first = interpret(StatusCode::OK, STUDENT_REPLY.as_bytes());
        let second = interpret(StatusCode::OK, STUDENT_REPLY.as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn non_zero_code_is_a_rejection_even_with_401_status() {
        let body = r#"{"code":401,"message":"无效的认证令牌","data":null}"#;
        assert_eq!(
            interpret(StatusCode::UNAUTHORIZED, body.as_bytes()),
            Err(AdmissionError::Rejected {
                message: "无效的认证令牌".to_string()
            })
        );
    }

    #[test]
    fn non_2xx_without_envelope_is_an_authority_failure() {
        let err = interpret(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>").unwrap_err();
        assert_eq!(err, AdmissionError::AuthorityStatus { status: 502 });
        assert!(err.is_infrastructure());
    }

    #[test]
    fn garbage_body_is_a_parse_failure() {
        let err = interpret(StatusCode::OK, b"{not json").unwrap_err();
        assert!(matches!(err, AdmissionError::MalformedEnvelope { .. }));
        assert!(err.to_string().starts_with("认证失败: 解析响应失败: "));
    }

    #[test]
    fn success_without_data_is_malformed() {
        let err = interpret(StatusCode::OK, br#"{"code":0,"message":"ok","data":null}"#).unwrap_err();
        assert!(matches!(err, AdmissionError::MalformedEnvelope { .. }));
    }

    #[test]
    fn missing_header_fails_before_any_call() {
        let headers = HeaderMap::new();
        assert_eq!(credential(&headers), Err(AdmissionError::MissingCredential));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(""));
        assert_eq!(credential(&headers), Err(AdmissionError::MissingCredential));
    }

    #[test]
    fn endpoint_appends_validation_path() {
        let client =
            HttpAuthorityClient::new("http://auth-service:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://auth-service:8081/api/auth/validate-permission"
        );
    }
}
