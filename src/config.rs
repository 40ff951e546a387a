use std::{env, time::Duration};

use axum::http::StatusCode;

/// AppConfig
///
/// Holds the protected service's configuration. Loaded once at startup and never
/// mutated afterwards; it travels inside `AppState`, so every request sees the same
/// Authority address, timeouts and failure policy.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects the log format and how strict loading is.
    pub env: Env,
    // Reported by the health endpoint.
    pub service_name: String,
    // Port the HTTP server binds on 0.0.0.0.
    pub port: u16,
    // Base URL of the Authority (auth-service). The validation path is appended to it.
    pub authority_url: String,
    // Upper bound for one outbound round trip to the Authority.
    pub authority_timeout: Duration,
    // Deadline for a whole inbound request, admission chain included.
    pub request_timeout: Duration,
    // Status used when the Authority itself is unavailable or misbehaves.
    pub failure_mode: FailureMode,
    // Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

/// Env
///
/// Defines the runtime context: pretty logs and local defaults versus JSON logs and
/// mandatory infrastructure settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// FailureMode
///
/// How an Authority outage is reported to the caller. Credential rejections are
/// always 401; this only governs unreachable, non-2xx or unparseable Authority replies.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FailureMode {
    /// Fold outages into the 401 class, like a rejected credential.
    #[default]
    Unauthorized,
    /// Report outages as 503 so callers can tell them apart from bad credentials.
    ServiceUnavailable,
}

impl FailureMode {
    pub fn status(self) -> StatusCode {
        match self {
            FailureMode::Unauthorized => StatusCode::UNAUTHORIZED,
            FailureMode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "401" => Some(FailureMode::Unauthorized),
            "503" => Some(FailureMode::ServiceUnavailable),
            _ => None,
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for test scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            service_name: "admission-gate".to_string(),
            port: 8085,
            authority_url: "http://localhost:8081".to_string(),
            authority_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            failure_mode: FailureMode::Unauthorized,
            cors_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics if `AUTH_SERVICE_URL` is missing in production, if any numeric or
    /// enumerated variable is present but invalid, or if the Authority timeout is not
    /// shorter than the request deadline. A service that cannot reach its
    /// Authority would reject every request, so it must not start.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let authority_url = match env {
            Env::Production => env::var("AUTH_SERVICE_URL")
                .expect("FATAL: AUTH_SERVICE_URL must be set in production."),
            Env::Local => env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
        };

        let failure_mode = match env::var("AUTHORITY_FAILURE_STATUS") {
            Ok(raw) => FailureMode::parse(&raw)
                .expect("FATAL: AUTHORITY_FAILURE_STATUS must be 401 or 503."),
            Err(_) => FailureMode::default(),
        };

        // The Authority round trip must give up before the request deadline does, so a
        // slow Authority surfaces as an admission failure and not as a bare deadline.
        let authority_timeout = Duration::from_secs(parse_var("AUTH_SERVICE_TIMEOUT_SECS", 5));
        let request_timeout = Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", 30));
        if authority_timeout >= request_timeout {
            panic!(
                "FATAL: AUTH_SERVICE_TIMEOUT_SECS ({}) must be shorter than REQUEST_TIMEOUT_SECS ({}).",
                authority_timeout.as_secs(),
                request_timeout.as_secs()
            );
        }

        Self {
            env,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "admission-gate".to_string()),
            port: parse_var("PORT", 8085),
            authority_url: authority_url.trim_end_matches('/').to_string(),
            authority_timeout,
            request_timeout,
            failure_mode,
            cors_origins: parse_origins(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
        }
    }
}

/// UpstreamRoute
///
/// One row of the gateway's reverse-dispatch table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamRoute {
    pub prefix: String,
    pub base_url: String,
}

/// Default forwarding body limit, sized for the CSV/Excel imports behind the gateway.
const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// GatewayConfig
///
/// Configuration for the gateway binary. The gateway never verifies identities, so
/// it carries no Authority settings at all.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub env: Env,
    pub port: u16,
    pub upstream_timeout: Duration,
    // Largest request body buffered for forwarding; larger bodies get 413.
    pub max_body_bytes: usize,
    pub routes: Vec<UpstreamRoute>,
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: 8080,
            upstream_timeout: Duration::from_secs(30),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            routes: Vec::new(),
            cors_origins: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// load
    ///
    /// # Panics
    /// Panics when `GATEWAY_ROUTES` is malformed, or empty in production.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let raw_routes = env::var("GATEWAY_ROUTES").unwrap_or_default();
        let routes = parse_routes(&raw_routes)
            .unwrap_or_else(|entry| panic!("FATAL: invalid GATEWAY_ROUTES entry `{entry}`"));
        if env == Env::Production && routes.is_empty() {
            panic!("FATAL: GATEWAY_ROUTES must be set in production.");
        }

        Self {
            env,
            port: parse_var("GATEWAY_PORT", 8080),
            upstream_timeout: Duration::from_secs(parse_var("GATEWAY_UPSTREAM_TIMEOUT_SECS", 30)),
            max_body_bytes: parse_var("GATEWAY_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            routes,
            cors_origins: parse_origins(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
        }
    }
}

/// parse_routes
///
/// Parses `prefix=base_url` pairs separated by commas. Returns the offending entry
/// on failure.
pub fn parse_routes(raw: &str) -> Result<Vec<UpstreamRoute>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, base_url) = entry.split_once('=').ok_or_else(|| entry.to_string())?;
            let (prefix, base_url) = (prefix.trim(), base_url.trim());
            if !prefix.starts_with('/') || base_url.is_empty() {
                return Err(entry.to_string());
            }
            Ok(UpstreamRoute {
                prefix: prefix.to_string(),
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        })
        .collect()
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(str::to_string)
        .collect()
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} has an invalid value `{raw}`")),
        Err(_) => default,
    }
}
