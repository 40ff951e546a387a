use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{config::FailureMode, models::ApiEnvelope, roles::RoleSet};

/// AdmissionError
///
/// Every way the admission chain can turn a request away. The Display text is the
/// exact message placed in the response envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// No usable `Authorization` header; the Authority was not contacted.
    #[error("认证失败: 未提供认证令牌")]
    MissingCredential,

    /// A role gate ran without a verified identity in scope.
    #[error("用户未认证")]
    NotAuthenticated,

    /// The identity context was bound twice for one request.
    #[error("认证失败: 身份上下文重复写入")]
    IdentityRebound,

    /// The Authority answered with a non-zero code.
    #[error("认证失败: 权限验证失败: {message}")]
    Rejected { message: String },

    /// Connection refused, timeout, or any other transport failure.
    #[error("认证失败: 请求auth-service失败: {cause}")]
    AuthorityUnreachable { cause: String },

    /// Non-2xx reply that did not carry a readable rejection envelope.
    #[error("认证失败: auth-service返回异常状态: {status}")]
    AuthorityStatus { status: u16 },

    #[error("认证失败: 读取响应失败: {cause}")]
    UnreadableBody { cause: String },

    #[error("认证失败: 解析响应失败: {cause}")]
    MalformedEnvelope { cause: String },

    /// Verified identity whose role class is outside the gate's set.
    #[error("仅{}可访问", .allowed.describe())]
    Forbidden { allowed: RoleSet },
}

impl AdmissionError {
    /// True for failures of the Authority itself rather than of the caller's credential.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AdmissionError::AuthorityUnreachable { .. }
                | AdmissionError::AuthorityStatus { .. }
                | AdmissionError::UnreadableBody { .. }
                | AdmissionError::MalformedEnvelope { .. }
        )
    }

    /// status_code
    ///
    /// Resolves the HTTP status under the configured failure mode. Only
    /// infrastructure failures are affected by the mode.
    pub fn status_code(&self, mode: FailureMode) -> StatusCode {
        match self {
            AdmissionError::Forbidden { .. } => StatusCode::FORBIDDEN,
            err if err.is_infrastructure() => mode.status(),
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// render
    ///
    /// Builds the terminal response: status and envelope `code` always agree.
    pub fn render(&self, mode: FailureMode) -> Response {
        let status = self.status_code(mode);
        let body = ApiEnvelope::failure(i32::from(status.as_u16()), self.to_string());
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AdmissionError {
    /// Renders with the default failure mode. Middleware that knows the configured
    /// mode calls `render` directly.
    fn into_response(self) -> Response {
        self.render(FailureMode::default())
    }
}
