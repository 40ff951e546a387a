use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity ---

/// Identity
///
/// The caller's attributes as resolved by the Authority for one request. Deserialized
/// once from the Authority's `data` object; a missing or mistyped attribute fails the
/// whole verification instead of leaving a blank field behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    // The Authority's user primary key. Some Authority builds name it `id`.
    #[serde(alias = "id")]
    pub user_id: String,
    pub username: String,
    // Role class checked by the role gates: student, teacher or admin.
    pub user_type: String,
    // Fine-grained role label. The Authority may omit it; it is never invented here.
    #[serde(default)]
    pub role: Option<String>,
    // Account status as reported by the Authority (active, inactive, suspended).
    pub status: String,
    pub real_name: String,
}

// --- Wire Envelopes ---

/// ApiEnvelope
///
/// The fixed `{code, message, data}` shape every service in the system answers with.
/// `code` 0 means success; error responses carry the HTTP status as `code` and a null `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiEnvelope<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// AuthorityEnvelope
///
/// The Authority's reply before interpretation. `data` stays untyped until `code`
/// says it should hold an identity, so a rejection with an odd payload is still
/// read as a rejection.
#[derive(Debug, Deserialize)]
pub struct AuthorityEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

// --- Response Payloads ---

/// AdmissionReport
///
/// Returned by the admission probe endpoints: which gate let the caller in, the
/// role classes that gate accepts, and the identity it saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdmissionReport {
    pub gate: String,
    pub allowed_roles: Vec<String>,
    pub identity: Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_accepts_id_alias_and_missing_role() {
        let identity: Identity = serde_json::from_value(json!({
            "id": "2d1f",
            "username": "alice",
            "user_type": "student",
            "status": "active",
            "real_name": "Alice"
        }))
        .unwrap();
        assert_eq!(identity.user_id, "2d1f");
        assert_eq!(identity.role, None);
    }

    #[test]
    fn identity_rejects_missing_user_type() {
        let parsed = serde_json::from_value::<Identity>(json!({
            "user_id": "1",
            "username": "bob",
            "status": "active",
            "real_name": "Bob"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn identity_rejects_mistyped_attribute() {
        let parsed = serde_json::from_value::<Identity>(json!({
            "user_id": 7,
            "username": "bob",
            "user_type": "teacher",
            "status": "active",
            "real_name": "Bob"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn failure_envelope_serializes_null_data() {
        let body = serde_json::to_value(ApiEnvelope::failure(403, "仅管理员可访问")).unwrap();
        assert_eq!(
            body,
            json!({"code": 403, "message": "仅管理员可访问", "data": null})
        );
    }
}
