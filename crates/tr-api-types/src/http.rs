//! Control-plane HTTP request and response bodies.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/runner/provision`. Both the body itself and the
/// `networkMode` field are optional; anything unrecognized falls back to the
/// default (published-port) network configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(default)]
    pub network_mode: Option<String>,
}

/// Successful provision response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResponse {
    pub message: String,
    /// `"<host>:<port>"`, or `"N/A (isolated network mode)"` when the runner
    /// has no published port.
    pub endpoint: String,
    pub session_id: String,
}

/// Body of heartbeat and deprovision requests. The session id may instead be
/// supplied via the `X-Session-Id` header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Generic success envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error envelope: a stable `error` code, a human-readable `message`, and
/// optional `details` (included only outside production).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_request_accepts_empty_body() {
        let req: ProvisionRequest = serde_json::from_str("{}").unwrap();
        assert!(req.network_mode.is_none());

        let req: ProvisionRequest =
            serde_json::from_str(r#"{"networkMode": "none"}"#).unwrap();
        assert_eq!(req.network_mode.as_deref(), Some("none"));
    }

    #[test]
    fn provision_response_uses_camel_case() {
        let resp = ProvisionResponse {
            message: "ok".into(),
            endpoint: "localhost:49152".into(),
            session_id: "abc".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["endpoint"], "localhost:49152");
    }

    #[test]
    fn error_response_omits_absent_details() {
        let resp = ErrorResponse {
            error: "SERVER_ERROR".into(),
            message: "boom".into(),
            details: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("details"));
    }
}
