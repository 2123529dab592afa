//! Data-plane event channel protocol.
//!
//! Every message on the runner's WebSocket is a JSON object of the form
//! `{"event": "<name>", "payload": {...}}`. Request events flow from the
//! client to the runner; response events stream back on the same connection,
//! correlated by snippet id where applicable. Events for different snippet
//! ids may interleave freely; chunks belonging to one child-process stream
//! are delivered in the order they were read.

use serde::{Deserialize, Serialize};

/// Events sent by clients to the runner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
#[serde(rename_all = "camelCase")]
pub enum RunnerRequest {
    /// Execute the snippet blocks contained in `body`.
    TayloredRun { body: String },
    /// List a directory under the container root (defaults to the root).
    ListDirectory {
        #[serde(default)]
        path: Option<String>,
    },
    /// Fetch the bytes of a regular file under the container root.
    DownloadFile { path: String },
    /// Client-initiated teardown of the channel.
    Disconnect,
}

/// Events streamed from the runner agent back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
#[serde(rename_all = "camelCase")]
pub enum RunnerResponse {
    /// A chunk of the processing tool's standard output.
    TayloredOutput { id: u64, output: String },
    /// A chunk of the processing tool's standard error.
    TayloredError { id: u64, error: String },
    /// A request-level failure. `id` is present once a snippet id has been
    /// extracted from the request body.
    TayloredRunError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        error: String,
    },
    /// Result of a `listDirectory` request.
    DirectoryListing {
        path: String,
        files: Vec<DirectoryEntry>,
    },
    /// Result of a `downloadFile` request. `path` echoes the originally
    /// requested path; `content` is base64 on the wire.
    FileContent {
        path: String,
        #[serde(with = "base64_bytes")]
        content: Vec<u8>,
    },
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_events_use_camel_case_names() {
        let run: RunnerRequest =
            serde_json::from_str(r#"{"event": "tayloredRun", "payload": {"body": "<x/>"}}"#)
                .unwrap();
        assert!(matches!(run, RunnerRequest::TayloredRun { ref body } if body == "<x/>"));

        let list: RunnerRequest =
            serde_json::from_str(r#"{"event": "listDirectory", "payload": {}}"#).unwrap();
        assert!(matches!(list, RunnerRequest::ListDirectory { path: None }));

        let disconnect: RunnerRequest =
            serde_json::from_str(r#"{"event": "disconnect"}"#).unwrap();
        assert!(matches!(disconnect, RunnerRequest::Disconnect));
    }

    #[test]
    fn output_event_wire_shape() {
        let msg = RunnerResponse::TayloredOutput {
            id: 7,
            output: "hi\n".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "tayloredOutput");
        assert_eq!(json["payload"]["id"], 7);
        assert_eq!(json["payload"]["output"], "hi\n");
    }

    #[test]
    fn run_error_omits_id_when_absent() {
        let msg = RunnerResponse::TayloredRunError {
            id: None,
            error: "bad input".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["payload"].get("id").is_none());
    }

    #[test]
    fn directory_entry_uses_is_directory_key() {
        let entry = DirectoryEntry {
            name: "etc".into(),
            is_directory: true,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isDirectory"], true);
    }

    #[test]
    fn file_content_is_base64_on_the_wire() {
        let msg = RunnerResponse::FileContent {
            path: "/motd".into(),
            content: b"hello".to_vec(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["payload"]["content"], "aGVsbG8=");

        let back: RunnerResponse = serde_json::from_value(json).unwrap();
        assert!(
            matches!(back, RunnerResponse::FileContent { ref content, .. } if content == b"hello")
        );
    }
}
