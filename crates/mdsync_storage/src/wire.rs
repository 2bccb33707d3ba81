//! JSON response envelopes for the port boundary.
//!
//! Backends on the far side of the command boundary answer with
//! `{status, retry, message, <payload>}`. [`Envelope`] carries that shape
//! and converts to and from [`PortResult`] so the rest of the crate never
//! inspects the raw fields.

use crate::error::{PortError, PortResult};
use crate::port::DocumentEntry;
use serde::{Deserialize, Serialize};

/// Payload carried by a successful envelope.
pub trait Payload: Sized {
    /// Value produced on success.
    type Output;

    /// Extracts the success value, if present.
    fn into_output(self) -> Option<Self::Output>;

    /// Wraps a success value.
    fn from_output(output: Self::Output) -> Self;

    /// Payload used for failure envelopes.
    fn empty() -> Self;
}

/// `{status, retry, message, ...payload}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<P> {
    /// `true` for success.
    pub status: bool,
    /// Set when the caller may safely re-issue the call.
    #[serde(default)]
    pub retry: bool,
    /// Success or error message.
    #[serde(default)]
    pub message: String,
    /// Operation-specific payload.
    #[serde(flatten)]
    pub payload: P,
}

impl<P: Payload> Envelope<P> {
    /// Converts the envelope into a port result.
    ///
    /// A successful envelope without its payload is treated as an
    /// unexpected failure.
    pub fn into_result(self) -> PortResult<P::Output> {
        if self.status {
            return self
                .payload
                .into_output()
                .ok_or_else(|| PortError::unexpected("response payload missing"));
        }
        Err(PortError::Rejected {
            message: self.message,
            retryable: self.retry,
        })
    }

    /// Builds an envelope from a port result.
    pub fn from_result(result: PortResult<P::Output>) -> Self {
        match result {
            Ok(output) => Self {
                status: true,
                retry: false,
                message: "Success".to_string(),
                payload: P::from_output(output),
            },
            Err(PortError::Rejected { message, retryable }) => Self {
                status: false,
                retry: retryable,
                message,
                payload: P::empty(),
            },
            Err(PortError::Unexpected(message)) => Self {
                status: false,
                retry: false,
                message,
                payload: P::empty(),
            },
        }
    }
}

/// Payload of a `listAll` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entries {
    /// Metadata for every document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<DocumentEntry>>,
}

/// Payload of a `fetchOne` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Metadata for the requested document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<DocumentEntry>,
}

/// Payload of a `read` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    /// Document content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Payload of responses that carry nothing beyond the status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ack {}

impl Payload for Entries {
    type Output = Vec<DocumentEntry>;

    fn into_output(self) -> Option<Self::Output> {
        self.entries
    }

    fn from_output(output: Self::Output) -> Self {
        Self {
            entries: Some(output),
        }
    }

    fn empty() -> Self {
        Self::default()
    }
}

impl Payload for Entry {
    type Output = DocumentEntry;

    fn into_output(self) -> Option<Self::Output> {
        self.entry
    }

    fn from_output(output: Self::Output) -> Self {
        Self {
            entry: Some(output),
        }
    }

    fn empty() -> Self {
        Self::default()
    }
}

impl Payload for Content {
    type Output = String;

    fn into_output(self) -> Option<Self::Output> {
        self.content
    }

    fn from_output(output: Self::Output) -> Self {
        Self {
            content: Some(output),
        }
    }

    fn empty() -> Self {
        Self::default()
    }
}

impl Payload for Ack {
    type Output = ();

    fn into_output(self) -> Option<Self::Output> {
        Some(())
    }

    fn from_output(_output: Self::Output) -> Self {
        Self {}
    }

    fn empty() -> Self {
        Self {}
    }
}

/// Response to `listAll`.
pub type ListAllResponse = Envelope<Entries>;
/// Response to `fetchOne`.
pub type FetchOneResponse = Envelope<Entry>;
/// Response to `read`.
pub type ReadResponse = Envelope<Content>;
/// Response to `write`, `remove`, `rename`, and the replication calls.
pub type AckResponse = Envelope<Ack>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_one_success_parses_entry() {
        let json = r#"{
            "status": true,
            "retry": false,
            "message": "Success",
            "entry": {"fileName": "notes.md", "filePath": "/home/.mediocre/notes.md"}
        }"#;
        let response: FetchOneResponse = serde_json::from_str(json).unwrap();
        let entry = response.into_result().unwrap();
        assert_eq!(entry.file_path, "/home/.mediocre/notes.md");
    }

    #[test]
    fn retry_flag_becomes_retryable_rejection() {
        let json = r#"{"status": false, "retry": true, "message": "Sync is already in progress"}"#;
        let response: ReadResponse = serde_json::from_str(json).unwrap();
        let err = response.into_result().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.message(), "Sync is already in progress");
    }

    #[test]
    fn absent_retry_is_final() {
        let response: AckResponse =
            serde_json::from_str(r#"{"status": false, "message": "auth failed"}"#).unwrap();
        let err = response.into_result().unwrap_err();
        assert_eq!(err, PortError::rejected("auth failed"));
    }

    #[test]
    fn success_without_payload_is_unexpected() {
        let response: ListAllResponse = serde_json::from_str(r#"{"status": true}"#).unwrap();
        assert!(matches!(
            response.into_result(),
            Err(PortError::Unexpected(_))
        ));
    }

    #[test]
    fn from_result_produces_boundary_shape() {
        let response = ReadResponse::from_result(Ok("# Title".to_string()));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], true);
        assert_eq!(json["content"], "# Title");

        let response = AckResponse::from_result(Err(PortError::retry("busy")));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["retry"], true);
        assert_eq!(json["message"], "busy");
    }
}
