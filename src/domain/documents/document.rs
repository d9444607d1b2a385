use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored document metadata together with its grantee list.
///
/// `owner` and `grant` are logins. The payload lives in a separate table
/// and is never part of this struct, so cached copies stay small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime: String,
    #[serde(rename = "file")]
    pub is_file: bool,
    #[serde(rename = "public")]
    pub is_public: bool,
    #[serde(rename = "created")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant: Vec<String>,
}

impl Document {
    pub fn payload_kind(&self) -> PayloadKind {
        if self.is_file {
            PayloadKind::File
        } else {
            PayloadKind::Json
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    File,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    File(Vec<u8>),
    Json(String),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::File(_) => PayloadKind::File,
            Payload::Json(_) => PayloadKind::Json,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::File(bytes) => bytes,
            Payload::Json(text) => text.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::File(bytes) => bytes,
            Payload::Json(text) => text.into_bytes(),
        }
    }
}

/// Metadata submitted by a caller when creating a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub name: String,
    pub mime: String,
    pub is_file: bool,
    pub is_public: bool,
    pub grant: Vec<String>,
}

/// What the caller actually attached to a create request.
#[derive(Debug, Clone, Default)]
pub struct SubmittedPayload {
    pub file: Option<Vec<u8>>,
    pub json: Option<String>,
}

impl NewDocument {
    /// Checks the declared payload type against what was supplied and
    /// returns the metadata plus the single payload to persist. Name, mime
    /// and grantee logins are kept exactly as submitted.
    pub fn validate(mut self, submitted: SubmittedPayload) -> Result<(Self, Payload), String> {
        if self.name.trim().is_empty() {
            return Err("document name is required".into());
        }

        let payload = match (self.is_file, submitted.file, submitted.json) {
            (true, Some(bytes), _) => Payload::File(bytes),
            (true, None, _) => return Err("file has not been loaded".into()),
            (false, Some(_), _) => {
                return Err("file supplied for a document declared as json".into());
            }
            (false, None, None) => return Err("json payload is required".into()),
            (false, None, Some(text)) => {
                if serde_json::from_str::<serde_json::Value>(&text).is_err() {
                    return Err("json payload is not valid json".into());
                }
                Payload::Json(text)
            }
        };

        let mut grant: Vec<String> = Vec::with_capacity(self.grant.len());
        for login in self.grant.drain(..) {
            if login.trim().is_empty() {
                return Err("grantee login must not be empty".into());
            }
            if !grant.contains(&login) {
                grant.push(login);
            }
        }
        self.grant = grant;

        Ok((self, payload))
    }
}
