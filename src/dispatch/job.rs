use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DispatchError;

/// The kinds of provider work the dispatcher knows how to run.
///
/// A closed enum: adding a new kind is a compile-time-checked change
/// everywhere jobs are dispatched. On the broker wire the kind travels as
/// the strings `"chat"` / `"transcribe"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Chat,
    Transcribe,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Chat => "chat",
            JobKind::Transcribe => "transcribe",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(JobKind::Chat),
            "transcribe" => Ok(JobKind::Transcribe),
            other => Err(DispatchError::UnknownJobKind(other.to_string())),
        }
    }
}

/// A unit of work representing one provider call.
///
/// The payload is opaque to the dispatcher; only the provider client ever
/// interprets it. The id doubles as the correlation id in distributed mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub payload: Value,
}

impl Job {
    pub fn new(kind: JobKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
        }
    }
}

/// Wire-level result pushed onto a job's per-id result key in distributed
/// mode. Delivered at most once; abandoned replies expire via TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobReply {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Decode a job frame popped from the shared queue.
///
/// A frame whose `kind` string is not a known [`JobKind`] reports
/// `UnknownJobKind` so the waiting caller can be unblocked with a precise
/// error; any other malformed frame is a codec failure.
pub(crate) fn decode_job(raw: &str) -> Result<Job, DispatchError> {
    match serde_json::from_str::<Job>(raw) {
        Ok(job) => Ok(job),
        Err(err) => {
            let kind = serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|v| v.get("kind").and_then(Value::as_str).map(str::to_owned));
            match kind {
                Some(kind) if JobKind::from_str(&kind).is_err() => {
                    Err(DispatchError::UnknownJobKind(kind))
                }
                _ => Err(DispatchError::Codec(err)),
            }
        }
    }
}
