use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AtlasError, Result};

// =============================================================================
// Transcript
// =============================================================================

/// Who authored a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry.
///
/// Doubles as the wire shape of a `/history` record; unknown server fields
/// (ids, user ids) are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(
        default,
        rename = "exec_result",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<ExecutionResult>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<NaiveDateTime>,
}

impl Message {
    /// A locally authored user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            result: None,
            timestamp: Some(chrono::Utc::now().naive_utc()),
        }
    }

    /// A reply from the agent, with its execution result if it produced one.
    pub fn model(content: impl Into<String>, result: Option<ExecutionResult>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            result,
            timestamp: Some(chrono::Utc::now().naive_utc()),
        }
    }
}

/// Accept naive ISO-8601 or RFC 3339 timestamps; anything else becomes `None`
/// rather than failing the whole history payload.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => s
            .parse::<NaiveDateTime>()
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.naive_utc())),
        _ => None,
    })
}

// =============================================================================
// Execution results
// =============================================================================

/// Declared kind of an execution result.
///
/// Unrecognised tags are preserved in `Other` so the result can still be
/// shown through the fallback dump.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultKind {
    Dataframe,
    Picture,
    Html,
    Plot,
    EmbeddedMap,
    Other(String),
}

impl ResultKind {
    pub fn as_str(&self) -> &str {
        match self {
            ResultKind::Dataframe => "dataframe",
            ResultKind::Picture => "picture",
            ResultKind::Html => "html",
            ResultKind::Plot => "plot",
            ResultKind::EmbeddedMap => "embeddedMap",
            ResultKind::Other(tag) => tag,
        }
    }
}

impl From<String> for ResultKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "dataframe" => ResultKind::Dataframe,
            "picture" => ResultKind::Picture,
            "html" => ResultKind::Html,
            "plot" | "plotly" => ResultKind::Plot,
            "embeddedMap" | "embedded_map" | "folium" | "map" => ResultKind::EmbeddedMap,
            _ => ResultKind::Other(tag),
        }
    }
}

impl From<&str> for ResultKind {
    fn from(tag: &str) -> Self {
        ResultKind::from(tag.to_string())
    }
}

impl From<ResultKind> for String {
    fn from(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kind-tagged, non-text output of a turn.
///
/// Wire shape: `{"type": <kind>, "content": <payload>}`. The payload is kept
/// exactly as received; only the renderer interprets it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    #[serde(rename = "content", default)]
    pub payload: Value,
}

impl ExecutionResult {
    pub fn new(kind: impl Into<ResultKind>, payload: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

// =============================================================================
// Turn context
// =============================================================================

/// Map viewport bounds in degrees.
///
/// `north >= south` and `east >= west` are the map widget's invariants and
/// are not re-checked here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoSnapshot {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoSnapshot {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }
}

/// A file picked in the input panel, carried as a multipart binary part.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping its file name.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AtlasError::Config(format!("not a file path: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { name, bytes })
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
