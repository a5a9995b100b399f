//! Turn-request composition.
//!
//! Packages an utterance with the optional map bounding box and attachments
//! into a transport-neutral [`TurnRequest`], and decides how it is encoded on
//! the wire.

use atlas_core::{GeoSnapshot, UploadedFile};
use serde_json::{json, Value};

use crate::attachments::{AttachmentBundle, ServiceReference};

/// Multipart field names understood by the `/chat` route.
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_BBOX: &str = "bbox";
pub const FIELD_TOOL_KIND: &str = "mcp_type";
pub const FIELD_TOOL_ADDRESS: &str = "mcp_url";
pub const FIELD_FILE: &str = "skill_file";

/// One outbound turn, composed but not yet encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub message: String,
    pub bbox: Option<GeoSnapshot>,
    pub service: Option<ServiceReference>,
    pub file: Option<UploadedFile>,
}

/// Wire encoding chosen for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEncoding {
    Json,
    Multipart,
}

/// A single multipart form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// An encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnBody {
    Json(Value),
    Multipart(Vec<FormPart>),
}

impl TurnRequest {
    /// JSON is used only for a bare utterance (optionally with a bbox); a tool
    /// reference or a file forces a multipart form.
    pub fn encoding(&self) -> RequestEncoding {
        if self.file.is_some() || self.service.is_some() {
            RequestEncoding::Multipart
        } else {
            RequestEncoding::Json
        }
    }

    pub fn into_body(self) -> TurnBody {
        match self.encoding() {
            RequestEncoding::Json => {
                let mut body = json!({ "message": self.message });
                if let Some(bbox) = self.bbox {
                    body[FIELD_BBOX] = json!(bbox);
                }
                TurnBody::Json(body)
            }
            RequestEncoding::Multipart => {
                let mut parts = vec![FormPart::Text {
                    name: FIELD_MESSAGE,
                    value: self.message,
                }];
                if let Some(bbox) = self.bbox {
                    parts.push(FormPart::Text {
                        name: FIELD_BBOX,
                        value: json!(bbox).to_string(),
                    });
                }
                if let Some(service) = self.service {
                    parts.push(FormPart::Text {
                        name: FIELD_TOOL_KIND,
                        value: service.kind.as_str().to_string(),
                    });
                    parts.push(FormPart::Text {
                        name: FIELD_TOOL_ADDRESS,
                        value: service.address,
                    });
                }
                if let Some(file) = self.file {
                    parts.push(FormPart::File {
                        name: FIELD_FILE,
                        file_name: file.name,
                        bytes: file.bytes,
                    });
                }
                TurnBody::Multipart(parts)
            }
        }
    }
}

/// Builds turn requests. Holds no state; refusing empty utterances is the
/// caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestComposer;

impl RequestComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(
        &self,
        utterance: &str,
        geo: Option<GeoSnapshot>,
        attachments: Option<&AttachmentBundle>,
    ) -> TurnRequest {
        let (service, file) = match attachments {
            Some(bundle) => (bundle.service_reference(), bundle.file().cloned()),
            None => (None, None),
        };
        TurnRequest {
            message: utterance.trim().to_string(),
            bbox: geo,
            service,
            file,
        }
    }
}
