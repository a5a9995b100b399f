//! Per-turn auxiliary inputs: a tool/service reference and an uploaded file.

use std::fmt;

use atlas_core::UploadedFile;

/// How the agent should reach an external tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    Sse,
    Stdio,
    Custom(String),
}

impl ToolKind {
    /// Parse panel text. Blank text means no tool kind was chosen.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(match text.to_ascii_uppercase().as_str() {
            "SSE" => ToolKind::Sse,
            "STDIO" => ToolKind::Stdio,
            _ => ToolKind::Custom(text.to_string()),
        })
    }

    /// Wire value for the `mcp_type` field.
    pub fn as_str(&self) -> &str {
        match self {
            ToolKind::Sse => "SSE",
            ToolKind::Stdio => "STDIO",
            ToolKind::Custom(kind) => kind,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete tool reference: kind plus address (URL or command line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReference {
    pub kind: ToolKind,
    pub address: String,
}

/// Auxiliary inputs for one turn, rebuilt from the input panel per submit.
///
/// Every field is independently optional. A tool reference only counts when
/// both its kind and its address are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentBundle {
    tool_kind: Option<ToolKind>,
    tool_address: Option<String>,
    file: Option<UploadedFile>,
}

impl AttachmentBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw panel state, where blank text fields mean "absent".
    pub fn from_panel(tool_kind: &str, tool_address: &str, file: Option<UploadedFile>) -> Self {
        let mut bundle = Self::new();
        bundle.set_tool(tool_kind, tool_address);
        bundle.file = file;
        bundle
    }

    pub fn with_tool_kind(mut self, kind: ToolKind) -> Self {
        self.tool_kind = Some(kind);
        self
    }

    pub fn with_tool_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        self.tool_address = (!address.trim().is_empty()).then_some(address);
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn set_tool(&mut self, kind: &str, address: &str) {
        self.tool_kind = ToolKind::parse(kind);
        let address = address.trim();
        self.tool_address = (!address.is_empty()).then(|| address.to_string());
    }

    pub fn clear_tool(&mut self) {
        self.tool_kind = None;
        self.tool_address = None;
    }

    pub fn set_file(&mut self, file: Option<UploadedFile>) {
        self.file = file;
    }

    pub fn tool_kind(&self) -> Option<&ToolKind> {
        self.tool_kind.as_ref()
    }

    pub fn tool_address(&self) -> Option<&str> {
        self.tool_address.as_deref()
    }

    /// The tool reference, only when kind and address are both set.
    pub fn service_reference(&self) -> Option<ServiceReference> {
        match (&self.tool_kind, &self.tool_address) {
            (Some(kind), Some(address)) => Some(ServiceReference {
                kind: kind.clone(),
                address: address.clone(),
            }),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// True when nothing would be sent with a turn.
    pub fn is_empty(&self) -> bool {
        self.service_reference().is_none() && self.file.is_none()
    }
}
