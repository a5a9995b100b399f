//! Result rendering: maps a kind-tagged execution result to a fragment.
//!
//! Rendering never fails. Payloads the renderer cannot use for their declared
//! kind degrade to a readable dump, and malformed chart specifications become
//! visible error text.

use atlas_core::config::ChatConfig;
use atlas_core::{ExecutionResult, ResultKind};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ChatError;

// =============================================================================
// Fragments
// =============================================================================

/// A chart waiting to be drawn into its mount point.
///
/// The container only exists once the owning transcript entry is attached,
/// so the host mounts the chart after that signal rather than inline.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartMount {
    pub container_id: String,
    pub spec: Value,
}

/// Rendering instructions for one execution result.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedFragment {
    /// Trusted markup injected verbatim.
    Markup(String),
    /// An image by URL or inline data URL.
    Image { src: String },
    /// An empty mount point plus the chart to draw into it.
    Chart(ChartMount),
    /// A complete document shown in an isolated frame.
    Frame { document: String },
    /// Visible error text in place of the result.
    Error(String),
    /// Pretty-printed literal of a payload with no better presentation.
    Dump(String),
}

impl RenderedFragment {
    pub fn to_html(&self) -> String {
        match self {
            RenderedFragment::Markup(markup) => markup.clone(),
            RenderedFragment::Image { src } => format!(
                r#"<img class="result-picture" src="{}" alt="result image">"#,
                escape_html(src)
            ),
            RenderedFragment::Chart(mount) => format!(
                r#"<div id="{}" class="result-plot"></div>"#,
                mount.container_id
            ),
            RenderedFragment::Frame { document } => format!(
                r#"<iframe class="result-map" sandbox="allow-scripts" srcdoc="{}"></iframe>"#,
                escape_html(document)
            ),
            RenderedFragment::Error(message) => {
                format!(r#"<div class="result-error">{}</div>"#, escape_html(message))
            }
            RenderedFragment::Dump(text) => {
                format!(r#"<pre class="result-dump">{}</pre>"#, escape_html(text))
            }
        }
    }

    pub fn chart_mount(&self) -> Option<&ChartMount> {
        match self {
            RenderedFragment::Chart(mount) => Some(mount),
            _ => None,
        }
    }

    /// Equality that ignores generated chart container ids.
    pub fn same_structure(&self, other: &RenderedFragment) -> bool {
        match (self, other) {
            (RenderedFragment::Chart(a), RenderedFragment::Chart(b)) => a.spec == b.spec,
            (a, b) => a == b,
        }
    }
}

// =============================================================================
// ResultRenderer
// =============================================================================

/// Dispatches execution results to a rendering strategy by kind.
#[derive(Debug, Clone)]
pub struct ResultRenderer {
    inline_picture_mime: String,
}

impl Default for ResultRenderer {
    fn default() -> Self {
        Self::new("image/png")
    }
}

impl ResultRenderer {
    pub fn new(inline_picture_mime: impl Into<String>) -> Self {
        Self {
            inline_picture_mime: inline_picture_mime.into(),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.inline_picture_mime.clone())
    }

    pub fn render(&self, result: &ExecutionResult) -> RenderedFragment {
        let payload = &result.payload;
        match &result.kind {
            ResultKind::Dataframe | ResultKind::Html => match payload.as_str() {
                Some(markup) => RenderedFragment::Markup(markup.to_string()),
                None => dump(payload),
            },
            ResultKind::Picture => match payload.as_str() {
                Some(data) => RenderedFragment::Image {
                    src: self.picture_src(data),
                },
                None => dump(payload),
            },
            ResultKind::Plot => render_plot(payload),
            ResultKind::EmbeddedMap => match payload.as_str() {
                Some(document) => RenderedFragment::Frame {
                    document: document.to_string(),
                },
                None => dump(payload),
            },
            ResultKind::Other(_) => dump(payload),
        }
    }

    fn picture_src(&self, data: &str) -> String {
        let data = data.trim();
        if is_url(data) {
            data.to_string()
        } else {
            format!("data:{};base64,{}", self.inline_picture_mime, data)
        }
    }
}

fn is_url(data: &str) -> bool {
    let lower = data.get(..8).unwrap_or(data).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

fn render_plot(payload: &Value) -> RenderedFragment {
    match parse_chart_spec(payload) {
        Ok(spec) => RenderedFragment::Chart(ChartMount {
            container_id: format!("plot-{}", Uuid::new_v4().simple()),
            spec,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Plot payload could not be parsed");
            let detail = match e {
                ChatError::Render(detail) => detail,
                other => other.to_string(),
            };
            RenderedFragment::Error(format!("Error rendering plot: {}", detail))
        }
    }
}

/// A chart spec arrives either as JSON text or inline; it must be an object.
fn parse_chart_spec(payload: &Value) -> Result<Value, ChatError> {
    let spec = match payload {
        Value::String(text) => serde_json::from_str::<Value>(text)
            .map_err(|e| ChatError::Render(e.to_string()))?,
        other => other.clone(),
    };
    if spec.is_object() {
        Ok(spec)
    } else {
        Err(ChatError::Render(format!(
            "expected a chart object, got {}",
            json_type(&spec)
        )))
    }
}

fn dump(payload: &Value) -> RenderedFragment {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    RenderedFragment::Dump(text)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
