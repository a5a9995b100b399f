//! Conversation session: the transcript and the submit/reply cycle.
//!
//! Owns the ordered transcript, snapshots map and attachment state at submit
//! time, calls the transport, and routes execution results through the
//! renderer. Transport failures never escape; they become a fixed model entry.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use atlas_core::config::ChatConfig;
use atlas_core::{GeoSnapshot, Message, UploadedFile};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::attachments::AttachmentBundle;
use crate::composer::RequestComposer;
use crate::error::ChatError;
use crate::geo::GeoContext;
use crate::render::{escape_html, ChartMount, RenderedFragment, ResultRenderer};
use crate::status::StatusLine;
use crate::transport::Transport;

/// Whether any turn is waiting on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// How a call to [`ConversationSession::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank utterance; nothing appended, nothing sent.
    Ignored,
    /// The agent replied and its entry was appended.
    Answered,
    /// The call failed and the fixed error entry was appended.
    Failed,
}

/// A transcript message with the fragment rendered from its result.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub message: Message,
    pub rendered: Option<RenderedFragment>,
}

impl TranscriptEntry {
    pub fn to_html(&self) -> String {
        let role = self.message.role.as_str();
        let mut html = format!(
            r#"<div class="message {role}"><strong>{role}:</strong> {}"#,
            escape_html(&self.message.content)
        );
        if let Some(rendered) = &self.rendered {
            html.push_str(r#"<div class="exec-result">"#);
            html.push_str(&rendered.to_html());
            html.push_str("</div>");
        }
        html.push_str("</div>");
        html
    }
}

/// Map and attachment state read together when a turn is composed.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub geo: GeoContext,
    pub attachments: AttachmentBundle,
}

/// Client-side state of one conversation.
pub struct ConversationSession {
    identity: String,
    transport: Arc<dyn Transport>,
    composer: RequestComposer,
    renderer: ResultRenderer,
    config: ChatConfig,
    status: StatusLine,
    transcript: Mutex<Vec<TranscriptEntry>>,
    context: Mutex<TurnContext>,
    chat_panel_open: AtomicBool,
    in_flight: AtomicUsize,
    history_requested: AtomicBool,
    chart_mounts: Option<mpsc::UnboundedSender<ChartMount>>,
}

impl ConversationSession {
    pub fn new(identity: impl Into<String>, transport: Arc<dyn Transport>, config: ChatConfig) -> Self {
        Self {
            identity: identity.into(),
            transport,
            composer: RequestComposer::new(),
            renderer: ResultRenderer::from_config(&config),
            config,
            status: StatusLine::new(),
            transcript: Mutex::new(Vec::new()),
            context: Mutex::new(TurnContext::default()),
            chat_panel_open: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            history_requested: AtomicBool::new(false),
            chart_mounts: None,
        }
    }

    /// Share a status line with other components (e.g. the job scheduler).
    pub fn with_status_line(mut self, status: StatusLine) -> Self {
        self.status = status;
        self
    }

    /// Receive each chart mount once its entry is in the transcript.
    pub fn with_chart_mounts(mut self, sender: mpsc::UnboundedSender<ChartMount>) -> Self {
        self.chart_mounts = Some(sender);
        self
    }

    // -- Conversation --

    /// Seed the transcript from the server. Only the first call fetches.
    ///
    /// Returns the number of entries loaded. Failures are logged and leave the
    /// transcript untouched. Entries appended while the fetch was pending are
    /// kept after the history.
    pub async fn load_history(&self) -> usize {
        if self.history_requested.swap(true, Ordering::SeqCst) {
            debug!("History already requested, skipping");
            return 0;
        }

        let messages = match self.transport.fetch_history().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Failed to load history");
                return 0;
            }
        };

        let entries: Vec<TranscriptEntry> = messages
            .into_iter()
            .map(|message| {
                let rendered = message.result.as_ref().map(|r| self.renderer.render(r));
                TranscriptEntry { message, rendered }
            })
            .collect();
        let mounts: Vec<ChartMount> = entries
            .iter()
            .filter_map(|e| e.rendered.as_ref()?.chart_mount().cloned())
            .collect();
        let count = entries.len();

        {
            let mut transcript = self.lock_transcript();
            let appended = std::mem::replace(&mut *transcript, entries);
            if !appended.is_empty() {
                debug!(kept = appended.len(), "Keeping entries appended during history load");
            }
            transcript.extend(appended);
        }
        for mount in mounts {
            self.dispatch_mount(mount);
        }

        info!(count, "History loaded");
        count
    }

    /// Send one user turn and append the reply.
    ///
    /// Map and attachment state are captured before the call; later changes
    /// do not affect a request already in flight. Overlapping submits each
    /// append their reply when it arrives.
    pub async fn submit(&self, utterance: &str) -> SubmitOutcome {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            debug!("Ignoring empty utterance");
            return SubmitOutcome::Ignored;
        }

        self.append(Message::user(utterance), None);

        let request = {
            let context = self.lock_context();
            let request =
                self.composer
                    .compose(utterance, context.geo.snapshot(), Some(&context.attachments));
            request
        };
        info!(
            has_bbox = request.bbox.is_some(),
            has_service = request.service.is_some(),
            has_file = request.file.is_some(),
            "Submitting turn"
        );

        let flight = self.begin_request();
        let result = self.transport.send_turn(request).await;
        drop(flight);

        match result {
            Ok(reply) => {
                let rendered = reply.exec_result.as_ref().map(|r| self.renderer.render(r));
                info!(
                    result_kind = reply.exec_result.as_ref().map(|r| r.kind.as_str()).unwrap_or("none"),
                    "Turn answered"
                );
                self.append(Message::model(reply.response, reply.exec_result), rendered);
                SubmitOutcome::Answered
            }
            Err(e) => {
                error!(error = %e, "Turn failed");
                let text = self.config.transport_error_message.clone();
                self.status.set(text.clone());
                self.append(Message::model(text, None), None);
                SubmitOutcome::Failed
            }
        }
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.lock_transcript().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_transcript().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_transcript().is_empty()
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SessionState::AwaitingResponse
        } else {
            SessionState::Idle
        }
    }

    pub fn status(&self) -> String {
        self.status.get()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    // -- Map mode --

    pub fn is_map_mode(&self) -> bool {
        self.lock_context().geo.is_map_mode()
    }

    pub fn set_map_mode(&self, enabled: bool) {
        self.lock_context().geo.set_map_mode(enabled);
    }

    pub fn toggle_map_mode(&self) -> bool {
        self.lock_context().geo.toggle_map_mode()
    }

    pub fn set_viewport(&self, viewport: GeoSnapshot) {
        self.lock_context().geo.set_viewport(viewport);
    }

    // -- Attachments --

    pub fn attachments(&self) -> AttachmentBundle {
        self.lock_context().attachments.clone()
    }

    pub fn set_attachments(&self, bundle: AttachmentBundle) {
        self.lock_context().attachments = bundle;
    }

    pub fn update_attachments<F>(&self, update: F)
    where
        F: FnOnce(&mut AttachmentBundle),
    {
        update(&mut self.lock_context().attachments);
    }

    /// Read `path` and make it the file sent with later turns. On failure the
    /// current attachment is kept.
    pub async fn attach_file(&self, path: &Path) -> Result<(), ChatError> {
        let file = UploadedFile::from_path(path).await?;
        info!(name = %file.name, bytes = file.bytes.len(), "File attached");
        self.lock_context().attachments.set_file(Some(file));
        Ok(())
    }

    /// Change map and attachment state in one step; a concurrent submit sees
    /// either all of the change or none of it.
    pub fn update_turn_context<F>(&self, update: F)
    where
        F: FnOnce(&mut TurnContext),
    {
        update(&mut self.lock_context());
    }

    // -- Chat panel --

    pub fn is_chat_panel_open(&self) -> bool {
        self.chat_panel_open.load(Ordering::SeqCst)
    }

    pub fn set_chat_panel_open(&self, open: bool) {
        self.chat_panel_open.store(open, Ordering::SeqCst);
    }

    /// Flip the chat panel and return whether it is now open.
    pub fn toggle_chat_panel(&self) -> bool {
        !self.chat_panel_open.fetch_xor(true, Ordering::SeqCst)
    }

    // -- Private helpers --

    fn append(&self, message: Message, rendered: Option<RenderedFragment>) {
        let mount = rendered.as_ref().and_then(|r| r.chart_mount().cloned());
        let role = message.role;
        {
            let mut transcript = self.lock_transcript();
            transcript.push(TranscriptEntry { message, rendered });
            debug!(role = %role, len = transcript.len(), "Transcript entry appended");
        }
        if let Some(mount) = mount {
            self.dispatch_mount(mount);
        }
    }

    fn dispatch_mount(&self, mount: ChartMount) {
        let Some(sender) = &self.chart_mounts else {
            return;
        };
        debug!(container_id = %mount.container_id, "Chart mount dispatched");
        if sender.send(mount).is_err() {
            warn!("Chart mount receiver dropped");
        }
    }

    fn begin_request(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.status.set(self.config.thinking_status.clone());
        InFlight { session: self }
    }

    fn lock_transcript(&self) -> MutexGuard<'_, Vec<TranscriptEntry>> {
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_context(&self) -> MutexGuard<'_, TurnContext> {
        self.context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Counts a request in flight; the last one out clears the thinking status.
struct InFlight<'a> {
    session: &'a ConversationSession,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.session.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.session
                .status
                .clear_if(&self.session.config.thinking_status);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
