//! Conversation engine for the Atlas geospatial assistant.
//!
//! Composes turn requests from the utterance, map viewport and attachments,
//! keeps the transcript, renders execution results into display fragments,
//! and registers recurring queries with the server.

pub mod attachments;
pub mod composer;
pub mod error;
pub mod geo;
pub mod http;
pub mod jobs;
pub mod render;
pub mod session;
pub mod status;
pub mod transport;

pub use attachments::{AttachmentBundle, ServiceReference, ToolKind};
pub use composer::{RequestComposer, RequestEncoding, TurnBody, TurnRequest};
pub use error::ChatError;
pub use geo::GeoContext;
pub use http::HttpTransport;
pub use jobs::{parse_interval, JobScheduler};
pub use render::{ChartMount, RenderedFragment, ResultRenderer};
pub use session::{
    ConversationSession, SessionState, SubmitOutcome, TranscriptEntry, TurnContext,
};
pub use status::StatusLine;
pub use transport::{ChatReply, JobAck, JobRequest, Transport};
