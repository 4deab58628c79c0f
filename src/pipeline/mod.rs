//! Message pipeline
//!
//! Each inbound message moves through explicit states:
//!
//! ```text
//! Received -> Identified -> MediaResolved -> Analyzed -> Persisted
//! ```
//!
//! Every stage returns the next state or a [`Halt`]. A halt carries the
//! replies that end the turn and, when something went wrong, a
//! [`FailureKind`]. Whatever happens, the webhook caller still answers 2xx;
//! failures exist only as chat replies and structured log events.

use std::fmt;
use std::sync::Arc;

use crate::channels::{Channel, InboundMessage, MessageKind, OutgoingMessage};
use crate::extraction::{
    ExtractedRecord, ExtractionModel, ExtractionSchema, PromptRequest, normalize,
};
use crate::gate::{GateOutcome, GateStop, SessionGate};
use crate::media::InlineMedia;
use crate::persist::{PersistMode, Persisted, Persister};

pub const THINKING_TEXT: &str = "Thinking... 💭";
pub const ANALYZING_PHOTO_TEXT: &str = "Analyzing photo... 📸";
pub const LISTENING_TEXT: &str = "Listening... 🎧";
pub const FAILURE_TEXT: &str = "⚠️ Error: Could not verify or save your activity. Please try again.";
pub const UNREADABLE_TEXT: &str = "🤔 Sorry, I couldn't understand that one. \
     It was saved for review; please try again with a bit more detail.";
pub const UNREADABLE_LOGGED_TEXT: &str =
    "🤔 Sorry, I couldn't understand that one. Please try again with a bit more detail.";
const DATABASE_SUFFIX: &str = "✅ Successfully logged to database!";
const LOG_SUFFIX: &str = "📝 Logged.";
const DEFAULT_REPLY: &str = "Got it!";

/// Classification of a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Sender could not be matched to a profile
    Identification,
    /// Media download, model call, or send failed
    Upstream,
    /// Model output was not JSON
    MalformedOutput,
    /// Lookup, session store, or insert failed
    Database,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identification => "identification",
            Self::Upstream => "upstream",
            Self::MalformedOutput => "malformed_output",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message as decoded from the webhook
#[derive(Debug, Clone)]
pub struct Received {
    pub msg: InboundMessage,
}

/// Message from an identified sender
#[derive(Debug, Clone)]
pub struct Identified {
    pub msg: InboundMessage,
    pub user_id: String,
}

/// Identified message with its media downloaded (if it had any)
#[derive(Debug, Clone)]
pub struct MediaResolved {
    pub msg: InboundMessage,
    pub user_id: String,
    pub media: Option<InlineMedia>,
}

/// Model output normalized
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub msg: InboundMessage,
    pub user_id: String,
    pub record: ExtractedRecord,
}

/// Record written
#[derive(Debug, Clone)]
pub struct PersistedState {
    pub msg: InboundMessage,
    pub user_id: String,
    pub record: ExtractedRecord,
    pub persisted: Persisted,
}

/// Early end of a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Halt {
    pub stage: &'static str,
    pub failure: Option<FailureKind>,
    pub replies: Vec<OutgoingMessage>,
    pub error: Option<String>,
}

impl Halt {
    fn failed(
        stage: &'static str,
        kind: FailureKind,
        msg: &InboundMessage,
        error: impl ToString,
    ) -> Self {
        Self {
            stage,
            failure: Some(kind),
            replies: vec![OutgoingMessage::text(&msg.conversation_id, FAILURE_TEXT)],
            error: Some(error.to_string()),
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Record persisted (or logged) and the final reply sent
    Completed { persisted: Persisted, malformed: bool },
    /// Stopped before completion
    Halted {
        stage: &'static str,
        failure: Option<FailureKind>,
    },
    /// Identified sender, but nothing the model can take
    Ignored,
}

/// Pipeline wiring
pub struct Pipeline {
    gate: SessionGate,
    model: Arc<dyn ExtractionModel>,
    persister: Persister,
    schema: ExtractionSchema,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        gate: SessionGate,
        model: Arc<dyn ExtractionModel>,
        persister: Persister,
        schema: ExtractionSchema,
    ) -> Self {
        Self {
            gate,
            model,
            persister,
            schema,
        }
    }

    /// Run one message through every stage, replying on `channel`
    pub async fn handle(&self, channel: &dyn Channel, msg: InboundMessage) -> Outcome {
        let conversation = msg.conversation_key();
        tracing::debug!(
            conversation = %conversation,
            message_id = %msg.message_id,
            kind = msg.kind.as_str(),
            "message received"
        );

        let result = self.run(channel, Received { msg }).await;

        match result {
            Ok(Some(done)) => {
                let malformed = done.record.is_fallback();
                send(channel, self.final_reply(&done)).await;
                tracing::info!(
                    conversation = %conversation,
                    user_id = %done.user_id,
                    malformed,
                    "message processed"
                );
                Outcome::Completed {
                    persisted: done.persisted,
                    malformed,
                }
            }
            Ok(None) => Outcome::Ignored,
            Err(halt) => {
                if let Some(kind) = halt.failure {
                    tracing::warn!(
                        failure = kind.as_str(),
                        stage = halt.stage,
                        platform = %channel.platform(),
                        conversation = %conversation,
                        error = halt.error.as_deref().unwrap_or_default(),
                        "pipeline halted"
                    );
                }
                for reply in halt.replies {
                    send(channel, reply).await;
                }
                Outcome::Halted {
                    stage: halt.stage,
                    failure: halt.failure,
                }
            }
        }
    }

    async fn run(
        &self,
        channel: &dyn Channel,
        received: Received,
    ) -> Result<Option<PersistedState>, Halt> {
        let identified = self.identify(received).await?;

        if !identified.msg.kind.is_media() && !has_text(&identified.msg) {
            tracing::debug!(
                kind = identified.msg.kind.as_str(),
                conversation = %identified.msg.conversation_key(),
                "nothing to analyze"
            );
            return Ok(None);
        }

        send(channel, interim_reply(&identified.msg)).await;

        let resolved = resolve_media(channel, identified).await?;
        let analyzed = self.analyze(resolved).await?;
        self.persist(analyzed).map(Some)
    }

    /// Gate stage
    ///
    /// # Errors
    ///
    /// Halts when the gate ends the turn
    pub async fn identify(&self, received: Received) -> Result<Identified, Halt> {
        match self.gate.check(&received.msg).await {
            GateOutcome::Pass { user_id } => Ok(Identified {
                msg: received.msg,
                user_id,
            }),
            GateOutcome::Stop { reason, replies } => {
                let failure = match reason {
                    GateStop::Rejected => Some(FailureKind::Identification),
                    GateStop::ServiceError => Some(FailureKind::Database),
                    GateStop::Started | GateStop::Prompted | GateStop::Verified => None,
                };
                Err(Halt {
                    stage: "identification",
                    failure,
                    replies,
                    error: None,
                })
            }
        }
    }

    /// Model stage
    ///
    /// # Errors
    ///
    /// Halts when the model call fails; unparseable output does not halt
    pub async fn analyze(&self, resolved: MediaResolved) -> Result<Analyzed, Halt> {
        let msg = resolved.msg;
        let request = PromptRequest::build(
            self.schema,
            msg.text.as_deref(),
            resolved.media,
            msg.caption.as_deref(),
        );

        let raw = match self.model.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => return Err(Halt::failed("inference", FailureKind::Upstream, &msg, e)),
        };

        let record = normalize(&raw);
        if record.is_fallback() {
            tracing::warn!(
                failure = FailureKind::MalformedOutput.as_str(),
                stage = "normalize",
                conversation = %msg.conversation_key(),
                raw_len = raw.len(),
                "model output not JSON; persisting fallback"
            );
        }

        Ok(Analyzed {
            msg,
            user_id: resolved.user_id,
            record,
        })
    }

    /// Persistence stage
    ///
    /// # Errors
    ///
    /// Halts when the insert fails
    pub fn persist(&self, analyzed: Analyzed) -> Result<PersistedState, Halt> {
        match self.persister.persist(&analyzed.user_id, &analyzed.msg, &analyzed.record) {
            Ok(persisted) => Ok(PersistedState {
                msg: analyzed.msg,
                user_id: analyzed.user_id,
                record: analyzed.record,
                persisted,
            }),
            Err(e) => Err(Halt::failed("persist", FailureKind::Database, &analyzed.msg, e)),
        }
    }

    fn final_reply(&self, done: &PersistedState) -> OutgoingMessage {
        let content = if done.record.is_fallback() {
            match self.persister.mode() {
                PersistMode::Database => UNREADABLE_TEXT.to_string(),
                PersistMode::Log => UNREADABLE_LOGGED_TEXT.to_string(),
            }
        } else {
            let reply = done
                .record
                .reply_to_user()
                .unwrap_or_else(|| DEFAULT_REPLY.to_string());
            let suffix = match self.persister.mode() {
                PersistMode::Database => DATABASE_SUFFIX,
                PersistMode::Log => LOG_SUFFIX,
            };
            format!("{reply}\n\n{suffix}")
        };
        OutgoingMessage::text(&done.msg.conversation_id, content)
    }
}

/// Media stage
///
/// # Errors
///
/// Halts when the download fails
pub async fn resolve_media(
    channel: &dyn Channel,
    identified: Identified,
) -> Result<MediaResolved, Halt> {
    let media = match &identified.msg.media {
        Some(media_ref) => match channel.fetch_media(media_ref).await {
            Ok(media) => Some(media),
            Err(e) => {
                return Err(Halt::failed("media", FailureKind::Upstream, &identified.msg, e));
            }
        },
        None => None,
    };

    Ok(MediaResolved {
        msg: identified.msg,
        user_id: identified.user_id,
        media,
    })
}

fn has_text(msg: &InboundMessage) -> bool {
    msg.kind == MessageKind::Text && msg.text.as_deref().is_some_and(|t| !t.trim().is_empty())
}

fn interim_reply(msg: &InboundMessage) -> OutgoingMessage {
    let text = if msg.kind.is_audio() {
        LISTENING_TEXT
    } else if msg.kind.is_media() {
        ANALYZING_PHOTO_TEXT
    } else {
        THINKING_TEXT
    };
    OutgoingMessage::text(&msg.conversation_id, text)
}

async fn send(channel: &dyn Channel, message: OutgoingMessage) {
    let conversation = message.conversation_id.clone();
    if let Err(e) = channel.send(message).await {
        tracing::warn!(
            failure = FailureKind::Upstream.as_str(),
            stage = "reply",
            platform = %channel.platform(),
            conversation = %conversation,
            error = %e,
            "failed to send reply"
        );
    }
}
