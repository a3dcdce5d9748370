//! Per-request session state.
//!
//! A `Session` exists only while one request is in flight: it binds the
//! continuation token, owns the append-only event log, and derives the
//! visible subsequence handed to the renderer. It is dropped with its
//! read-loop task on any terminal state.

use serde_json::Value;

use crate::protocol::{Envelope, Message, TraceEvent, Usage};

/// Reserved top-level wire field carrying the continuation token.
const SESSION_ID_FIELD: &str = "session_id";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Active,
    /// Clean stream end.
    Completed,
    /// Terminal transport failure.
    Failed,
    /// Cooperative cancellation.
    Aborted,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        self != SessionPhase::Active
    }
}

/// Items of the visible subsequence handed to the renderer.
///
/// Only complete messages are displayed once any exist; before that a
/// synthetic processing placeholder keeps the caller with something to show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisibleEvent<'a> {
    Processing,
    Message(&'a Message),
}

/// State accumulated for one in-flight request.
#[derive(Debug, Default)]
pub struct Session {
    session_id: Option<String>,
    events: Vec<TraceEvent>,
    phase: SessionPhase,
    usage: Usage,
    stop_reason: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the log and consumes the raw payload's
    /// continuation-token side channel.
    ///
    /// The token binds from the first payload that carries one and never
    /// changes afterwards; the bound value is returned exactly once, on the
    /// append that bound it.
    pub fn append(&mut self, raw: &Value, event: TraceEvent) -> Option<String> {
        let newly_bound = match (&self.session_id, raw.get(SESSION_ID_FIELD)) {
            (None, Some(token)) => {
                let token = token.as_str().map(ToString::to_string);
                self.session_id.clone_from(&token);
                token
            }
            _ => None,
        };

        if let TraceEvent::Envelope(Envelope::Metadata { usage }) = &event {
            self.usage.add(*usage);
        }
        if let TraceEvent::Envelope(Envelope::MessageStop { stop_reason }) = &event {
            self.stop_reason = Some(stop_reason.clone());
        }
        self.events.push(event);

        newly_bound
    }

    /// The bound continuation token, if any payload carried one yet.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The full ordered event log.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Cumulative token usage across metadata envelopes.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Stop reason from the last `messageStop` envelope, if seen.
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Derives the subsequence used for display: all `Message` events in log
    /// order once any exist, otherwise a single processing placeholder.
    pub fn visible_events(&self) -> Vec<VisibleEvent<'_>> {
        let messages: Vec<VisibleEvent<'_>> = self
            .events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Message(message) => Some(VisibleEvent::Message(message)),
                _ => None,
            })
            .collect();

        if messages.is_empty() {
            vec![VisibleEvent::Processing]
        } else {
            messages
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Marks the session completed. Returns false if already terminal.
    pub fn complete(&mut self) -> bool {
        self.transition(SessionPhase::Completed)
    }

    /// Marks the session failed. Returns false if already terminal.
    pub fn fail(&mut self) -> bool {
        self.transition(SessionPhase::Failed)
    }

    /// Marks the session aborted. Returns false if already terminal.
    pub fn abort(&mut self) -> bool {
        self.transition(SessionPhase::Aborted)
    }

    // Terminal states are mutually exclusive; the first transition wins.
    fn transition(&mut self, to: SessionPhase) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = to;
        true
    }
}
