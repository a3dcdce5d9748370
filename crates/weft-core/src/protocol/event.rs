//! Event model and payload classification.
//!
//! A decoded frame payload is a JSON object whose shape determines its kind.
//! Classification is pure: the discriminator fields are checked in a fixed
//! priority order and the first match wins. The wire guarantees the fields
//! are mutually exclusive, so the order only matters for malformed input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events classified from decoded wire payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// Raw incremental assistant text.
    Text(String),
    /// Tool invocation announced while its input is still streaming.
    ToolUse(ToolUse),
    /// Model-protocol envelope chatter (block/message lifecycle, metadata).
    Envelope(Envelope),
    /// Complete structured message with ordered content blocks.
    Message(Message),
    /// Event-loop lifecycle announcement.
    Init(InitKind),
    /// Chain-of-thought text.
    Reasoning(String),
    /// The run was force-stopped by the backend.
    Stop { reason: String },
}

/// Lifecycle announcements emitted when the backend spins up a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    /// `init_event_loop`: the event loop queue was initialized.
    EventLoopInit,
    /// `start`: the run started.
    Start,
    /// `start_event_loop`: the event loop began cycling.
    EventLoopStart,
}

/// Sub-kinds of the protocol envelope, split by which field is present.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    MessageStart { role: String },
    MessageStop { stop_reason: String },
    ContentBlockStart { index: u64, start: Value },
    ContentBlockDelta { index: u64, delta: Value },
    ContentBlockStop { index: u64 },
    Metadata { usage: Usage },
}

/// Token usage reported on metadata envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Accumulates another usage report into this one.
    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A complete message: role plus ordered content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One content block of a message, keyed by its single wire field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlock {
    Text(String),
    Image(MediaBlock),
    Video(MediaBlock),
    Document(DocumentBlock),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

/// Image or video block payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBlock {
    pub format: String,
    #[serde(default)]
    pub source: MediaSource,
}

/// Document block payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentBlock {
    pub format: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: MediaSource,
}

/// Attachment content: inline base64 bytes, an external storage key, or
/// both. Inline bytes take precedence when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A tool invocation: id, name and structured input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    #[serde(rename = "toolUseId")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// A tool's reported outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(rename = "toolUseId")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub content: Vec<ToolResultPart>,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One part of a tool result, keyed by its single wire field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolResultPart {
    Text(String),
    Json(Value),
}

/// Classifies a decoded payload string into an event.
///
/// Returns `None` for payloads that fail JSON parsing (logged and dropped)
/// or parse but match no discriminator (no-op).
pub fn classify(payload: &str) -> Option<TraceEvent> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => classify_value(&value),
        Err(err) => {
            tracing::debug!(%err, "dropping undecodable frame payload");
            None
        }
    }
}

/// Classifies an already-parsed payload object.
///
/// Discriminator priority, first match wins: `data`, `current_tool_use`,
/// `event`, `message`, init markers, `reasoningText`, `force_stop`.
pub fn classify_value(value: &Value) -> Option<TraceEvent> {
    if let Some(text) = value.get("data").and_then(Value::as_str) {
        return Some(TraceEvent::Text(text.to_string()));
    }
    if let Some(tool) = value.get("current_tool_use") {
        return match serde_json::from_value::<ToolUse>(tool.clone()) {
            Ok(tool_use) => Some(TraceEvent::ToolUse(tool_use)),
            Err(err) => {
                tracing::debug!(%err, "dropping malformed tool-use payload");
                None
            }
        };
    }
    if let Some(envelope) = value.get("event") {
        return classify_envelope(envelope);
    }
    if let Some(message) = value.get("message") {
        return match serde_json::from_value::<Message>(message.clone()) {
            Ok(message) => Some(TraceEvent::Message(message)),
            Err(err) => {
                tracing::debug!(%err, "dropping malformed message payload");
                None
            }
        };
    }
    if value.get("init_event_loop").is_some() {
        return Some(TraceEvent::Init(InitKind::EventLoopInit));
    }
    if value.get("start_event_loop").is_some() {
        return Some(TraceEvent::Init(InitKind::EventLoopStart));
    }
    if value.get("start").is_some() {
        return Some(TraceEvent::Init(InitKind::Start));
    }
    if let Some(text) = value.get("reasoningText").and_then(Value::as_str) {
        return Some(TraceEvent::Reasoning(text.to_string()));
    }
    if value.get("force_stop").is_some() {
        let reason = value
            .get("force_stop_reason")
            .and_then(Value::as_str)
            .unwrap_or("unspecified")
            .to_string();
        return Some(TraceEvent::Stop { reason });
    }

    tracing::trace!("ignoring frame payload with unknown shape");
    None
}

/// Splits a protocol envelope by which sub-field is present, first match wins.
fn classify_envelope(envelope: &Value) -> Option<TraceEvent> {
    if let Some(start) = envelope.get("messageStart") {
        let role = start
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("assistant")
            .to_string();
        return Some(TraceEvent::Envelope(Envelope::MessageStart { role }));
    }
    if let Some(stop) = envelope.get("messageStop") {
        let stop_reason = stop
            .get("stopReason")
            .and_then(Value::as_str)
            .unwrap_or("end_turn")
            .to_string();
        return Some(TraceEvent::Envelope(Envelope::MessageStop { stop_reason }));
    }
    if let Some(start) = envelope.get("contentBlockStart") {
        return Some(TraceEvent::Envelope(Envelope::ContentBlockStart {
            index: block_index(start),
            start: start.get("start").cloned().unwrap_or(Value::Null),
        }));
    }
    if let Some(delta) = envelope.get("contentBlockDelta") {
        return Some(TraceEvent::Envelope(Envelope::ContentBlockDelta {
            index: block_index(delta),
            delta: delta.get("delta").cloned().unwrap_or(Value::Null),
        }));
    }
    if let Some(stop) = envelope.get("contentBlockStop") {
        return Some(TraceEvent::Envelope(Envelope::ContentBlockStop {
            index: block_index(stop),
        }));
    }
    if let Some(metadata) = envelope.get("metadata") {
        let usage = metadata
            .get("usage")
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok())
            .unwrap_or_default();
        return Some(TraceEvent::Envelope(Envelope::Metadata { usage }));
    }

    tracing::trace!("ignoring envelope with unknown sub-kind");
    None
}

fn block_index(value: &Value) -> u64 {
    value
        .get("contentBlockIndex")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classifies_text_payload() {
        let event = classify(r#"{"data":"Hello","delta":{"text":"Hello"}}"#).unwrap();
        assert_eq!(event, TraceEvent::Text("Hello".to_string()));
    }

    #[test]
    fn classifies_tool_use_payload() {
        let event = classify(
            r#"{"current_tool_use":{"toolUseId":"t1","name":"calculator","input":{"expr":"1+1"}}}"#,
        )
        .unwrap();
        let TraceEvent::ToolUse(tool) = event else {
            panic!("expected tool use");
        };
        assert_eq!(tool.id, "t1");
        assert_eq!(tool.name, "calculator");
        assert_eq!(tool.input, json!({"expr": "1+1"}));
    }

    #[test]
    fn classifies_envelope_sub_kinds() {
        let cases = [
            (
                r#"{"event":{"messageStart":{"role":"assistant"}}}"#,
                TraceEvent::Envelope(Envelope::MessageStart {
                    role: "assistant".to_string(),
                }),
            ),
            (
                r#"{"event":{"messageStop":{"stopReason":"tool_use"}}}"#,
                TraceEvent::Envelope(Envelope::MessageStop {
                    stop_reason: "tool_use".to_string(),
                }),
            ),
            (
                r#"{"event":{"contentBlockStop":{"contentBlockIndex":2}}}"#,
                TraceEvent::Envelope(Envelope::ContentBlockStop { index: 2 }),
            ),
        ];
        for (payload, expected) in cases {
            assert_eq!(classify(payload).unwrap(), expected, "payload {payload}");
        }
    }

    #[test]
    fn classifies_metadata_usage() {
        let event = classify(
            r#"{"event":{"metadata":{"usage":{"inputTokens":12,"outputTokens":34,"totalTokens":46},"metrics":{"latencyMs":900}}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            TraceEvent::Envelope(Envelope::Metadata {
                usage: Usage {
                    input_tokens: 12,
                    output_tokens: 34,
                    total_tokens: 46,
                },
            })
        );
    }

    #[test]
    fn classifies_message_with_ordered_blocks() {
        let event = classify(
            r#"{"message":{"role":"assistant","content":[{"text":"A"},{"toolUse":{"toolUseId":"t1","name":"calculator","input":{}}},{"text":"B"}]}}"#,
        )
        .unwrap();
        let TraceEvent::Message(message) = event else {
            panic!("expected message");
        };
        assert_eq!(message.content.len(), 3);
        assert_eq!(message.content[0], ContentBlock::Text("A".to_string()));
        assert!(matches!(message.content[1], ContentBlock::ToolUse(_)));
        assert_eq!(message.content[2], ContentBlock::Text("B".to_string()));
    }

    #[test]
    fn classifies_attachment_blocks() {
        let event = classify(
            r#"{"message":{"role":"assistant","content":[
                {"image":{"format":"png","source":{"bytes":"aGk="}}},
                {"document":{"format":"pdf","name":"report","source":{"key":"uploads/report.pdf"}}}
            ]}}"#,
        )
        .unwrap();
        let TraceEvent::Message(message) = event else {
            panic!("expected message");
        };
        let ContentBlock::Image(image) = &message.content[0] else {
            panic!("expected image");
        };
        assert_eq!(image.source.bytes.as_deref(), Some("aGk="));
        let ContentBlock::Document(doc) = &message.content[1] else {
            panic!("expected document");
        };
        assert_eq!(doc.source.key.as_deref(), Some("uploads/report.pdf"));
    }

    #[test]
    fn classifies_init_markers() {
        assert_eq!(
            classify(r#"{"init_event_loop":true}"#).unwrap(),
            TraceEvent::Init(InitKind::EventLoopInit)
        );
        assert_eq!(
            classify(r#"{"start":true}"#).unwrap(),
            TraceEvent::Init(InitKind::Start)
        );
        assert_eq!(
            classify(r#"{"start_event_loop":true}"#).unwrap(),
            TraceEvent::Init(InitKind::EventLoopStart)
        );
    }

    #[test]
    fn classifies_reasoning_and_force_stop() {
        assert_eq!(
            classify(r#"{"reasoningText":"thinking..."}"#).unwrap(),
            TraceEvent::Reasoning("thinking...".to_string())
        );
        assert_eq!(
            classify(r#"{"force_stop":true,"force_stop_reason":"max cycles"}"#).unwrap(),
            TraceEvent::Stop {
                reason: "max cycles".to_string()
            }
        );
    }

    #[test]
    fn data_field_wins_over_later_discriminators() {
        // The wire never mixes discriminators, but priority must be fixed.
        let event = classify(r#"{"data":"text","reasoningText":"thought"}"#).unwrap();
        assert_eq!(event, TraceEvent::Text("text".to_string()));
    }

    #[test]
    fn undecodable_payload_yields_none() {
        assert!(classify("{not json").is_none());
    }

    #[test]
    fn unknown_shape_yields_none() {
        assert!(classify(r#"{"something":"else"}"#).is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        let payload = r#"{"event":{"contentBlockDelta":{"delta":{"text":"x"},"contentBlockIndex":1}}}"#;
        assert_eq!(classify(payload), classify(payload));
    }
}
