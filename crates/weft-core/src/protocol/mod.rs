//! Wire protocol: frame reassembly and event classification.

pub mod event;
pub mod frame;

pub use event::{
    ContentBlock, DocumentBlock, Envelope, InitKind, MediaBlock, MediaSource, Message, ToolResult,
    ToolResultPart, ToolUse, TraceEvent, Usage, classify, classify_value,
};
pub use frame::{FrameAssembler, FrameStream};
