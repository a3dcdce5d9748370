//! Folds the visible event subsequence into one HTML document.
//!
//! The transcript is recomputed from scratch on every frame rather than
//! patched incrementally; re-render cost grows with the log, formatting
//! correctness does not.

pub mod attachment;
mod embed;
pub mod sniff;

use std::fmt::Write as _;

pub use attachment::{AttachmentError, AttachmentPayload, AttachmentStore};
pub use sniff::SniffedFormat;

use crate::markup::{MarkupRenderer, escape_html};
use crate::protocol::{ContentBlock, Message, ToolResult, ToolResultPart, ToolUse};
use crate::session::VisibleEvent;

/// Display language for labels and failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    fn processing_label(self) -> &'static str {
        match self {
            Locale::En => "Processing…",
            Locale::Zh => "处理中…",
        }
    }

    fn tool_use_label(self) -> &'static str {
        match self {
            Locale::En => "Tool call",
            Locale::Zh => "工具调用",
        }
    }

    fn tool_result_label(self, success: bool) -> &'static str {
        match (self, success) {
            (Locale::En, true) => "Tool result · success",
            (Locale::En, false) => "Tool result · error",
            (Locale::Zh, true) => "工具结果 · 成功",
            (Locale::Zh, false) => "工具结果 · 失败",
        }
    }
}

/// Shared state for one render pass.
pub(crate) struct RenderContext<'a> {
    pub(crate) markup: &'a dyn MarkupRenderer,
    pub(crate) locale: Locale,
    embed_seq: usize,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(markup: &'a dyn MarkupRenderer, locale: Locale) -> Self {
        Self {
            markup,
            locale,
            embed_seq: 0,
        }
    }

    /// Ids restart at zero each pass, so a re-render of the same log
    /// produces identical markup.
    pub(crate) fn next_embed_id(&mut self) -> String {
        let id = format!("html-embed-{}", self.embed_seq);
        self.embed_seq += 1;
        id
    }
}

/// Renders the visible subsequence into one HTML string.
pub fn render_transcript(
    visible: &[VisibleEvent<'_>],
    markup: &dyn MarkupRenderer,
    locale: Locale,
) -> String {
    let mut ctx = RenderContext::new(markup, locale);
    let mut out = String::new();
    for item in visible {
        match item {
            VisibleEvent::Processing => {
                let _ = write!(
                    out,
                    "<p class=\"processing\">{}</p>",
                    locale.processing_label()
                );
            }
            VisibleEvent::Message(message) => render_message(message, &mut ctx, &mut out),
        }
    }
    out
}

fn render_message(message: &Message, ctx: &mut RenderContext<'_>, out: &mut String) {
    let _ = write!(
        out,
        "<div class=\"message message-{}\">",
        escape_html(&message.role)
    );
    // Block order within a message is preserved in the output.
    for block in &message.content {
        render_block(block, ctx, out);
    }
    out.push_str("</div>");
}

fn render_block(block: &ContentBlock, ctx: &mut RenderContext<'_>, out: &mut String) {
    match block {
        ContentBlock::Text(text) => embed::render_text(text, ctx, out),
        ContentBlock::Image(media) => attachment::render_image(media, ctx, out),
        ContentBlock::Video(media) => attachment::render_video(media, ctx, out),
        ContentBlock::Document(doc) => attachment::render_document(doc, ctx, out),
        ContentBlock::ToolUse(tool) => render_tool_use(tool, ctx, out),
        ContentBlock::ToolResult(result) => render_tool_result(result, ctx, out),
    }
}

/// Tool invocations render as a labeled code block of pretty-printed input.
fn render_tool_use(tool: &ToolUse, ctx: &RenderContext<'_>, out: &mut String) {
    let input = serde_json::to_string_pretty(&tool.input).unwrap_or_else(|_| "{}".to_string());
    let _ = write!(
        out,
        concat!(
            "<div class=\"tool-use\">",
            "<div class=\"tool-use-header\">{label}: {name}</div>",
            "<pre><code class=\"language-json\">{input}</code></pre>",
            "</div>"
        ),
        label = ctx.locale.tool_use_label(),
        name = escape_html(&tool.name),
        input = escape_html(&input),
    );
}

/// Tool results render as a collapsible container labeled with status; each
/// text part is sniffed and formatted by the fixed cascade.
fn render_tool_result(result: &ToolResult, ctx: &mut RenderContext<'_>, out: &mut String) {
    let success = result.is_success();
    let _ = write!(
        out,
        concat!(
            "<details class=\"tool-result tool-result-{status}\"{open}>",
            "<summary>{label}</summary>"
        ),
        status = if success { "success" } else { "error" },
        open = if success { "" } else { " open" },
        label = ctx.locale.tool_result_label(success),
    );
    for part in &result.content {
        match part {
            ToolResultPart::Text(text) => render_sniffed_text(text, ctx, out),
            ToolResultPart::Json(value) => {
                let pretty =
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                push_code_block("json", &pretty, out);
            }
        }
    }
    out.push_str("</details>");
}

fn render_sniffed_text(text: &str, ctx: &RenderContext<'_>, out: &mut String) {
    match sniff::sniff(text) {
        SniffedFormat::Json(value) => {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            push_code_block("json", &pretty, out);
        }
        SniffedFormat::Sql => push_code_block("sql", text.trim(), out),
        SniffedFormat::Html => push_code_block("html", text.trim(), out),
        SniffedFormat::Markdown => out.push_str(&ctx.markup.render(text)),
        SniffedFormat::Plain => {
            let _ = write!(out, "<p class=\"text-plain\">{}</p>", escape_html(text));
        }
    }
}

fn push_code_block(language: &str, code: &str, out: &mut String) {
    let _ = write!(
        out,
        "<pre><code class=\"language-{language}\">{}</code></pre>",
        escape_html(code)
    );
}
