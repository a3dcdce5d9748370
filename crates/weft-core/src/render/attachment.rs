//! Multi-modal attachment rendering and on-demand fetching.
//!
//! Attachment blocks carry either inline base64 bytes or an external
//! storage key. Inline bytes embed directly (images as data URLs, video and
//! documents as labeled inline resource links). Keyed attachments render as
//! clickable placeholders that a UI activates to fetch and save; the
//! placeholder carries localized state strings so the swap needs no further
//! lookup.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::{Locale, RenderContext};
use crate::markup::escape_html;
use crate::protocol::{DocumentBlock, MediaBlock};

/// What a media block is, for labels and MIME resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    fn label(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (MediaKind::Image, Locale::En) => "Image",
            (MediaKind::Image, Locale::Zh) => "图片",
            (MediaKind::Video, Locale::En) => "Video",
            (MediaKind::Video, Locale::Zh) => "视频",
            (MediaKind::Document, Locale::En) => "Document",
            (MediaKind::Document, Locale::Zh) => "文档",
        }
    }
}

/// Maps a wire format tag to a MIME type. Unknown formats fall back to an
/// octet stream so downloads still work.
fn mime_for(kind: MediaKind, format: &str) -> String {
    let known = match (kind, format) {
        (MediaKind::Image, "png") => "image/png",
        (MediaKind::Image, "jpeg" | "jpg") => "image/jpeg",
        (MediaKind::Image, "gif") => "image/gif",
        (MediaKind::Image, "webp") => "image/webp",
        (MediaKind::Video, "mp4") => "video/mp4",
        (MediaKind::Video, "mpeg") => "video/mpeg",
        (MediaKind::Video, "mov") => "video/quicktime",
        (MediaKind::Video, "avi") => "video/x-msvideo",
        (MediaKind::Video, "webm") => "video/webm",
        (MediaKind::Document, "pdf") => "application/pdf",
        (MediaKind::Document, "csv") => "text/csv",
        (MediaKind::Document, "doc") => "application/msword",
        (MediaKind::Document, "docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        (MediaKind::Document, "xls") => "application/vnd.ms-excel",
        (MediaKind::Document, "xlsx") => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        (MediaKind::Document, "html") => "text/html",
        (MediaKind::Document, "txt") => "text/plain",
        (MediaKind::Document, "md") => "text/markdown",
        _ => return "application/octet-stream".to_string(),
    };
    known.to_string()
}

pub(super) fn render_image(block: &MediaBlock, ctx: &RenderContext<'_>, out: &mut String) {
    if let Some(bytes) = &block.source.bytes {
        let mime = mime_for(MediaKind::Image, &block.format);
        let _ = write!(
            out,
            "<img class=\"attachment-image\" src=\"data:{mime};base64,{data}\" alt=\"\">",
            data = escape_html(bytes),
        );
    } else if let Some(key) = &block.source.key {
        push_placeholder(MediaKind::Image, key, None, ctx, out);
    }
}

pub(super) fn render_video(block: &MediaBlock, ctx: &RenderContext<'_>, out: &mut String) {
    render_resource(MediaKind::Video, &block.format, None, &block.source, ctx, out);
}

pub(super) fn render_document(block: &DocumentBlock, ctx: &RenderContext<'_>, out: &mut String) {
    render_resource(
        MediaKind::Document,
        &block.format,
        block.name.as_deref(),
        &block.source,
        ctx,
        out,
    );
}

fn render_resource(
    kind: MediaKind,
    format: &str,
    name: Option<&str>,
    source: &crate::protocol::MediaSource,
    ctx: &RenderContext<'_>,
    out: &mut String,
) {
    if let Some(bytes) = &source.bytes {
        let mime = mime_for(kind, format);
        let label = display_name(kind, name, format, ctx.locale);
        let _ = write!(
            out,
            concat!(
                "<a class=\"attachment attachment-inline\" download=\"{file}\" ",
                "href=\"data:{mime};base64,{data}\">{label}</a>"
            ),
            file = escape_html(&file_name(name, format)),
            mime = mime,
            data = escape_html(bytes),
            label = escape_html(&label),
        );
    } else if let Some(key) = &source.key {
        push_placeholder(kind, key, name, ctx, out);
    }
}

/// Emits the clickable download placeholder for a keyed attachment.
///
/// The UI toggles `attachment-fetching` / `attachment-failed` classes on
/// activation and swaps in the matching `data-msg-*` string on failure.
fn push_placeholder(
    kind: MediaKind,
    key: &str,
    name: Option<&str>,
    ctx: &RenderContext<'_>,
    out: &mut String,
) {
    let locale = ctx.locale;
    let label = name.map_or_else(|| kind.label(locale).to_string(), ToString::to_string);
    let _ = write!(
        out,
        concat!(
            "<a href=\"#\" class=\"attachment attachment-remote\" ",
            "data-attachment-key=\"{key}\" ",
            "data-msg-fetching=\"{fetching}\" ",
            "data-msg-unauthorized=\"{unauthorized}\" ",
            "data-msg-not-found=\"{not_found}\" ",
            "data-msg-failed=\"{failed}\">",
            "{label}</a>"
        ),
        key = escape_html(key),
        fetching = fetching_message(locale),
        unauthorized = AttachmentError::Unauthorized.localized(locale),
        not_found = AttachmentError::NotFound.localized(locale),
        failed = generic_failure_message(locale),
        label = escape_html(&label),
    );
}

fn display_name(kind: MediaKind, name: Option<&str>, format: &str, locale: Locale) -> String {
    match name {
        Some(name) => format!("{} ({format})", name),
        None => format!("{} ({format})", kind.label(locale)),
    }
}

fn file_name(name: Option<&str>, format: &str) -> String {
    match name {
        Some(name) => format!("{name}.{format}"),
        None => format!("attachment.{format}"),
    }
}

fn fetching_message(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Downloading…",
        Locale::Zh => "下载中…",
    }
}

fn generic_failure_message(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Download failed",
        Locale::Zh => "下载失败",
    }
}

/// Failure classes for on-demand attachment fetches.
///
/// Each class carries its own localized message; a failed fetch only affects
/// the one attachment's affordance, never the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    Unauthorized,
    NotFound,
    Other(String),
}

impl AttachmentError {
    /// Localized user-facing message for this failure class.
    pub fn localized(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (AttachmentError::Unauthorized, Locale::En) => "You are not allowed to download this file",
            (AttachmentError::Unauthorized, Locale::Zh) => "您没有权限下载此文件",
            (AttachmentError::NotFound, Locale::En) => "File not found on the server",
            (AttachmentError::NotFound, Locale::Zh) => "服务器上找不到此文件",
            (AttachmentError::Other(_), Locale::En) => "Download failed",
            (AttachmentError::Other(_), Locale::Zh) => "下载失败",
        }
    }
}

impl std::fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentError::Unauthorized => write!(f, "unauthorized"),
            AttachmentError::NotFound => write!(f, "not found"),
            AttachmentError::Other(detail) => write!(f, "{detail}"),
        }
    }
}

impl std::error::Error for AttachmentError {}

/// Binary content resolved for an attachment key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AttachmentPayload {
    /// Encodes the payload as a data URL, ready to swap into a placeholder.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64.encode(&self.bytes)
        )
    }
}

/// Resolves an attachment key to binary content on demand.
pub trait AttachmentStore {
    fn fetch(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<AttachmentPayload, AttachmentError>> + Send;
}
