//! The read loop and caller-facing contract.
//!
//! One request, one consumer task: await a chunk (racing cancellation),
//! reassemble frames, classify, append, re-render, hand the markup to the
//! caller over a bounded channel. Everything inside a loop iteration is
//! synchronous; cancellation is only observed between chunks.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::error::StreamError;
use crate::markup::MarkupRenderer;
use crate::protocol::{FrameStream, classify_value};
use crate::render::{Locale, render_transcript};
use crate::session::Session;
use crate::transport::{ChatRequest, StreamTransport};

/// Channel capacity for updates; progress sends apply backpressure to the
/// read loop rather than dropping.
pub const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Updates delivered to the caller for one request.
///
/// `Progress` arrives once per frame that produced an event; exactly one of
/// `Completed` or `Failed` arrives afterwards — or neither, when the request
/// was cancelled. The channel closes after the terminal update.
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    /// The continuation token bound to this session; at most once.
    SessionBound(String),
    /// Re-rendered transcript after one more frame.
    Progress(String),
    /// Final transcript on clean stream end.
    Completed(String),
    /// Terminal transport failure.
    Failed(StreamError),
}

/// Handle to one in-flight request.
pub struct ChatHandle {
    /// Update channel; drain until it closes.
    pub updates: mpsc::Receiver<ChatUpdate>,
    cancel: CancelToken,
}

impl ChatHandle {
    /// The request's cancellation token. Safe to trigger at any time,
    /// including after completion (no-op then).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Streaming chat client over a transport and a markup renderer.
pub struct ChatClient<T, M> {
    inner: Arc<ClientInner<T, M>>,
}

impl<T, M> Clone for ChatClient<T, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<T, M> {
    transport: T,
    markup: M,
    locale: Locale,
}

impl<T, M> ChatClient<T, M>
where
    T: StreamTransport + 'static,
    M: MarkupRenderer + 'static,
{
    pub fn new(transport: T, markup: M) -> Self {
        Self::with_locale(transport, markup, Locale::default())
    }

    pub fn with_locale(transport: T, markup: M, locale: Locale) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                markup,
                locale,
            }),
        }
    }

    /// Starts one streaming request and returns its handle.
    ///
    /// Callers must not start a second request for the same conversation
    /// until the first has terminated (cancel it to reissue early); the
    /// core assumes single-reader discipline per session.
    pub fn start(&self, request: ChatRequest) -> ChatHandle {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let cancel = CancelToken::new();
        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        tokio::spawn(async move {
            run_request(inner, request, tx, token).await;
        });
        ChatHandle {
            updates: rx,
            cancel,
        }
    }
}

async fn run_request<T, M>(
    inner: Arc<ClientInner<T, M>>,
    request: ChatRequest,
    tx: mpsc::Sender<ChatUpdate>,
    cancel: CancelToken,
) where
    T: StreamTransport,
    M: MarkupRenderer,
{
    let request_id = uuid::Uuid::new_v4();
    let mut session = Session::new();

    tracing::debug!(%request_id, agent_id = %request.agent_id, "opening stream");

    let stream = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            session.abort();
            tracing::debug!(%request_id, "cancelled before connect");
            return;
        }
        result = inner.transport.open(&request) => match result {
            Ok(stream) => stream,
            Err(err) => {
                session.fail();
                tracing::warn!(%request_id, %err, "transport open failed");
                let _ = tx.send(ChatUpdate::Failed(err)).await;
                return;
            }
        }
    };

    let mut frames = FrameStream::new(stream);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Dropping the frame stream drops the response body and
                // releases the connection.
                session.abort();
                tracing::debug!(%request_id, "cancelled mid-stream");
                return;
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(payload)) => {
                let raw: Value = match serde_json::from_str(&payload) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::debug!(%request_id, %err, "dropping undecodable frame");
                        continue;
                    }
                };
                // Unknown shapes are no-op events: nothing accumulates,
                // nothing re-renders.
                let Some(event) = classify_value(&raw) else {
                    continue;
                };
                if let Some(token) = session.append(&raw, event)
                    && tx.send(ChatUpdate::SessionBound(token)).await.is_err()
                {
                    session.abort();
                    return;
                }
                let html =
                    render_transcript(&session.visible_events(), &inner.markup, inner.locale);
                if tx.send(ChatUpdate::Progress(html)).await.is_err() {
                    // Receiver dropped; nobody is watching this request.
                    session.abort();
                    return;
                }
            }
            Some(Err(err)) => {
                session.fail();
                tracing::warn!(%request_id, %err, "stream read failed");
                let _ = tx.send(ChatUpdate::Failed(err)).await;
                return;
            }
            None => {
                if session.complete() {
                    let html =
                        render_transcript(&session.visible_events(), &inner.markup, inner.locale);
                    tracing::debug!(%request_id, usage = ?session.usage(), "stream completed");
                    let _ = tx.send(ChatUpdate::Completed(html)).await;
                }
                return;
            }
        }
    }
}

/// Outcome of a request driven by [`run_chat`].
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    /// Final transcript; `None` when the request was cancelled.
    pub final_html: Option<String>,
    /// Continuation token, if the stream bound one.
    pub session_token: Option<String>,
}

/// Drives one request with a progress callback instead of a channel.
///
/// # Errors
/// Returns the terminal `StreamError` on transport failure.
pub async fn run_chat<T, M>(
    client: &ChatClient<T, M>,
    request: ChatRequest,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(&str),
) -> Result<ChatOutcome, StreamError>
where
    T: StreamTransport + 'static,
    M: MarkupRenderer + 'static,
{
    let mut handle = client.start(request);
    let mut outcome = ChatOutcome::default();
    let mut forwarded_cancel = false;

    loop {
        let update = tokio::select! {
            biased;
            // Forward the caller's token once, then keep draining until the
            // loop task observes it and closes the channel.
            () = cancel.cancelled(), if !forwarded_cancel => {
                handle.cancel();
                forwarded_cancel = true;
                continue;
            }
            update = handle.updates.recv() => update,
        };
        match update {
            Some(ChatUpdate::SessionBound(token)) => outcome.session_token = Some(token),
            Some(ChatUpdate::Progress(html)) => on_progress(&html),
            Some(ChatUpdate::Completed(html)) => outcome.final_html = Some(html),
            Some(ChatUpdate::Failed(err)) => return Err(err),
            None => break,
        }
    }
    Ok(outcome)
}
