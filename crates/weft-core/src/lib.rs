//! Core weft library: wire protocol, session state, rendering, client loop.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod markup;
pub mod protocol;
pub mod render;
pub mod session;
pub mod transport;

pub use cancel::CancelToken;
pub use client::{ChatClient, ChatHandle, ChatUpdate};
pub use error::{StreamError, StreamErrorKind, StreamResult};
pub use render::Locale;
pub use transport::{AttachmentRef, ChatRequest, HttpTransport, StreamTransport};
