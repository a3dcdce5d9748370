//! Frame reassembly for the `data: ` record stream.
//!
//! The wire is a sequence of records, each `data: ` + payload + blank-line
//! terminator, split across transport chunks at arbitrary byte offsets.
//! `FrameAssembler` owns the chunk buffer; `FrameStream` adapts a byte
//! stream into a stream of decoded payload strings.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::Stream;

use crate::error::StreamResult;

/// Start marker of a wire record.
const FRAME_MARKER: &[u8] = b"data: ";

/// Blank-line terminators, earliest match wins. LF is what the backend
/// emits; CRLF tolerated for proxies that rewrite line endings.
const TERMINATORS: [&[u8]; 2] = [b"\r\n\r\n", b"\n\n"];

/// Incremental record scanner over a growing byte buffer.
///
/// The buffer is kept as raw bytes and decoded to UTF-8 per complete frame,
/// so multi-byte sequences split across chunks reassemble intact.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one transport chunk and returns every payload completed by it.
    ///
    /// A marker without its terminator is retained, byte for byte, until a
    /// later chunk completes it. Bytes before any marker are discarded,
    /// except for a trailing run that could still turn out to be a marker
    /// prefix.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        loop {
            let Some(marker_at) = find(&self.buf, FRAME_MARKER) else {
                let keep = marker_prefix_len(&self.buf);
                self.buf.drain(..self.buf.len() - keep);
                break;
            };

            let payload_from = marker_at + FRAME_MARKER.len();
            let Some((end, terminator_len)) = find_terminator(&self.buf[payload_from..]) else {
                // Incomplete frame: retain from the marker onward.
                self.buf.drain(..marker_at);
                break;
            };

            let payload = &self.buf[payload_from..payload_from + end];
            payloads.push(String::from_utf8_lossy(payload).into_owned());
            self.buf.drain(..payload_from + end + terminator_len);
        }
        payloads
    }
}

/// Locates the earliest terminator in `haystack`, returning its offset and length.
fn find_terminator(haystack: &[u8]) -> Option<(usize, usize)> {
    TERMINATORS
        .iter()
        .filter_map(|t| find(haystack, t).map(|at| (at, t.len())))
        .min_by_key(|&(at, _)| at)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Length of the longest buffer suffix that is a proper prefix of the marker.
fn marker_prefix_len(buf: &[u8]) -> usize {
    let max = (FRAME_MARKER.len() - 1).min(buf.len());
    (1..=max)
        .rev()
        .find(|&keep| buf[buf.len() - keep..] == FRAME_MARKER[..keep])
        .unwrap_or(0)
}

/// Stream adapter turning transport byte chunks into decoded frame payloads.
pub struct FrameStream<S> {
    inner: S,
    assembler: FrameAssembler,
    pending: VecDeque<String>,
    done: bool,
}

impl<S> FrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            assembler: FrameAssembler::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S> Stream for FrameStream<S>
where
    S: Stream<Item = StreamResult<bytes::Bytes>> + Unpin,
{
    type Item = StreamResult<String>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(payload)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let payloads = self.assembler.push(&chunk);
                    self.pending.extend(payloads);
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => {
                    // A retained partial frame at end-of-stream is dropped;
                    // best-effort parsing does not surface it.
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    const RECORDS: &str = "data: {\"data\":\"Hello\"}\n\ndata: {\"data\":\" world\"}\n\n";

    #[test]
    fn single_chunk_yields_all_frames() {
        let mut assembler = FrameAssembler::new();
        let payloads = assembler.push(RECORDS.as_bytes());
        assert_eq!(
            payloads,
            vec![r#"{"data":"Hello"}"#, r#"{"data":" world"}"#]
        );
    }

    /// Chunk-boundary invariance: every split offset yields the same frames.
    #[test]
    fn split_at_every_offset_yields_same_frames() {
        let expected = vec![
            r#"{"data":"Hello"}"#.to_string(),
            r#"{"data":" world"}"#.to_string(),
        ];
        let bytes = RECORDS.as_bytes();
        for split in 0..bytes.len() {
            let mut assembler = FrameAssembler::new();
            let mut payloads = assembler.push(&bytes[..split]);
            payloads.extend(assembler.push(&bytes[split..]));
            assert_eq!(payloads, expected, "split at {split}");
        }
    }

    #[test]
    fn terminator_split_across_chunks() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(b"data: {\"data\":\"Hel").is_empty());
        assert!(assembler.push(b"lo\"}\n").is_empty());
        let payloads = assembler.push(b"\n");
        assert_eq!(payloads, vec![r#"{"data":"Hello"}"#]);
    }

    #[test]
    fn crlf_terminator_accepted() {
        let mut assembler = FrameAssembler::new();
        let payloads = assembler.push(b"data: {\"data\":\"a\"}\r\n\r\ndata: {\"data\":\"b\"}\n\n");
        assert_eq!(payloads, vec![r#"{"data":"a"}"#, r#"{"data":"b"}"#]);
    }

    #[test]
    fn multibyte_utf8_split_across_chunks() {
        // 你 = E4 BD A0; split inside the sequence.
        let record = "data: {\"data\":\"你好\"}\n\n".as_bytes();
        let split = record
            .iter()
            .position(|&b| b == 0xE4)
            .expect("multibyte start")
            + 1;
        let mut assembler = FrameAssembler::new();
        let mut payloads = assembler.push(&record[..split]);
        payloads.extend(assembler.push(&record[split..]));
        assert_eq!(payloads, vec!["{\"data\":\"你好\"}"]);
    }

    #[test]
    fn non_frame_bytes_are_discarded() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(b": keepalive comment\n").is_empty());
        let payloads = assembler.push(b"data: {\"start\":true}\n\n");
        assert_eq!(payloads, vec![r#"{"start":true}"#]);
    }

    #[test]
    fn marker_prefix_at_chunk_boundary_is_retained() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(b"noise da").is_empty());
        let payloads = assembler.push(b"ta: {\"start\":true}\n\n");
        assert_eq!(payloads, vec![r#"{"start":true}"#]);
    }

    #[test]
    fn embedded_marker_text_inside_payload_is_not_rescanned() {
        let mut assembler = FrameAssembler::new();
        let payloads = assembler.push(b"data: {\"data\":\"say data: hi\"}\n\ndata: {\"data\":\"x\"}\n\n");
        assert_eq!(
            payloads,
            vec![r#"{"data":"say data: hi"}"#, r#"{"data":"x"}"#]
        );
    }

    #[tokio::test]
    async fn frame_stream_over_small_chunks() {
        let chunks: Vec<StreamResult<bytes::Bytes>> = RECORDS
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        let mut frames = FrameStream::new(futures_util::stream::iter(chunks));

        let mut payloads = Vec::new();
        while let Some(result) = frames.next().await {
            payloads.push(result.expect("valid frame"));
        }
        assert_eq!(
            payloads,
            vec![r#"{"data":"Hello"}"#, r#"{"data":" world"}"#]
        );
    }

    #[tokio::test]
    async fn frame_stream_ends_cleanly_with_partial_frame() {
        let chunks: Vec<StreamResult<bytes::Bytes>> = vec![Ok(bytes::Bytes::from_static(
            b"data: {\"data\":\"done\"}\n\ndata: {\"data\":\"trunc",
        ))];
        let mut frames = FrameStream::new(futures_util::stream::iter(chunks));

        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            r#"{"data":"done"}"#
        );
        assert!(frames.next().await.is_none());
    }
}
