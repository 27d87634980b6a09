use crate::error::CommonRequestError;
use async_stream::try_stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream::BoxStream};
use std::pin::Pin;

/// Boxed byte stream the reader pulls from
type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, CommonRequestError>> + Send>>;

/// Line-oriented reader for Server-Sent-Events response bodies.
///
/// Network chunks do not respect line boundaries, so bytes are buffered until
/// a `\n` arrives. Lines are yielded without their terminator (`\n` or
/// `\r\n`); interpretation of `data:` prefixes is left to the caller. A final
/// line without terminator is flushed when the body ends.
pub struct SseLineReader {
    /// Response body
    byte_stream: ByteStream,
    /// Bytes received but not yet split into lines
    buffer: Vec<u8>,
    /// Set once the body has ended
    finished: bool,
}

impl SseLineReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_byte_stream(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(CommonRequestError::from)),
        )
    }

    pub fn from_byte_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, CommonRequestError>> + Send + 'static,
    {
        Self {
            byte_stream: Box::pin(stream),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Get the next line from the stream, `None` once the body is exhausted
    pub async fn next_line(&mut self) -> Result<Option<String>, CommonRequestError> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(Some(line));
            }

            if self.finished {
                return Ok(None);
            }

            if let Some(chunk) = self.byte_stream.next().await {
                self.buffer.extend_from_slice(&chunk?);
            } else {
                self.finished = true;
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buffer);
                return Ok(Some(decode_line(&rest)));
            }
        }
    }

    /// Turn the reader into a stream of lines
    pub fn into_stream(mut self) -> BoxStream<'static, Result<String, CommonRequestError>> {
        Box::pin(try_stream! {
            while let Some(line) = self.next_line().await? {
                yield line;
            }
        })
    }

    /// Next complete line in the buffer, if any
    fn take_buffered_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(decode_line(&line_bytes))
    }
}

/// Decode one raw line, dropping the line terminator.
///
/// Invalid UTF-8 is replaced rather than rejected; whatever JSON parser runs
/// next will flag the line as malformed.
fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

/// Parse an SSE `data:` line, returning the payload with leading spaces removed
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn reader(chunks: Vec<&'static [u8]>) -> SseLineReader {
        SseLineReader::from_byte_stream(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, CommonRequestError>(Bytes::from_static(c))),
        ))
    }

    async fn collect(mut reader: SseLineReader) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn splits_lines_across_chunk_boundaries() {
        let lines = collect(reader(vec![b"data: {\"a\"", b":1}\n\ndata: {\"b\":2}\n"])).await;
        assert_eq!(lines, vec!["data: {\"a\":1}", "", "data: {\"b\":2}"]);
    }

    #[tokio::test]
    async fn strips_crlf_terminators() {
        let lines = collect(reader(vec![b"data: x\r\n\r\n"])).await;
        assert_eq!(lines, vec!["data: x", ""]);
    }

    #[tokio::test]
    async fn flushes_unterminated_tail() {
        let lines = collect(reader(vec![b"data: one\ndata: tw", b"o"])).await;
        assert_eq!(lines, vec!["data: one", "data: two"]);
    }

    #[tokio::test]
    async fn keeps_multibyte_characters_split_between_chunks() {
        // "é" is 0xC3 0xA9
        let lines = collect(reader(vec![b"data: caf\xC3", b"\xA9\n"])).await;
        assert_eq!(lines, vec!["data: café"]);
    }

    #[tokio::test]
    async fn surfaces_transport_errors() {
        let chunks = vec![
            Ok(Bytes::from_static(b"data: ok\n")),
            Err(CommonRequestError::Api {
                status: 502,
                message: "connection reset".to_string(),
            }),
        ];
        let mut reader = SseLineReader::from_byte_stream(stream::iter(chunks));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("data: ok"));
        assert!(reader.next_line().await.is_err());
    }

    #[test]
    fn data_payload_requires_prefix() {
        assert_eq!(data_payload("data: {}"), Some("{}"));
        assert_eq!(data_payload("data:{}"), Some("{}"));
        assert_eq!(data_payload("event: ping"), None);
        assert_eq!(data_payload(""), None);
    }
}
