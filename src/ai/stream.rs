//! Line-delimited token stream parsing for streamed chat responses.

use std::pin::Pin;

use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;

use super::client::GenerationError;

/// Lazily pulled sequence of generated text chunks.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// One parsed line of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Text to deliver.
    Token(String),
    /// Line carried nothing to deliver.
    Skip,
    /// The provider signalled the end of the reply.
    Done,
}

/// Wire format of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// Ollama `/api/chat`: one JSON object per line.
    Ndjson,
    /// OpenAI-compatible chat completions: `data: {...}` server-sent events.
    Sse,
}

#[derive(Debug, Deserialize)]
struct OllamaLine {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a single line of a streamed response.
///
/// # Errors
///
/// Returns `GenerationError::ParseError` if the line is not valid JSON, or
/// `GenerationError::Stream` if the provider reported an error.
pub fn parse_line(format: LineFormat, line: &str) -> Result<LineEvent, GenerationError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }

    match format {
        LineFormat::Ndjson => {
            let parsed: OllamaLine = serde_json::from_str(line)
                .map_err(|e| GenerationError::ParseError(e.to_string()))?;
            if let Some(error) = parsed.error {
                return Err(GenerationError::Stream(error));
            }
            let text = parsed.message.map(|m| m.content).unwrap_or_default();
            if parsed.done && text.is_empty() {
                Ok(LineEvent::Done)
            } else if text.is_empty() {
                Ok(LineEvent::Skip)
            } else {
                Ok(LineEvent::Token(text))
            }
        }
        LineFormat::Sse => {
            let Some(data) = line.strip_prefix("data:") else {
                return Ok(LineEvent::Skip);
            };
            let data = data.trim();
            if data == "[DONE]" {
                return Ok(LineEvent::Done);
            }
            let parsed: OpenAiChunk = serde_json::from_str(data)
                .map_err(|e| GenerationError::ParseError(e.to_string()))?;
            let text: String = parsed
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if text.is_empty() {
                Ok(LineEvent::Skip)
            } else {
                Ok(LineEvent::Token(text))
            }
        }
    }
}

struct LineReader<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> LineReader<S> {
    fn next_buffered_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Turn a streamed response body into text chunks.
///
/// Bytes are pulled only as chunks are requested. The stream ends at the
/// provider's end marker, at the end of the body, or after the first error.
pub fn token_stream<S, B, E>(bytes: S, format: LineFormat) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = LineReader {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(reader, move |mut reader| async move {
        loop {
            if reader.finished {
                return None;
            }

            let line = match reader.next_buffered_line() {
                Some(line) => line,
                None => match reader.bytes.next().await {
                    Some(Ok(chunk)) => {
                        reader.buffer.extend_from_slice(chunk.as_ref());
                        continue;
                    }
                    Some(Err(e)) => {
                        reader.finished = true;
                        return Some((Err(GenerationError::Stream(e.to_string())), reader));
                    }
                    None => {
                        reader.finished = true;
                        match reader.take_remainder() {
                            Some(rest) => rest,
                            None => return None,
                        }
                    }
                },
            };

            match parse_line(format, &line) {
                Ok(LineEvent::Token(text)) => return Some((Ok(text), reader)),
                Ok(LineEvent::Skip) => {}
                Ok(LineEvent::Done) => return None,
                Err(e) => {
                    reader.finished = true;
                    return Some((Err(e), reader));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    async fn collect(stream: TokenStream) -> Vec<Result<String, GenerationError>> {
        stream.collect().await
    }

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + 'static {
        let parts: Vec<Result<Vec<u8>, String>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(parts)
    }

    #[test]
    fn test_parse_ndjson_token() {
        let line = r#"{"message":{"role":"assistant","content":"你好"},"done":false}"#;
        assert_eq!(
            parse_line(LineFormat::Ndjson, line).unwrap(),
            LineEvent::Token("你好".to_string())
        );
    }

    #[test]
    fn test_parse_ndjson_done_and_error() {
        assert_eq!(
            parse_line(LineFormat::Ndjson, r#"{"message":{"content":""},"done":true}"#).unwrap(),
            LineEvent::Done
        );
        let err = parse_line(LineFormat::Ndjson, r#"{"error":"model not found"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Stream(msg) if msg == "model not found"));
    }

    #[test]
    fn test_parse_sse_lines() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(
            parse_line(LineFormat::Sse, line).unwrap(),
            LineEvent::Token("Hi".to_string())
        );
        assert_eq!(parse_line(LineFormat::Sse, "data: [DONE]").unwrap(), LineEvent::Done);
        assert_eq!(parse_line(LineFormat::Sse, ": keep-alive").unwrap(), LineEvent::Skip);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_line(LineFormat::Ndjson, "{not json").unwrap_err();
        assert!(matches!(err, GenerationError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_token_stream_reassembles_split_lines() {
        let stream = token_stream(
            body(&[
                "{\"message\":{\"content\":\"a\"}}\n{\"mess",
                "age\":{\"content\":\"b\"}}\n",
                "{\"message\":{\"content\":\"c\"},\"done\":false}\n{\"done\":true}\n",
            ]),
            LineFormat::Ndjson,
        );

        let items: Vec<String> = collect(stream).await.into_iter().map(Result::unwrap).collect();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_token_stream_handles_missing_trailing_newline() {
        let stream = token_stream(body(&["{\"message\":{\"content\":\"end\"}}"]), LineFormat::Ndjson);
        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "end");
    }

    #[tokio::test]
    async fn test_token_stream_stops_after_body_error() {
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"{\"message\":{\"content\":\"a\"}}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"{\"message\":{\"content\":\"never\"}}\n".to_vec()),
        ];
        let items = collect(token_stream(stream::iter(parts), LineFormat::Ndjson)).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(&items[1], Err(GenerationError::Stream(msg)) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_token_stream_sse_done_marker() {
        let stream = token_stream(
            body(&[
                "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
                "data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
            ]),
            LineFormat::Sse,
        );
        let items: Vec<String> = collect(stream).await.into_iter().map(Result::unwrap).collect();
        assert_eq!(items, vec!["x"]);
    }
}
