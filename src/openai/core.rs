use anyhow::{Error, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

/// Stream terminator, used by the upstream provider and re-emitted
/// downstream as the final event
pub const DONE: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    choices: Vec<CompletionChunkChoice>,
}

/// Reassembles complete lines from a stream of text chunks. The
/// trailing partial line is carried across reads so SSE frames split
/// over chunk boundaries parse correctly.
#[derive(Default)]
pub struct LineBuffer {
    remainder: String,
}

impl LineBuffer {
    /// Append a chunk and return the complete lines it finished
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.remainder.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(idx) = self.remainder.find('\n') {
            let line = self.remainder[..idx].to_string();
            let rest = self.remainder[idx + 1..].to_string();
            self.remainder = rest;
            lines.push(line);
        }
        lines
    }
}

/// One parsed event from the upstream stream
#[derive(Debug, PartialEq)]
pub enum StreamEvent {
    Token(String),
    Done,
}

/// Parse a single upstream SSE line. Returns `None` for anything that
/// isn't a well-formed data line carrying a token: comments, blank
/// lines, role-only deltas, and malformed payloads are all dropped.
pub fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let data = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    if data.is_empty() {
        return None;
    }
    if data == DONE {
        return Some(StreamEvent::Done);
    }

    let chunk = serde_json::from_str::<CompletionChunk>(data).ok()?;
    let token = chunk.choices.first()?.delta.content.clone()?;
    Some(StreamEvent::Token(token))
}

/// Downstream token event. Literal newlines in the token are replaced
/// with a line break marker so the browser can render them inside a
/// single SSE data line.
pub fn delta_event(token: &str) -> String {
    json!({"delta": token.replace('\n', "<br>")}).to_string()
}

/// Downstream in-band error event
pub fn error_event(message: &str) -> String {
    json!({"error": message}).to_string()
}

/// Issue a streaming chat completion request and translate the
/// provider's SSE frames into simplified downstream events on `tx`:
/// `{"delta": ...}` per token, `{"error": ...}` on upstream failure,
/// and the `[DONE]` sentinel exactly once at the end.
///
/// A failed send on `tx` means the client went away; the upstream read
/// loop stops instead of draining the rest of the response. Errors
/// after the initial response (network failures mid-stream, invalid
/// UTF-8) are returned to the caller, which is responsible for
/// terminating the downstream stream.
pub async fn completion_stream(
    tx: mpsc::UnboundedSender<String>,
    messages: &[Message],
    temperature: f32,
    max_tokens: u32,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<(), Error> {
    let payload = json!({
        "model": model,
        "stream": true,
        "temperature": temperature,
        "max_tokens": max_tokens,
        "messages": messages,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let _ = tx.send(error_event(&format!(
            "Upstream request failed ({}): {}",
            status,
            body.trim()
        )));
        let _ = tx.send(DONE.to_string());
        return Ok(());
    }

    let mut stream = response.bytes_stream();
    let mut lines = LineBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk_str = std::str::from_utf8(&chunk)?;

        for line in lines.push(chunk_str) {
            match parse_sse_line(&line) {
                Some(StreamEvent::Done) => {
                    // Terminate immediately even if more upstream data
                    // is still in flight
                    let _ = tx.send(DONE.to_string());
                    return Ok(());
                }
                Some(StreamEvent::Token(token)) => {
                    if tx.send(delta_event(&token)).is_err() {
                        return Ok(());
                    }
                }
                None => {}
            }
        }
    }

    // Upstream ended without a terminal sentinel
    let _ = tx.send(DONE.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_message_new() {
        let msg = Message::new(Role::User, "Hello world");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"Hello world"}"#
        );

        let msg = Message::new(Role::Assistant, "I can help!");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"assistant","content":"I can help!"}"#
        );
    }

    #[test]
    fn test_line_buffer_complete_lines() {
        let mut buf = LineBuffer::default();
        let lines = buf.push("one\ntwo\n");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_line_buffer_carries_partial_line() {
        let mut buf = LineBuffer::default();
        assert!(buf.push("data: {\"choi").is_empty());
        let lines = buf.push("ces\":[]}\ndata: ");
        assert_eq!(lines, vec!["data: {\"choices\":[]}".to_string()]);
        let lines = buf.push("[DONE]\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
    }

    #[test]
    fn test_parse_sse_line_token() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(
            parse_sse_line(line),
            Some(StreamEvent::Token("Hi".to_string()))
        );
    }

    #[test]
    fn test_parse_sse_line_done() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(StreamEvent::Done));
    }

    #[test]
    fn test_parse_sse_line_ignores_non_data_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
        assert_eq!(parse_sse_line("data: "), None);
    }

    #[test]
    fn test_parse_sse_line_ignores_malformed_payloads() {
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(parse_sse_line(r#"data: {"choices":[]}"#), None);
    }

    #[test]
    fn test_parse_sse_line_ignores_deltas_without_content() {
        // First chunk of a stream usually carries only the role
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line), None);
    }

    #[test]
    fn test_delta_event_replaces_newlines() {
        assert_eq!(delta_event("Hi"), r#"{"delta":"Hi"}"#);
        assert_eq!(delta_event("Hi\nthere"), r#"{"delta":"Hi<br>there"}"#);
    }

    #[test]
    fn test_error_event() {
        assert_eq!(error_event("boom"), r#"{"error":"boom"}"#);
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_completion_stream_translates_tokens() {
        let mut server = mockito::Server::new_async().await;

        let sse_response = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\ndata: [DONE]\n";

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create_async()
            .await;

        let messages = vec![Message::new(Role::User, "Say hi")];
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result =
            completion_stream(tx, &messages, 0.7, 800, &server.url(), "test-key", "gpt-4o-mini")
                .await;

        mock.assert_async().await;
        assert!(result.is_ok());
        assert_eq!(
            drain(&mut rx),
            vec![r#"{"delta":"Hi"}"#.to_string(), DONE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_completion_stream_stops_at_sentinel() {
        let mut server = mockito::Server::new_async().await;

        // Data after the sentinel must not be forwarded
        let sse_response = "data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n";

        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create_async()
            .await;

        let messages = vec![Message::new(Role::User, "Hi")];
        let (tx, mut rx) = mpsc::unbounded_channel();

        completion_stream(tx, &messages, 0.7, 800, &server.url(), "test-key", "gpt-4o-mini")
            .await
            .unwrap();

        assert_eq!(drain(&mut rx), vec![DONE.to_string()]);
    }

    #[tokio::test]
    async fn test_completion_stream_terminates_without_sentinel() {
        let mut server = mockito::Server::new_async().await;

        let sse_response = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n";

        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create_async()
            .await;

        let messages = vec![Message::new(Role::User, "Hi")];
        let (tx, mut rx) = mpsc::unbounded_channel();

        completion_stream(tx, &messages, 0.7, 800, &server.url(), "test-key", "gpt-4o-mini")
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![r#"{"delta":"Hi"}"#.to_string(), DONE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_completion_stream_relays_upstream_failure() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let messages = vec![Message::new(Role::User, "Hi")];
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result =
            completion_stream(tx, &messages, 0.7, 800, &server.url(), "test-key", "gpt-4o-mini")
                .await;

        assert!(result.is_ok());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events[0].contains("error"));
        assert!(events[0].contains("upstream exploded"));
        assert_eq!(events[1], DONE);
    }
}
