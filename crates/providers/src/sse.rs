//! SSE plumbing for streaming completions.
//!
//! The wire is a sequence of `\n\n`-delimited event blocks; only the
//! `data:` lines matter here. [`drain_data_lines`] pulls complete
//! payloads out of a grow-only buffer, [`sse_response_stream`] turns a
//! `reqwest::Response` plus a payload parser into a canonical event
//! stream.

use rl_domain::error::Result;
use rl_domain::stream::{BoxStream, StreamEvent};

use crate::util::from_reqwest;

/// Extract complete `data:` payloads from an SSE buffer.
///
/// The buffer is drained in place; a trailing partial event stays for
/// the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2); // the \n\n delimiter

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a canonical event stream from an SSE response body.
///
/// `parse_data` maps one `data:` payload to zero or more events. When
/// the body closes, any buffered partial event is flushed, and a
/// trailing `Done` is synthesized if the parser never produced one — the
/// accumulator relies on the terminal signal.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: Fn(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                done_emitted = true;
                            }
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed: flush a trailing partial event, if any.
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                if matches!(&event, Ok(StreamEvent::Done { .. })) {
                                    done_emitted = true;
                                }
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done { finish_reason: Some("stop".into()) });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
