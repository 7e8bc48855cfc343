use std::pin::Pin;

use aws_event_stream_parser::{EventStreamCodec, HeaderValue, Message};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use serde_json::Value;
use tokio_util::codec::Decoder;
use tracing::debug;
use xconverse_contracts::StreamEvent;
use xconverse_core::{CoreError, EventStream};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

struct FrameReader {
    body: ByteStream,
    buffer: BytesMut,
    codec: EventStreamCodec,
    finished: bool,
}

fn header(message: &Message, name: &str) -> Option<String> {
    message.headers.headers.iter().find(|header| header.key.as_str() == name).and_then(|header| {
        match &header.value {
            HeaderValue::String(value) => Some(value.to_string()),
            _ => None,
        }
    })
}

fn exception_text(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value
            .get("message")
            .or_else(|| value.get("Message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Maps one frame to an event; exception and error frames become classified errors.
pub(crate) fn decode_frame(message: &Message) -> Result<StreamEvent, CoreError> {
    let message_type = header(message, ":message-type").unwrap_or_else(|| "event".to_string());
    match message_type.as_str() {
        "event" => {
            let Some(event_type) = header(message, ":event-type") else {
                return Err(CoreError::Backend(
                    "event frame without :event-type header".to_string(),
                ));
            };
            StreamEvent::from_frame(&event_type, &message.body)
                .map_err(|err| CoreError::Backend(format!("malformed {event_type} frame: {err}")))
        }
        "exception" => {
            let kind = header(message, ":exception-type")
                .unwrap_or_else(|| "UnknownException".to_string());
            Err(CoreError::classify_backend(format!("{kind}: {}", exception_text(&message.body))))
        }
        other => {
            let code = header(message, ":error-code").unwrap_or_else(|| other.to_string());
            let text = header(message, ":error-message")
                .unwrap_or_else(|| exception_text(&message.body));
            Err(CoreError::classify_backend(format!("{code}: {text}")))
        }
    }
}

pub(crate) fn decode_events<S>(body: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let reader = FrameReader {
        body: Box::pin(body),
        buffer: BytesMut::new(),
        codec: EventStreamCodec,
        finished: false,
    };
    Box::pin(stream::unfold(reader, |mut reader| async move {
        loop {
            if reader.finished {
                return None;
            }
            match reader.codec.decode(&mut reader.buffer) {
                Ok(Some(message)) => return Some((decode_frame(&message), reader)),
                Ok(None) => {}
                Err(err) => {
                    reader.finished = true;
                    let error = CoreError::Backend(format!("event stream framing error: {err}"));
                    return Some((Err(error), reader));
                }
            }
            match reader.body.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    reader.finished = true;
                    let error = CoreError::Backend(format!("event stream read failed: {err}"));
                    return Some((Err(error), reader));
                }
                None => {
                    reader.finished = true;
                    if reader.buffer.is_empty() {
                        return None;
                    }
                    debug!(event = "backend.stream.truncated", buffered = reader.buffer.len());
                    let error = CoreError::Backend("event stream ended mid-frame".to_string());
                    return Some((Err(error), reader));
                }
            }
        }
    }))
}
