//! Client for OpenAI compatible chat completion APIs.
mod core;

pub use self::core::{
    DONE, LineBuffer, Message, Role, StreamEvent, completion_stream, delta_event, error_event,
    parse_sse_line,
};
