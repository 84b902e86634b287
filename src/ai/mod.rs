//! Generation model clients and prompts.

mod client;
mod prompts;
mod stream;

pub use client::*;
pub use prompts::{
    document_system_prompt, service_system_prompt, DEFAULT_SERVICE_PERSONA, DOCUMENT_SYSTEM_PROMPT,
};
pub use stream::{parse_line, token_stream, LineEvent, LineFormat, TokenStream};
