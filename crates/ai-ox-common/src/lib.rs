#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! Shared plumbing for ai-ox protocol translators
//!
//! Everything a translator needs that is not specific to one upstream:
//! the caller-facing OpenAI chat-completion wire types, a line-oriented SSE
//! reader and a small request builder over `reqwest`.

pub mod error;
pub mod openai_format;
pub mod request_builder;
pub mod streaming;

pub use error::CommonRequestError;
pub use openai_format::*;
pub use request_builder::{Endpoint, RequestBuilder, RequestConfig};
pub use streaming::SseLineReader;

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
