#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items
)]

//! OpenAI-compatible chat completions on top of the Z.ai chat backend.
//!
//! A caller request is flattened, signed and sent upstream as a streaming
//! call. The phase-tagged upstream events come back as OpenAI
//! `chat.completion.chunk` items, or are folded into one `chat.completion`
//! when the caller did not ask for a stream.
//!
//! ```no_run
//! # async fn run() -> Result<(), zai_ox::ZaiError> {
//! use futures_util::StreamExt;
//! use zai_ox::{Message, Zai};
//!
//! let zai = Zai::from_env()?;
//! let request = zai.chat().model("glm-4.6").messages(vec![Message::user("hi")]).build();
//!
//! let mut events = zai.stream_sse(&request, "access-token");
//! while let Some(event) = events.next().await {
//!     print!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ai_ox_common::{
    BoxStream, SseLineReader,
    openai_format::{ChatCompletionResponse, ChatRequest, ChatRequestBuilder},
};
use futures_util::StreamExt;

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod features;
/// Upstream HTTP plumbing
mod internal;
pub mod request;
pub mod signature;
pub mod stream;
pub mod upload;

use crate::{
    encode::ResponseContext,
    internal::ZaiRequestHelper,
    stream::StreamItem,
    upload::{ImageUploader, NoImageUploader},
};

pub use crate::{config::Settings, error::ZaiError};

/// Client for the Z.ai chat backend
#[derive(Clone)]
pub struct Zai {
    /// Upstream location, model mapping and extra headers
    settings: Settings,
    /// Resolves image parts to upstream file ids
    uploader: Arc<dyn ImageUploader>,
    /// Shared connection pool
    client: reqwest::Client,
}

impl Zai {
    /// Build a client whose connect and idle-read timeouts follow `settings.timeout`.
    /// Images are rejected until an uploader is set.
    pub fn new(settings: Settings) -> Result<Self, ZaiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .read_timeout(settings.timeout)
            .build()?;

        Ok(Self {
            settings,
            uploader: Arc::new(NoImageUploader),
            client,
        })
    }

    pub fn from_env() -> Result<Self, ZaiError> {
        Self::new(Settings::from_env()?)
    }

    #[must_use]
    pub fn with_uploader(mut self, uploader: impl ImageUploader + 'static) -> Self {
        self.uploader = Arc::new(uploader);
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Upstream request sender bound to the configured base URL
    fn request_helper(&self) -> ZaiRequestHelper {
        ZaiRequestHelper::new(self.client.clone(), &self.settings.base_url)
    }

    pub fn chat(&self) -> ChatRequestBuilder {
        ChatRequest::builder()
    }

    /// Prepare, sign and send the upstream call; returns once the status is known
    async fn open(
        &self,
        request: &ChatRequest,
        access_token: &str,
        streaming: bool,
    ) -> Result<(reqwest::Response, ResponseContext), ZaiError> {
        let prepared = request::prepare(
            &self.settings,
            request,
            access_token,
            streaming,
            self.uploader.as_ref(),
        )
        .await?;

        let response = self
            .request_helper()
            .open_chat_stream(&prepared)
            .await
            .inspect_err(|e| log::error!("Upstream request failed: {e}"))?;

        Ok((response, ResponseContext::new(request.model.clone())))
    }

    /// Stream the translated chunks, ending with [`StreamItem::Done`] when the
    /// upstream finishes normally. Dropping the stream closes the upstream
    /// connection.
    pub fn stream(
        &self,
        request: &ChatRequest,
        access_token: &str,
    ) -> BoxStream<'static, Result<StreamItem, ZaiError>> {
        let zai = self.clone();
        let request = request.clone();
        let access_token = access_token.to_string();

        Box::pin(async_stream::try_stream! {
            let (response, ctx) = zai.open(&request, &access_token, true).await?;
            let mut items = stream::translate(SseLineReader::new(response).into_stream(), ctx);

            while let Some(item) = items.next().await {
                yield item?;
            }
        })
    }

    /// [`Zai::stream`] rendered as SSE events. A failure becomes one error
    /// event and no `[DONE]` follows it.
    pub fn stream_sse(&self, request: &ChatRequest, access_token: &str) -> BoxStream<'static, String> {
        let mut items = self.stream(request, access_token);

        Box::pin(async_stream::stream! {
            while let Some(item) = items.next().await {
                match item.and_then(|item| item.to_sse()) {
                    Ok(event) => yield event,
                    Err(err) => {
                        yield encode::error_event(&err);
                        break;
                    }
                }
            }
        })
    }

    /// Send a request and return the aggregated response
    pub async fn send(
        &self,
        request: &ChatRequest,
        access_token: &str,
    ) -> Result<ChatCompletionResponse, ZaiError> {
        let (response, ctx) = self.open(request, access_token, false).await?;

        stream::aggregate(SseLineReader::new(response).into_stream(), ctx)
            .await
            .inspect_err(|e| log::error!("Upstream response could not be aggregated: {e}"))
    }
}

pub use ai_ox_common::openai_format::{
    ChatCompletionChunk as StreamChunk, ChatCompletionResponse as ChatResponse, ContentPart,
    Message, MessageRole,
};

pub type ChatResult = Result<ChatCompletionResponse, ZaiError>;
