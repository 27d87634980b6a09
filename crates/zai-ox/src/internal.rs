use ai_ox_common::request_builder::{Endpoint, RequestBuilder, RequestConfig};

use crate::{
    error::ZaiError,
    request::{CHAT_COMPLETIONS_PATH, PreparedRequest},
};

/// Sends prepared chat requests upstream
pub(crate) struct ZaiRequestHelper {
    /// Carries the base URL and the JSON content type
    request_builder: RequestBuilder,
}

impl ZaiRequestHelper {
    /// Helper for the upstream at `base_url`
    pub(crate) fn new(client: reqwest::Client, base_url: &str) -> Self {
        let config =
            RequestConfig::new(base_url).with_header("content-type", "application/json");

        Self {
            request_builder: RequestBuilder::new(client, config),
        }
    }

    /// Open the upstream SSE response. The body is left unread.
    pub(crate) async fn open_chat_stream(
        &self,
        prepared: &PreparedRequest,
    ) -> Result<reqwest::Response, ZaiError> {
        let endpoint = Endpoint::post(CHAT_COMPLETIONS_PATH)
            .with_headers(prepared.headers.clone())
            .with_query(prepared.params.to_pairs());

        Ok(self
            .request_builder
            .send_json(&endpoint, &prepared.body)
            .await?)
    }
}
