//! Builds the upstream call (body, query params, headers) from a caller request.

use ai_ox_common::openai_format::{ChatRequest, ContentPart, Message, MessageContent, MessageRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    config::Settings,
    error::ZaiError,
    features::{FeatureFlags, FeatureSet},
    signature,
    upload::{self, FileRef, ImageUploader},
};

/// Path of the upstream chat endpoint
pub const CHAT_COMPLETIONS_PATH: &str = "api/chat/completions";

/// Flattened text message as the upstream expects it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Caller messages flattened to text, plus the image URLs pulled out of them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedMessages {
    pub messages: Vec<UpstreamMessage>,
    pub image_urls: Vec<String>,
}

/// JSON body of the upstream chat call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamBody {
    pub stream: bool,
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub chat_id: String,
    pub id: String,
    pub files: Vec<FileRef>,
    pub features: FeatureFlags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<String>,
}

/// Query string of the upstream chat call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryParams {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub timestamp: String,
    pub user_id: String,
    pub signature_timestamp: String,
}

impl QueryParams {
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("requestId".to_string(), self.request_id.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
            ("user_id".to_string(), self.user_id.clone()),
            ("signature_timestamp".to_string(), self.signature_timestamp.clone()),
        ]
    }
}

/// Everything needed to open the upstream stream
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub body: UpstreamBody,
    pub params: QueryParams,
    pub headers: HashMap<String, String>,
}

/// Flatten caller messages.
///
/// Text-only messages keep their role. Every text part of a multi-part message
/// becomes its own `user` message whatever the container role was; image parts
/// are collected in order.
#[must_use]
pub fn convert_messages(messages: &[Message]) -> ConvertedMessages {
    let mut converted = ConvertedMessages::default();

    for message in messages {
        match &message.content {
            MessageContent::Text(text) => converted.messages.push(UpstreamMessage {
                role: message.role,
                content: text.clone(),
            }),
            MessageContent::Parts(parts) => {
                for part in parts {
                    match part {
                        ContentPart::Text { text } => converted.messages.push(UpstreamMessage {
                            role: MessageRole::User,
                            content: text.clone(),
                        }),
                        ContentPart::ImageUrl { image_url } => {
                            converted.image_urls.push(image_url.url.clone());
                        }
                    }
                }
            }
        }
    }

    converted
}

/// Transaction string covered by the signature
#[must_use]
pub fn transaction_string(request_id: &str, timestamp: i64, user_id: &str) -> String {
    format!("requestId,{request_id},timestamp,{timestamp},user_id,{user_id}")
}

/// Unix time in milliseconds
fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Build the upstream body, query params and headers for one caller request.
///
/// Images are uploaded before anything else is sent; an upload failure fails
/// the whole request.
pub async fn prepare(
    settings: &Settings,
    request: &ChatRequest,
    access_token: &str,
    streaming: bool,
    uploader: &dyn ImageUploader,
) -> Result<PreparedRequest, ZaiError> {
    let ConvertedMessages {
        messages,
        image_urls,
    } = convert_messages(&request.messages);

    let last_content = messages
        .last()
        .map(|message| message.content.clone())
        .ok_or(ZaiError::EmptyConversation)?;

    let files = upload::upload_images(uploader, access_token, &image_urls).await?;
    let FeatureSet {
        features,
        mcp_servers,
    } = FeatureSet::resolve(&request.model, streaming);

    let body = UpstreamBody {
        stream: true,
        model: settings.upstream_model(&request.model).to_string(),
        messages,
        chat_id: Uuid::new_v4().to_string(),
        id: Uuid::new_v4().to_string(),
        files,
        features,
        mcp_servers,
    };

    let request_id = Uuid::new_v4().to_string();
    let user_id = Uuid::new_v4().to_string();
    let timestamp = now_ms();
    let transaction = transaction_string(&request_id, timestamp, &user_id);

    // signature time is sampled separately from `timestamp`
    let signed = signature::sign(&transaction, &last_content, now_ms());

    let params = QueryParams {
        request_id,
        timestamp: timestamp.to_string(),
        user_id,
        signature_timestamp: signed.timestamp.to_string(),
    };

    let mut headers = settings.headers.clone();
    headers.retain(|key, _| {
        !key.eq_ignore_ascii_case("authorization") && !key.eq_ignore_ascii_case("x-signature")
    });
    headers.insert("Authorization".to_string(), format!("Bearer {access_token}"));
    headers.insert("X-Signature".to_string(), signed.signature);

    log::debug!(
        "Prepared upstream request: model={} messages={} files={} streaming={}",
        body.model,
        body.messages.len(),
        body.files.len(),
        streaming
    );

    Ok(PreparedRequest {
        body,
        params,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_messages_keep_their_role() {
        let converted = convert_messages(&[
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);

        let roles: Vec<_> = converted.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]
        );
        assert!(converted.image_urls.is_empty());
    }

    #[test]
    fn parts_become_user_messages_and_images_are_collected() {
        let converted = convert_messages(&[Message::assistant(vec![
            ContentPart::text("one"),
            ContentPart::image_url("http://x/a.png"),
            ContentPart::text("two"),
            ContentPart::image_url("data:image/png;base64,QUJD"),
        ])]);

        assert_eq!(
            converted.messages,
            vec![
                UpstreamMessage {
                    role: MessageRole::User,
                    content: "one".to_string()
                },
                UpstreamMessage {
                    role: MessageRole::User,
                    content: "two".to_string()
                },
            ]
        );
        assert_eq!(
            converted.image_urls,
            vec!["http://x/a.png".to_string(), "data:image/png;base64,QUJD".to_string()]
        );
    }

    #[test]
    fn transaction_string_format() {
        assert_eq!(
            transaction_string("r", 17, "u"),
            "requestId,r,timestamp,17,user_id,u"
        );
    }

    #[test]
    fn query_params_wire_names() {
        let params = QueryParams {
            request_id: "r".into(),
            timestamp: "1".into(),
            user_id: "u".into(),
            signature_timestamp: "2".into(),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "requestId": "r",
                "timestamp": "1",
                "user_id": "u",
                "signature_timestamp": "2"
            })
        );
        assert_eq!(params.to_pairs()[0], ("requestId".to_string(), "r".to_string()));
    }
}
