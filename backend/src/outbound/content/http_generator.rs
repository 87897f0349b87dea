//! Reqwest-backed content generator adapter.
//!
//! This adapter owns transport details only: prompt rendering, bearer
//! authentication, HTTP error mapping, and extraction of the JSON object the
//! model is asked to reply with. Offer bounds are enforced by the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::dto::{ChatMessageDto, ChatRequestDto, ChatResponseDto, ContentDto, OfferDto};
use crate::domain::ports::{ContentGenerator, ContentGeneratorError};
use crate::domain::{CartContext, Offer, RecoveryContent};

const DEFAULT_REFERER: &str = "https://cart-recovery.invalid";
const DEFAULT_TITLE: &str = "Cart Recovery";

const CONTENT_SYSTEM_PROMPT: &str = "You write short, friendly cart recovery emails \
    for an online shop. Reply with a single JSON object and nothing else.";
const OFFER_SYSTEM_PROMPT: &str = "You choose promotional offers that win back \
    abandoned carts without eroding margin. Reply with a single JSON object and \
    nothing else.";

/// Attribution headers sent with every completion request.
pub struct ChatCompletionIdentity {
    /// `HTTP-Referer` header value.
    pub referer: String,
    /// `X-Title` header value.
    pub title: String,
}

impl Default for ChatCompletionIdentity {
    fn default() -> Self {
        Self {
            referer: DEFAULT_REFERER.to_owned(),
            title: DEFAULT_TITLE.to_owned(),
        }
    }
}

/// Content generator backed by an OpenAI-compatible chat completion endpoint.
pub struct HttpContentGenerator {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    identity: ChatCompletionIdentity,
}

impl HttpContentGenerator {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    /// ```rust,ignore
    /// let generator = HttpContentGenerator::new(endpoint, api_key, model, timeout)?;
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Self::with_identity(
            endpoint,
            api_key,
            model,
            timeout,
            ChatCompletionIdentity::default(),
        )
    }

    /// Build an adapter with explicit attribution headers.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(
        endpoint: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        identity: ChatCompletionIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            identity,
        })
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ContentGeneratorError> {
        let request = ChatRequestDto {
            model: self.model.as_str(),
            messages: [
                ChatMessageDto {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessageDto {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.as_str())
            .header("HTTP-Referer", self.identity.referer.as_str())
            .header("X-Title", self.identity.title.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let decoded: ChatResponseDto = serde_json::from_slice(body.as_ref()).map_err(|error| {
            ContentGeneratorError::malformed(format!("invalid completion payload: {error}"))
        })?;
        decoded
            .into_reply_text()
            .ok_or_else(|| ContentGeneratorError::malformed("completion has no reply text"))
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(
        &self,
        context: &CartContext,
    ) -> Result<RecoveryContent, ContentGeneratorError> {
        let reply = self
            .complete(CONTENT_SYSTEM_PROMPT, &content_prompt(context))
            .await?;
        let content: ContentDto = parse_reply_object(&reply)?;
        Ok(content.into())
    }

    async fn suggest_offer(
        &self,
        context: &CartContext,
        previous: &[Offer],
    ) -> Result<Offer, ContentGeneratorError> {
        let reply = self
            .complete(OFFER_SYSTEM_PROMPT, &offer_prompt(context, previous))
            .await?;
        let offer: OfferDto = parse_reply_object(&reply)?;
        offer
            .into_domain_offer()
            .map_err(ContentGeneratorError::malformed)
    }
}

fn content_prompt(context: &CartContext) -> String {
    format!(
        "Write a cart recovery email.\n\
         Customer name: {name}\n\
         Items left in the cart: {items}\n\
         Cart value: ${value:.2}\n\n\
         Mention the items, keep it concise, add gentle urgency and end with a \
         clear call to action. Do not include a discount or a link; both are \
         appended separately.\n\
         Reply as JSON with keys \"subject\" and \"body\".",
        name = context.customer_name,
        items = context.items_summary,
        value = context.total_value.round_dp(2),
    )
}

fn offer_prompt(context: &CartContext, previous: &[Offer]) -> String {
    let history = if previous.is_empty() {
        "none".to_owned()
    } else {
        previous
            .iter()
            .map(|offer| format!("{} {} ({})", offer.kind, offer.value, offer.description))
            .collect::<Vec<_>>()
            .join("; ")
    };
    format!(
        "Suggest one offer to win back an abandoned cart.\n\
         Items: {items}\n\
         Cart value: ${value:.2}\n\
         Offers already sent, oldest first: {history}\n\n\
         Guidance: carts over $200 suit a 10-15% discount, carts between $100 \
         and $200 suit 5-10% off with free shipping, smaller carts suit free \
         shipping. A repeat offer must be more generous than the last one.\n\
         Reply as JSON with keys \"offer_type\" (\"percentage_discount\" or \
         \"free_shipping\"), \"offer_value\" (number) and \"offer_description\".",
        items = context.items_summary,
        value = context.total_value.round_dp(2),
    )
}

/// Slice from the first `{` to the last `}`; models often wrap JSON in prose
/// or code fences.
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    reply.get(start..=end)
}

fn parse_reply_object<T: DeserializeOwned>(reply: &str) -> Result<T, ContentGeneratorError> {
    let object = extract_json_object(reply).ok_or_else(|| {
        ContentGeneratorError::malformed(format!(
            "reply has no JSON object: {}",
            body_preview(reply.as_bytes())
        ))
    })?;
    serde_json::from_str(object)
        .map_err(|error| ContentGeneratorError::malformed(format!("reply JSON invalid: {error}")))
}

fn map_transport_error(error: reqwest::Error) -> ContentGeneratorError {
    if error.is_timeout() {
        ContentGeneratorError::timeout(error.to_string())
    } else {
        ContentGeneratorError::unavailable(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ContentGeneratorError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ContentGeneratorError::timeout(message)
        }
        _ => ContentGeneratorError::unavailable(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
