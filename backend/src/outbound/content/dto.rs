//! DTOs for the OpenAI-compatible chat completion API.
//!
//! Requests serialise from borrowed prompt text; replies decode into these
//! transport DTOs first, then map into domain content or offers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Offer, OfferKind, RecoveryContent};

#[derive(Debug, Serialize)]
pub(super) struct ChatRequestDto<'a> {
    pub(super) model: &'a str,
    pub(super) messages: [ChatMessageDto<'a>; 2],
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessageDto<'a> {
    pub(super) role: &'static str,
    pub(super) content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponseDto {
    #[serde(default)]
    pub(super) choices: Vec<ChatChoiceDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoiceDto {
    pub(super) message: ChatReplyDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatReplyDto {
    #[serde(default)]
    pub(super) content: Option<String>,
}

impl ChatResponseDto {
    /// Text of the first choice, when the model produced any.
    pub(super) fn into_reply_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ContentDto {
    pub(super) subject: String,
    pub(super) body: String,
}

impl From<ContentDto> for RecoveryContent {
    fn from(dto: ContentDto) -> Self {
        Self {
            subject: dto.subject.trim().to_owned(),
            body: dto.body.trim().to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OfferDto {
    pub(super) offer_type: String,
    pub(super) offer_value: Decimal,
    #[serde(default)]
    pub(super) offer_description: String,
}

impl OfferDto {
    pub(super) fn into_domain_offer(self) -> Result<Offer, String> {
        let kind = self
            .offer_type
            .trim()
            .parse::<OfferKind>()
            .map_err(|err| err.to_string())?;
        Ok(Offer {
            kind,
            value: self.offer_value,
            description: self.offer_description.trim().to_owned(),
        })
    }
}
