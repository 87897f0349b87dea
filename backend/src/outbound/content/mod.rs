//! Content generator outbound adapters.
//!
//! This module provides a thin HTTP implementation of the `ContentGenerator`
//! port against an OpenAI-compatible chat completion endpoint.

mod dto;
mod http_generator;

pub use http_generator::{ChatCompletionIdentity, HttpContentGenerator};
