//! Model provider abstraction and implementations
//!
//! The gateway talks to its model back end through the [`ChatProvider`]
//! trait; [`OpenAiProvider`] is the production implementation for
//! OpenAI-compatible chat completion APIs.

pub mod base;
pub mod openai;

pub use base::{ChatProvider, ChunkStream, Message};
pub use openai::OpenAiProvider;
