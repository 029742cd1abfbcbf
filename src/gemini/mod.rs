//! Gemini client modules.
//!
//! This module provides the request/response client used for report
//! generation and the stateful chat session used by the chat loop.

pub mod client;
pub mod types;

pub use client::{ChatSession, ContentGenerator, GeminiClient, GeminiError, GenerationRequest};
