//! genai-studio library
//!
//! A web and terminal front-end for multimodal prompts against a hosted
//! generative model: chat sessions, inline image and audio analysis, and
//! video analysis through the remote Files service.

pub mod ai;
pub mod cli;
pub mod config;
pub mod logging;
pub mod media;
pub mod server;
pub mod session;
