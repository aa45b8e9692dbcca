//! promptforge: a small HTTP service that rewrites raw text into a
//! structured prompt for a downstream LLM.
//!
//! The free tier always succeeds via local deterministic templating;
//! the pro tier rotates an ordered candidate-model list against an
//! OpenRouter-compatible API with per-candidate retry, and falls back
//! to the deterministic path when every candidate fails. Valid requests
//! never receive a hard failure.

pub mod config;
pub mod enhance;
pub mod error;
pub mod limiter;
pub mod mode;
pub mod provider;
pub mod routes;
pub mod state;
