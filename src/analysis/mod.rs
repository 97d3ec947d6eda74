//! Session-scoped state for the external analysis service.
//! Transport is supplied by the caller; this module owns caching and history only.

pub mod digest;

pub use digest::{CategoryDigest, build_digest};

use crate::error::Result;
use crate::ingest::CacheReset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One cached analysis plus its follow-up conversation.
///
/// Owned by the application state and reset whenever a new batch is
/// loaded. Every request goes through `&mut self`, so at most one is in
/// flight per session.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    initial: Option<String>,
    history: Vec<ChatMessage>,
    raw_context: Vec<String>,
    generation: u64,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached initial analysis, or request it once with an empty
    /// prompt and cache the answer. Failures are not cached.
    pub async fn initial_analysis<F, Fut>(&mut self, raw_context: Vec<String>, fetch: F) -> Result<String>
    where
        F: FnOnce(Vec<String>, String) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(cached) = &self.initial {
            debug!("initial analysis served from cache");
            return Ok(cached.clone());
        }

        self.raw_context = raw_context;
        let answer = fetch(self.raw_context.clone(), String::new()).await?;
        info!(chars = answer.len(), "initial analysis received");

        self.history
            .push(ChatMessage::now(Role::Assistant, answer.clone()));
        self.initial = Some(answer.clone());
        Ok(answer)
    }

    /// Ask a follow-up question against the same raw context.
    pub async fn chat<F, Fut>(&mut self, message: impl Into<String>, fetch: F) -> Result<String>
    where
        F: FnOnce(Vec<String>, String) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let message = message.into();
        self.history.push(ChatMessage::now(Role::User, message.clone()));

        let answer = fetch(self.raw_context.clone(), message).await?;
        self.history
            .push(ChatMessage::now(Role::Assistant, answer.clone()));
        Ok(answer)
    }

    pub fn has_initial_analysis(&self) -> bool {
        self.initial.is_some()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn raw_context(&self) -> &[String] {
        &self.raw_context
    }

    /// Number of resets so far; lets holders notice their view went stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reset(&mut self) {
        self.initial = None;
        self.history.clear();
        self.raw_context.clear();
        self.generation += 1;
        debug!(generation = self.generation, "analysis session reset");
    }
}

impl CacheReset for AnalysisSession {
    fn reset(&mut self) {
        AnalysisSession::reset(self);
    }
}
