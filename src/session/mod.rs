// Conversation state for one interactive run


use std::collections::VecDeque;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::llm::{ApiKey, ChatGenerator};
use crate::query::{Answer, QueryPipeline};
use crate::{QaError, Result};

/// One question and the answer it received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    #[inline]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Most recent turns, oldest evicted first once the bound is reached
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationHistory {
    #[inline]
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    #[inline]
    pub fn push(&mut self, turn: Turn) {
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Turns oldest first
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Markdown-style transcript, `**Q1:**`/`**A1:**` for the oldest turn
    #[inline]
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                format!(
                    "**Q{n}:** {}\n**A{n}:** {}",
                    turn.question,
                    turn.answer,
                    n = i + 1
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Interactive session state: the bounded history and the user's API key
///
/// The key lives only as long as the session and is never persisted.
pub struct Session {
    history: ConversationHistory,
    api_key: Option<ApiKey>,
}

impl Session {
    #[inline]
    pub fn new(max_history: usize) -> Self {
        Self {
            history: ConversationHistory::new(max_history),
            api_key: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<ApiKey>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Validate and store a key typed by the user
    #[inline]
    pub fn set_credential(&mut self, raw: &str) -> Result<()> {
        self.api_key = Some(ApiKey::parse(raw)?);
        Ok(())
    }

    #[inline]
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    #[inline]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[inline]
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Ask one question and record the turn on success
    ///
    /// Failures leave the history untouched so the session can continue.
    #[inline]
    pub async fn ask<E: Embedder, G: ChatGenerator>(
        &mut self,
        pipeline: &QueryPipeline<E, G>,
        question: &str,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Generation("Question is empty".to_string()));
        }

        let history: Vec<Turn> = self.history.iter().cloned().collect();
        let answer = pipeline
            .ask(question, &history, self.api_key.as_ref())
            .await?;

        self.history.push(Turn::new(question, answer.text.clone()));
        debug!(
            "History holds {}/{} turns",
            self.history.len(),
            self.history.max_turns()
        );
        Ok(answer)
    }
}
