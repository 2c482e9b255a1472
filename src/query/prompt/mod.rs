
use crate::database::ChunkMetadata;
use crate::llm::ChatMessage;
use crate::session::Turn;

/// Assembles the chat messages sent for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    title: String,
    include_history: bool,
}

impl PromptBuilder {
    #[inline]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            include_history: false,
        }
    }

    /// Send earlier turns as user/assistant messages before the question
    #[inline]
    #[must_use]
    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    #[inline]
    pub fn system_message(&self) -> ChatMessage {
        ChatMessage::system(format!(
            "You answer questions about {} using only the documents supplied with each question.",
            self.title
        ))
    }

    /// The question together with the retrieved context
    #[inline]
    pub fn user_message(&self, question: &str, documents: &[&ChunkMetadata]) -> ChatMessage {
        let mut content = format!(
            "Given these documents from {}, answer the question accurately and concisely.\n\nDocuments:\n",
            self.title
        );

        for document in documents {
            match document.page_number {
                Some(page) => {
                    content.push_str("[page ");
                    content.push_str(&page.to_string());
                    content.push_str("]\n");
                }
                None => content.push_str("[document]\n"),
            }
            content.push_str(document.content.trim());
            content.push_str("\n\n");
        }
        if documents.is_empty() {
            content.push_str("(no documents were retrieved)\n\n");
        }

        content.push_str("Question: ");
        content.push_str(question.trim());
        content.push_str(
            "\n\nAnswer based on the provided documents. If the information is not available in the documents, please say so.\nAnswer:",
        );

        ChatMessage::user(content)
    }

    /// System message, optional prior turns, then the question with context
    #[inline]
    pub fn build(
        &self,
        question: &str,
        documents: &[&ChunkMetadata],
        history: &[Turn],
    ) -> Vec<ChatMessage> {
        let mut messages = vec![self.system_message()];

        if self.include_history {
            for turn in history {
                messages.push(ChatMessage::user(turn.question.clone()));
                messages.push(ChatMessage::assistant(turn.answer.clone()));
            }
        }

        messages.push(self.user_message(question, documents));
        messages
    }
}
