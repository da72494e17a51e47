//! Scripted backend
//!
//! Replays queued responses in order and records every request it receives.
//! Used by tests and for running the server without an LLM account.

use std::collections::VecDeque;

use async_trait::async_trait;
use careline_core::{GenerateRequest, GenerateResponse};
use parking_lot::Mutex;

use crate::backend::LlmBackend;
use crate::LlmError;

/// Reply used once the queue is exhausted
const DEFAULT_REPLY: &str = "How can I help you today?";

#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<GenerateResponse, LlmError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    fail_when_empty: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that fails every call not explicitly scripted
    pub fn failing() -> Self {
        Self {
            fail_when_empty: true,
            ..Self::default()
        }
    }

    /// Queue a plain text reply
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(GenerateResponse::text(text)));
        self
    }

    /// Queue an arbitrary response, e.g. a tool call
    pub fn with_response(self, response: GenerateResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn with_error(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, response: Result<GenerateResponse, LlmError>) {
        self.responses.lock().push_back(response);
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.requests.lock().push(request);

        match self.responses.lock().pop_front() {
            Some(response) => response,
            None if self.fail_when_empty => {
                Err(LlmError::Network("scripted backend unavailable".to_string()))
            }
            None => Ok(GenerateResponse::text(DEFAULT_REPLY)),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::ToolCall;

    #[tokio::test]
    async fn test_replays_in_order() {
        let backend = ScriptedBackend::new()
            .with_response(GenerateResponse::tool_call(ToolCall::new(
                "call_1",
                "small_talk",
                r#"{"message":"hi"}"#,
            )))
            .with_text("second");

        let first = backend.generate(GenerateRequest::new("sys")).await.unwrap();
        assert!(first.has_tool_calls());

        let second = backend.generate(GenerateRequest::new("sys")).await.unwrap();
        assert_eq!(second.text, "second");

        let third = backend.generate(GenerateRequest::new("sys")).await.unwrap();
        assert_eq!(third.text, DEFAULT_REPLY);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = ScriptedBackend::failing().with_text("once");
        assert!(backend.generate(GenerateRequest::new("sys")).await.is_ok());
        assert!(backend.generate(GenerateRequest::new("sys")).await.is_err());
    }
}
