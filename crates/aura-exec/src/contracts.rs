use std::time::Duration;

use async_trait::async_trait;
use aura_core::decision::RawDecision;
use aura_core::state::AppState;
use aura_core::state::Memory;
use aura_core::state::Task;
use serde::Serialize;
use thiserror::Error;

/// The slice of state the classifier sees for grounding ("mark my last task done").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub memory: Memory,
    pub tasks: Vec<Task>,
}

impl ContextSnapshot {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            memory: state.memory.clone(),
            tasks: state.tasks.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("no credential found (checked {checked})")]
    MissingCredential { checked: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("service returned no candidate text")]
    EmptyResponse,
    #[error("response is not a routing decision: {0}")]
    MalformedResponse(String),
}

impl ClassifierError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MissingCredential { .. } | Self::EmptyResponse | Self::MalformedResponse(_) => {
                false
            }
        }
    }
}

/// One outbound request per call, no retries; retry policy belongs to the router.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError>;
}
