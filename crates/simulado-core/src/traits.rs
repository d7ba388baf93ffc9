//! Collaborator trait definitions: the AI content generator and the
//! session store.
//!
//! These async traits are implemented by the `simulado-providers` crate;
//! the engine only ever sees them as trait objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GeneratorError, StoreError};
use crate::model::{Area, CutoffEstimate, EssayPrompt, EssayResult, ForeignLanguage, Question};
use crate::session::{BatchRequest, SessionSnapshot};

/// One question-fetch call to the content generator, derived from the
/// batch request at the head of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub area: Area,
    pub count: usize,
    /// Restrict generation to these topics (remediation).
    #[serde(default)]
    pub topic_filter: Option<Vec<String>>,
    /// Foreign-language micro-section flag.
    #[serde(default)]
    pub language: Option<ForeignLanguage>,
}

impl From<&BatchRequest> for QuestionRequest {
    fn from(batch: &BatchRequest) -> Self {
        Self {
            area: batch.area,
            count: batch.count,
            topic_filter: batch.topic_filter.clone(),
            language: batch.language,
        }
    }
}

/// The external AI content generator. All calls are request/response, no
/// streaming.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Human-readable generator name (e.g. "openai").
    fn name(&self) -> &str;

    /// Generate a batch of objective questions.
    async fn fetch_questions(
        &self,
        request: &QuestionRequest,
    ) -> Result<Vec<Question>, GeneratorError>;

    /// Generate an essay prompt.
    async fn fetch_essay_prompt(&self) -> Result<EssayPrompt, GeneratorError>;

    /// Grade an essay on the 0–1000 scale.
    async fn grade_essay(
        &self,
        text: &str,
        prompt: Option<&EssayPrompt>,
    ) -> Result<EssayResult, GeneratorError>;

    /// Estimate admission cutoffs for the given course names.
    async fn estimate_cutoffs(
        &self,
        courses: &[String],
    ) -> Result<Vec<CutoffEstimate>, GeneratorError>;
}

/// Persistent session storage, keyed by session id. Last write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionSnapshot>, StoreError>;

    async fn delete(&self, session_id: Uuid) -> Result<(), StoreError>;
}
