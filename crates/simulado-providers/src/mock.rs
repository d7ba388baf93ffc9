//! Mock content generator for testing and offline runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use simulado_core::error::GeneratorError;
use simulado_core::model::{CutoffEstimate, EssayPrompt, EssayResult, Question};
use simulado_core::traits::{ContentGenerator, QuestionRequest};

/// A deterministic content generator: no network, instant answers.
///
/// Every generated question's correct option is index 0, so tests (and the
/// offline CLI mode) can produce any score they want. Failure injection
/// covers the loader's retry and give-up paths.
pub struct MockGenerator {
    essay_score: u32,
    cutoffs: Vec<CutoffEstimate>,
    /// Upcoming question fetches that will fail before calls succeed again.
    fail_fetches: AtomicU32,
    /// When set, failed fetches report a permanent auth error instead of a
    /// retryable network error.
    fail_permanently: bool,
    /// Upcoming question fetches that will return one question fewer than
    /// requested.
    truncate_fetches: AtomicU32,
    /// Artificial latency added to every question fetch.
    fetch_delay: Option<Duration>,
    /// Artificial latency added to essay grading.
    grading_delay: Option<Duration>,
    fetch_calls: AtomicU32,
    essay_calls: AtomicU32,
    cutoff_calls: AtomicU32,
    last_request: Mutex<Option<QuestionRequest>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            essay_score: 800,
            cutoffs: Vec::new(),
            fail_fetches: AtomicU32::new(0),
            fail_permanently: false,
            truncate_fetches: AtomicU32::new(0),
            fetch_delay: None,
            grading_delay: None,
            fetch_calls: AtomicU32::new(0),
            essay_calls: AtomicU32::new(0),
            cutoff_calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_essay_score(mut self, score: u32) -> Self {
        self.essay_score = score;
        self
    }

    pub fn with_cutoffs(mut self, cutoffs: Vec<CutoffEstimate>) -> Self {
        self.cutoffs = cutoffs;
        self
    }

    /// Make the next `n` question fetches fail with a retryable error.
    pub fn fail_next_fetches(self, n: u32) -> Self {
        self.fail_fetches.store(n, Ordering::SeqCst);
        self
    }

    /// Clear any remaining injected failures.
    pub fn reset_failures(&self) {
        self.fail_fetches.store(0, Ordering::SeqCst);
    }

    /// Make every failed fetch report a permanent authentication error.
    pub fn with_permanent_failures(mut self) -> Self {
        self.fail_permanently = true;
        self
    }

    /// Make the next `n` question fetches come back one question short.
    pub fn truncate_next_fetches(self, n: u32) -> Self {
        self.truncate_fetches.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn with_grading_delay(mut self, delay: Duration) -> Self {
        self.grading_delay = Some(delay);
        self
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    pub fn essay_calls(&self) -> u32 {
        self.essay_calls.load(Ordering::Relaxed)
    }

    pub fn cutoff_calls(&self) -> u32 {
        self.cutoff_calls.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<QuestionRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn make_question(&self, request: &QuestionRequest, index: usize) -> Question {
        let topic = match &request.topic_filter {
            Some(topics) if !topics.is_empty() => topics[index % topics.len()].clone(),
            _ => format!("{}-topic-{}", request.area, index % 7),
        };
        let subject = match request.language {
            Some(language) => language.to_string(),
            None => request.area.to_string(),
        };
        Question {
            area: request.area,
            subject,
            prompt: format!("mock question {index} on {topic}"),
            options: (0..5).map(|o| format!("option {o}")).collect(),
            correct_index: 0,
            topic,
            source: "mock".to_string(),
        }
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_questions(
        &self,
        request: &QuestionRequest,
    ) -> Result<Vec<Question>, GeneratorError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.fail_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_fetches.store(remaining - 1, Ordering::SeqCst);
            if self.fail_permanently {
                return Err(GeneratorError::AuthenticationFailed("mock auth".into()));
            }
            return Err(GeneratorError::Network("mock outage".into()));
        }

        let truncated = self.truncate_fetches.load(Ordering::SeqCst);
        let count = if truncated > 0 {
            self.truncate_fetches.store(truncated - 1, Ordering::SeqCst);
            request.count.saturating_sub(1)
        } else {
            request.count
        };
        Ok((0..count).map(|i| self.make_question(request, i)).collect())
    }

    async fn fetch_essay_prompt(&self) -> Result<EssayPrompt, GeneratorError> {
        Ok(EssayPrompt {
            theme: "Digital exclusion in Brazil".to_string(),
            supporting_text: "Mock supporting text.".to_string(),
        })
    }

    async fn grade_essay(
        &self,
        _text: &str,
        _prompt: Option<&EssayPrompt>,
    ) -> Result<EssayResult, GeneratorError> {
        self.essay_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.grading_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(EssayResult {
            total: self.essay_score,
            competencies: vec![self.essay_score / 5; 5],
            feedback: "mock feedback".to_string(),
        })
    }

    async fn estimate_cutoffs(
        &self,
        courses: &[String],
    ) -> Result<Vec<CutoffEstimate>, GeneratorError> {
        self.cutoff_calls.fetch_add(1, Ordering::Relaxed);
        if self.cutoffs.is_empty() {
            return Ok(courses
                .iter()
                .map(|course| CutoffEstimate {
                    course: course.clone(),
                    cutoff: 700.0,
                })
                .collect());
        }
        Ok(self.cutoffs.clone())
    }
}
