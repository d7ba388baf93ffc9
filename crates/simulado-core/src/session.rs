//! Session state and its transitions.
//!
//! `SessionState` is the single mutable record of a running exam: the fixed
//! slot array, the sparse answer map, the essay text, the countdown, and
//! the remaining batch queue. All mutation goes through the methods here so
//! the invariants (fixed slot count, forward-only status, in-bounds
//! answers) hold no matter who drives the session.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{Area, EssayPrompt, ExamConfig, ForeignLanguage, Question, QuestionSlot};
use crate::scorer::ExamPerformance;

/// Session lifecycle status. Transitions only move forward:
/// `Running → Finalizing → Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Finalizing,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Finalizing => write!(f, "finalizing"),
            SessionStatus::Finished => write!(f, "finished"),
        }
    }
}

/// One content-fetch request for a contiguous range of question slots.
///
/// Count and offset never change after enqueue; `offset + count` never
/// exceeds the slot array length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub area: Area,
    pub count: usize,
    /// Insertion offset into the slot array.
    pub offset: usize,
    /// Set when this batch belongs to the foreign-language micro-section.
    #[serde(default)]
    pub language: Option<ForeignLanguage>,
    /// Topic filter carried by remediation batches.
    #[serde(default)]
    pub topic_filter: Option<Vec<String>>,
}

/// The full mutable state of one exam session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub config: ExamConfig,
    /// Fixed-length slot array; never resized after creation.
    pub slots: Vec<QuestionSlot>,
    pub essay_prompt: Option<EssayPrompt>,
    /// Sparse answer map: slot index → chosen option index. At most one
    /// entry per slot.
    pub answers: BTreeMap<usize, usize>,
    pub essay_text: String,
    pub seconds_remaining: u64,
    pub status: SessionStatus,
    /// Batches not yet fetched, in FIFO order.
    pub queue: VecDeque<BatchRequest>,
    /// Last non-fatal error, for display. Never interrupts the session.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Set when the background loader exhausted its retries and stopped.
    /// Reset on resume so the remaining queue gets a fresh chance.
    #[serde(default)]
    pub loader_failed: bool,
}

impl SessionState {
    /// Create the initial state for a validated config and its planned
    /// batch queue.
    pub fn new(config: ExamConfig, queue: Vec<BatchRequest>) -> Self {
        let slots = (0..config.total_slots).map(|_| QuestionSlot::Pending).collect();
        let seconds_remaining = config.duration_secs;
        Self {
            config,
            slots,
            essay_prompt: None,
            answers: BTreeMap::new(),
            essay_text: String::new(),
            seconds_remaining,
            status: SessionStatus::Running,
            queue: queue.into(),
            last_error: None,
            loader_failed: false,
        }
    }

    /// Record an objective answer. Out-of-range indices are rejected;
    /// re-answering a slot overwrites the previous choice.
    pub fn record_answer(&mut self, slot: usize, option: usize) -> Result<(), EngineError> {
        if slot >= self.slots.len() {
            return Err(EngineError::SlotOutOfRange {
                slot,
                total: self.slots.len(),
            });
        }
        self.answers.insert(slot, option);
        Ok(())
    }

    /// Overwrite the essay text. Length and emptiness checks belong to the
    /// caller.
    pub fn set_essay_text(&mut self, text: impl Into<String>) {
        self.essay_text = text.into();
    }

    /// Write a completed batch into the slot array at the head request's
    /// offset and pop the head. Returns the written `(offset, count)`.
    ///
    /// A batch whose size does not match the head request is rejected and
    /// the request stays queued; silently truncating would leave the tail
    /// of the range pending with no retry.
    pub fn apply_batch(&mut self, questions: Vec<Question>) -> Result<(usize, usize), EngineError> {
        let head = self.queue.front().ok_or(EngineError::QueueEmpty)?;
        if questions.len() != head.count {
            return Err(EngineError::BatchMismatch {
                expected: head.count,
                got: questions.len(),
            });
        }
        let offset = head.offset;
        let count = head.count;
        for (i, question) in questions.into_iter().enumerate() {
            self.slots[offset + i] = QuestionSlot::Loaded { question };
        }
        self.queue.pop_front();
        Ok((offset, count))
    }

    /// Advance the countdown by one second. Only ticks while running;
    /// returns the seconds remaining afterwards.
    pub fn tick(&mut self) -> u64 {
        if self.status == SessionStatus::Running {
            self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        }
        self.seconds_remaining
    }

    /// Transition `Running → Finalizing`. Returns `false` (and leaves the
    /// status untouched) when the session already left `Running`.
    pub fn begin_finalize(&mut self) -> bool {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Finalizing;
            true
        } else {
            false
        }
    }

    /// Transition `Finalizing → Finished`.
    pub fn mark_finished(&mut self) {
        if self.status == SessionStatus::Finalizing {
            self.status = SessionStatus::Finished;
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Slots whose question has arrived.
    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_loaded()).count()
    }

    /// Whether every planned batch has been fetched.
    pub fn fully_loaded(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Serialized form of a session, as handed to the session store. Carries
/// the remaining batch queue so a resumed session continues loading where
/// it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    /// Present once the session finished.
    #[serde(default)]
    pub performance: Option<ExamPerformance>,
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(session_id: Uuid, state: SessionState) -> Self {
        Self {
            session_id,
            state,
            performance: None,
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExamMode;

    fn sample_config(total_slots: usize) -> ExamConfig {
        ExamConfig {
            mode: ExamMode::AreaTraining,
            target_courses: Vec::new(),
            areas: vec![Area::Mathematics],
            duration_secs: 600,
            total_slots,
            language: None,
            focus_topics: Vec::new(),
        }
    }

    fn sample_question(topic: &str) -> Question {
        Question {
            area: Area::Mathematics,
            subject: "algebra".into(),
            prompt: "2 + 2 = ?".into(),
            options: vec!["3".into(), "4".into(), "5".into()],
            correct_index: 1,
            topic: topic.into(),
            source: "test".into(),
        }
    }

    fn state_with_queue(total_slots: usize, queue: Vec<BatchRequest>) -> SessionState {
        SessionState::new(sample_config(total_slots), queue)
    }

    #[test]
    fn new_state_is_all_pending() {
        let state = state_with_queue(4, Vec::new());
        assert_eq!(state.slots.len(), 4);
        assert_eq!(state.loaded_count(), 0);
        assert_eq!(state.seconds_remaining, 600);
        assert_eq!(state.status, SessionStatus::Running);
    }

    #[test]
    fn answer_overwrites_previous_value() {
        let mut state = state_with_queue(4, Vec::new());
        state.record_answer(2, 0).unwrap();
        state.record_answer(2, 3).unwrap();
        assert_eq!(state.answers.get(&2), Some(&3));
        assert_eq!(state.answers.len(), 1);
    }

    #[test]
    fn answer_out_of_range_is_rejected() {
        let mut state = state_with_queue(4, Vec::new());
        let err = state.record_answer(4, 0).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SlotOutOfRange { slot: 4, total: 4 }
        ));
        assert!(state.answers.is_empty());
    }

    #[test]
    fn apply_batch_writes_at_offset_and_pops_head() {
        let queue = vec![
            BatchRequest {
                area: Area::Mathematics,
                count: 2,
                offset: 1,
                language: None,
                topic_filter: None,
            },
            BatchRequest {
                area: Area::Mathematics,
                count: 1,
                offset: 3,
                language: None,
                topic_filter: None,
            },
        ];
        let mut state = state_with_queue(4, queue);

        let (offset, count) = state
            .apply_batch(vec![sample_question("a"), sample_question("b")])
            .unwrap();
        assert_eq!((offset, count), (1, 2));
        assert!(!state.slots[0].is_loaded());
        assert!(state.slots[1].is_loaded());
        assert!(state.slots[2].is_loaded());
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.queue.front().unwrap().offset, 3);
    }

    #[test]
    fn short_batch_is_rejected_and_stays_queued() {
        let queue = vec![BatchRequest {
            area: Area::Mathematics,
            count: 2,
            offset: 0,
            language: None,
            topic_filter: None,
        }];
        let mut state = state_with_queue(4, queue);

        let err = state.apply_batch(vec![sample_question("a")]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BatchMismatch { expected: 2, got: 1 }
        ));
        assert_eq!(state.loaded_count(), 0);
        assert_eq!(state.queue.len(), 1);
    }

    #[test]
    fn apply_batch_on_empty_queue_fails() {
        let mut state = state_with_queue(4, Vec::new());
        assert!(matches!(
            state.apply_batch(vec![sample_question("a")]),
            Err(EngineError::QueueEmpty)
        ));
    }

    #[test]
    fn tick_stops_at_zero_and_when_not_running() {
        let mut state = state_with_queue(1, Vec::new());
        state.seconds_remaining = 1;
        assert_eq!(state.tick(), 0);
        assert_eq!(state.tick(), 0);

        state.seconds_remaining = 10;
        state.begin_finalize();
        assert_eq!(state.tick(), 10);
    }

    #[test]
    fn status_never_moves_backward() {
        let mut state = state_with_queue(1, Vec::new());
        assert!(state.begin_finalize());
        assert!(!state.begin_finalize());
        state.mark_finished();
        assert_eq!(state.status, SessionStatus::Finished);
        assert!(!state.begin_finalize());
        assert_eq!(state.status, SessionStatus::Finished);
    }

    #[test]
    fn snapshot_roundtrip_preserves_queue_and_answers() {
        let queue = vec![BatchRequest {
            area: Area::Mathematics,
            count: 2,
            offset: 1,
            language: None,
            topic_filter: Some(vec!["fractions".into()]),
        }];
        let mut state = state_with_queue(3, queue);
        state.record_answer(0, 2).unwrap();
        state.set_essay_text("draft");
        state.seconds_remaining = 123;

        let snapshot = SessionSnapshot::new(Uuid::new_v4(), state.clone());
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back.state, state);
        assert_eq!(back.session_id, snapshot.session_id);
        assert!(back.performance.is_none());
    }
}
