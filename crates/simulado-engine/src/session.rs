//! The exam session coordinator.
//!
//! `ExamEngine` creates sessions; each `SessionHandle` owns one mutex-guarded
//! `SessionState` plus three background tasks: the batch loader, the
//! once-per-second countdown timer, and the autosave persister. All state
//! mutation is serialized through the one mutex, so user interaction,
//! background loading, and autosave never race on the slot array or queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use simulado_core::error::EngineError;
use simulado_core::model::{EssayPrompt, ExamConfig};
use simulado_core::planner::plan_batches;
use simulado_core::scorer::{score_session, ExamPerformance};
use simulado_core::session::{SessionSnapshot, SessionState, SessionStatus};
use simulado_core::traits::{ContentGenerator, QuestionRequest, SessionStore};

use crate::loader;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between autosave snapshots.
    pub autosave_interval: Duration,
    /// Hard timeout applied to every content-fetch call.
    pub fetch_timeout: Duration,
    /// Retries per batch before the background loader gives up.
    pub max_fetch_retries: u32,
    /// Initial delay between fetch retries; doubles per attempt, capped.
    pub retry_delay: Duration,
    /// Question slots in a turbo review session.
    pub review_slots: usize,
    /// Duration of a turbo review session, in seconds.
    pub review_duration_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
            max_fetch_retries: 5,
            retry_delay: Duration::from_secs(1),
            review_slots: 10,
            review_duration_secs: 900,
        }
    }
}

/// Change notifications delivered to the caller/UI.
pub trait SessionObserver: Send + Sync {
    fn on_slots_loaded(&self, offset: usize, count: usize);
    fn on_essay_prompt(&self, prompt: &EssayPrompt);
    fn on_tick(&self, seconds_remaining: u64);
    fn on_non_fatal_error(&self, message: &str);
    fn on_finished(&self, performance: &ExamPerformance);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_slots_loaded(&self, _: usize, _: usize) {}
    fn on_essay_prompt(&self, _: &EssayPrompt) {}
    fn on_tick(&self, _: u64) {}
    fn on_non_fatal_error(&self, _: &str) {}
    fn on_finished(&self, _: &ExamPerformance) {}
}

pub(crate) struct SessionInner {
    pub(crate) id: Uuid,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) generator: Arc<dyn ContentGenerator>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) observer: Arc<dyn SessionObserver>,
    pub(crate) config: EngineConfig,
    /// Set by `cancel`; every task checks it after each await so a
    /// late-arriving fetch can never repopulate a cancelled session.
    pub(crate) cancelled: AtomicBool,
    finalize_gate: tokio::sync::Mutex<()>,
    performance: Mutex<Option<ExamPerformance>>,
}

/// The session factory. Holds the collaborators every session shares.
pub struct ExamEngine {
    generator: Arc<dyn ContentGenerator>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
}

impl ExamEngine {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generator,
            store,
            config,
        }
    }

    /// Start a new session from a validated config.
    ///
    /// The opening probe batch (and the essay prompt, for essay modes) is
    /// fetched in the foreground so the user can begin the moment this
    /// returns; the countdown only starts afterwards. A fetch failure here
    /// is non-fatal — the request stays queued for the background loader.
    pub async fn start(
        &self,
        exam: ExamConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, EngineError> {
        exam.validate()?;
        let queue = plan_batches(&exam);
        let mut state = SessionState::new(exam, queue);

        if state.config.mode.has_essay() {
            match self.generator.fetch_essay_prompt().await {
                Ok(prompt) => {
                    observer.on_essay_prompt(&prompt);
                    state.essay_prompt = Some(prompt);
                }
                Err(e) => {
                    tracing::warn!("essay prompt fetch failed: {e}");
                    state.last_error = Some(format!("essay prompt unavailable: {e}"));
                    observer.on_non_fatal_error(&format!("essay prompt unavailable: {e}"));
                }
            }
        }

        if let Some(head) = state.queue.front().cloned() {
            let request = QuestionRequest::from(&head);
            match loader::fetch_with_timeout(
                self.generator.as_ref(),
                &request,
                self.config.fetch_timeout,
            )
            .await
            {
                Ok(questions) => {
                    let (offset, count) = state.apply_batch(questions)?;
                    observer.on_slots_loaded(offset, count);
                }
                Err(e) => {
                    tracing::warn!("opening batch fetch failed: {e}");
                    let message = format!("still trying to load question {}: {e}", head.offset + 1);
                    observer.on_non_fatal_error(&message);
                    state.last_error = Some(message);
                }
            }
        }

        let id = Uuid::new_v4();
        let snapshot = SessionSnapshot::new(id, state.clone());
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!(session = %id, "initial save failed: {e}");
            state.last_error = Some(format!("save failed: {e}"));
        }

        tracing::info!(
            session = %id,
            mode = %state.config.mode,
            slots = state.config.total_slots,
            "session started"
        );
        Ok(self.spawn_session(id, state, observer))
    }

    /// Resume a suspended session from its persisted snapshot. The loader
    /// picks up the exact remaining queue; already-loaded slots are never
    /// re-fetched.
    pub async fn resume(
        &self,
        id: Uuid,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, EngineError> {
        let snapshot = self
            .store
            .load(id)
            .await?
            .ok_or(EngineError::SessionNotFound(id))?;
        if snapshot.state.status != SessionStatus::Running {
            return Err(EngineError::AlreadyFinished);
        }
        let mut state = snapshot.state;
        state.loader_failed = false;
        state.last_error = None;
        tracing::info!(
            session = %id,
            remaining_batches = state.queue.len(),
            seconds_remaining = state.seconds_remaining,
            "session resumed"
        );
        Ok(self.spawn_session(id, state, observer))
    }

    pub(crate) fn spawn_session(
        &self,
        id: Uuid,
        state: SessionState,
        observer: Arc<dyn SessionObserver>,
    ) -> SessionHandle {
        let inner = Arc::new(SessionInner {
            id,
            state: Mutex::new(state),
            generator: Arc::clone(&self.generator),
            store: Arc::clone(&self.store),
            observer,
            config: self.config.clone(),
            cancelled: AtomicBool::new(false),
            finalize_gate: tokio::sync::Mutex::new(()),
            performance: Mutex::new(None),
        });

        let tasks = vec![
            tokio::spawn(loader::run(Arc::clone(&inner))),
            tokio::spawn(run_timer(Arc::clone(&inner))),
            tokio::spawn(run_autosave(Arc::clone(&inner))),
        ];
        SessionHandle {
            inner,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// A running session, owned by exactly one caller.
pub struct SessionHandle {
    inner: Arc<SessionInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// A point-in-time copy of the session state, for display.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.lock().unwrap().clone()
    }

    /// The performance record, once the session finished.
    pub fn performance(&self) -> Option<ExamPerformance> {
        self.inner.performance.lock().unwrap().clone()
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.inner.state.lock().unwrap().seconds_remaining
    }

    /// Record an objective answer. Rejected once the session left
    /// `Running` or when the slot index is out of range.
    pub fn answer(&self, slot: usize, option: usize) -> Result<(), EngineError> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(EngineError::Cancelled);
        }
        let mut state = self.inner.state.lock().unwrap();
        if !state.is_running() {
            return Err(EngineError::NotRunning {
                status: state.status.to_string(),
            });
        }
        state.record_answer(slot, option)
    }

    /// Overwrite the essay text.
    pub fn set_essay_text(&self, text: impl Into<String>) -> Result<(), EngineError> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(EngineError::Cancelled);
        }
        let mut state = self.inner.state.lock().unwrap();
        if !state.is_running() {
            return Err(EngineError::NotRunning {
                status: state.status.to_string(),
            });
        }
        state.set_essay_text(text);
        Ok(())
    }

    /// Persist the session immediately and stop its background tasks so it
    /// can be resumed later. Store failures are surfaced to the caller.
    pub async fn save_and_exit(&self) -> Result<(), EngineError> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(EngineError::Cancelled);
        }
        let snapshot = {
            let state = self.inner.state.lock().unwrap();
            if !state.is_running() {
                return Err(EngineError::NotRunning {
                    status: state.status.to_string(),
                });
            }
            SessionSnapshot::new(self.inner.id, state.clone())
        };
        self.inner.store.save(&snapshot).await?;
        self.abort_tasks();
        tracing::info!(session = %self.inner.id, "session suspended");
        Ok(())
    }

    /// Finalize now. Idempotent: a second call returns the same record
    /// without re-invoking the grading or estimation collaborators.
    pub async fn finalize(&self) -> Result<ExamPerformance, EngineError> {
        finalize_session(&self.inner).await
    }

    /// Hard abort: discard in-memory state, delete the persisted record.
    /// Any fetch still in flight is discarded when it lands.
    pub async fn cancel(&self) -> Result<(), EngineError> {
        {
            let state = self.inner.state.lock().unwrap();
            if state.status == SessionStatus::Finished {
                return Err(EngineError::AlreadyFinished);
            }
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.abort_tasks();
        self.inner.store.delete(self.inner.id).await?;
        tracing::info!(session = %self.inner.id, "session cancelled, record deleted");
        Ok(())
    }

    fn abort_tasks(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

/// Finalize a session exactly once.
///
/// The gate serializes concurrent finalize calls (user-triggered and
/// timer-triggered); the slot array and answer map are snapshotted under
/// the state lock *after* the transition to `Finalizing`, so no background
/// write can land between the snapshot and the scoring reads.
pub(crate) async fn finalize_session(
    inner: &Arc<SessionInner>,
) -> Result<ExamPerformance, EngineError> {
    let _gate = inner.finalize_gate.lock().await;

    if inner.cancelled.load(Ordering::SeqCst) {
        return Err(EngineError::Cancelled);
    }
    if let Some(performance) = inner.performance.lock().unwrap().clone() {
        return Ok(performance);
    }

    let (config, slots, answers, essay_text, essay_prompt) = {
        let mut state = inner.state.lock().unwrap();
        if !state.begin_finalize() {
            return Err(EngineError::NotRunning {
                status: state.status.to_string(),
            });
        }
        (
            state.config.clone(),
            state.slots.clone(),
            state.answers.clone(),
            state.essay_text.clone(),
            state.essay_prompt.clone(),
        )
    };

    let performance = score_session(
        &config,
        &slots,
        &answers,
        &essay_text,
        essay_prompt.as_ref(),
        inner.generator.as_ref(),
    )
    .await;

    // Cancel may have landed while the collaborators ran; the record was
    // already deleted and must not be written back.
    if inner.cancelled.load(Ordering::SeqCst) {
        return Err(EngineError::Cancelled);
    }

    let snapshot = {
        let mut state = inner.state.lock().unwrap();
        state.mark_finished();
        let mut snapshot = SessionSnapshot::new(inner.id, state.clone());
        snapshot.performance = Some(performance.clone());
        snapshot
    };
    *inner.performance.lock().unwrap() = Some(performance.clone());

    if let Err(e) = inner.store.save(&snapshot).await {
        tracing::warn!(session = %inner.id, "failed to persist final record: {e}");
        inner.state.lock().unwrap().last_error = Some(format!("save failed: {e}"));
    }

    inner.observer.on_finished(&performance);
    tracing::info!(
        session = %inner.id,
        aggregate = performance.aggregate,
        correct = performance.correct_count,
        "session finished"
    );
    Ok(performance)
}

/// Once-per-second countdown. Only runs while the session status is
/// `Running`, so it never advances during the foreground start-up load or
/// during finalize. Reaching zero forces finalize exactly once.
async fn run_timer(inner: Arc<SessionInner>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // The first tick of a tokio interval completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        if inner.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let remaining = {
            let mut state = inner.state.lock().unwrap();
            if !state.is_running() {
                return;
            }
            state.tick()
        };
        inner.observer.on_tick(remaining);
        if remaining == 0 {
            if let Err(e) = finalize_session(&inner).await {
                tracing::warn!(session = %inner.id, "timer-forced finalize failed: {e}");
            }
            return;
        }
    }
}

/// Periodic full-state snapshot to the session store. A failed save is
/// recorded and reported but never interrupts the exam.
async fn run_autosave(inner: Arc<SessionInner>) {
    let mut interval = tokio::time::interval(inner.config.autosave_interval);
    interval.tick().await;
    loop {
        interval.tick().await;
        if inner.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let snapshot = {
            let state = inner.state.lock().unwrap();
            if !state.is_running() {
                return;
            }
            SessionSnapshot::new(inner.id, state.clone())
        };
        if let Err(e) = inner.store.save(&snapshot).await {
            tracing::warn!(session = %inner.id, "autosave failed: {e}");
            let message = format!("autosave failed: {e}");
            inner.observer.on_non_fatal_error(&message);
            inner.state.lock().unwrap().last_error = Some(message);
        } else {
            tracing::debug!(session = %inner.id, "autosaved");
        }
    }
}
