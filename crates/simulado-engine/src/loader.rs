//! Background batch loader.
//!
//! Drains the session's batch queue strictly in FIFO order, one request in
//! flight at a time. Each fetch runs under a hard timeout; failures back
//! off exponentially until the per-batch retry ceiling, after which the
//! loader marks the session and stops. Already-loaded slots are never
//! written twice because a request only leaves the queue on success.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use simulado_core::error::GeneratorError;
use simulado_core::model::Question;
use simulado_core::session::BatchRequest;
use simulado_core::traits::{ContentGenerator, QuestionRequest};

use crate::session::SessionInner;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Run a single fetch with the engine's hard timeout. An elapsed timeout
/// is reported as a retryable `GeneratorError::Timeout`; a batch of the
/// wrong size as a retryable `InvalidResponse`.
pub(crate) async fn fetch_with_timeout(
    generator: &dyn ContentGenerator,
    request: &QuestionRequest,
    timeout: Duration,
) -> Result<Vec<Question>, GeneratorError> {
    let questions = match tokio::time::timeout(timeout, generator.fetch_questions(request)).await {
        Ok(result) => result?,
        Err(_) => return Err(GeneratorError::Timeout(timeout.as_secs())),
    };
    if questions.len() != request.count {
        return Err(GeneratorError::InvalidResponse(format!(
            "expected {} questions, got {}",
            request.count,
            questions.len()
        )));
    }
    Ok(questions)
}

fn peek_head(inner: &SessionInner) -> Option<BatchRequest> {
    let state = inner.state.lock().unwrap();
    if !state.is_running() {
        return None;
    }
    state.queue.front().cloned()
}

/// The loader task. Exits when the queue drains, the session leaves
/// `Running`, the session is cancelled, or the retry ceiling is hit.
pub(crate) async fn run(inner: Arc<SessionInner>) {
    loop {
        if inner.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let Some(head) = peek_head(&inner) else {
            tracing::debug!(session = %inner.id, "loader done");
            return;
        };
        let request = QuestionRequest::from(&head);

        let mut attempts: u32 = 0;
        let mut delay = inner.config.retry_delay;
        loop {
            let result = fetch_with_timeout(
                inner.generator.as_ref(),
                &request,
                inner.config.fetch_timeout,
            )
            .await;

            // A fetch that lands after cancel is discarded outright.
            if inner.cancelled.load(Ordering::SeqCst) {
                return;
            }

            match result {
                Ok(questions) => {
                    let applied = {
                        let mut state = inner.state.lock().unwrap();
                        if !state.is_running() {
                            return;
                        }
                        state.apply_batch(questions)
                    };
                    match applied {
                        Ok((offset, count)) => {
                            tracing::debug!(
                                session = %inner.id,
                                offset,
                                count,
                                area = %head.area,
                                "batch loaded"
                            );
                            inner.observer.on_slots_loaded(offset, count);
                        }
                        Err(e) => {
                            tracing::warn!(session = %inner.id, "batch apply failed: {e}");
                            return;
                        }
                    }
                    break;
                }
                Err(e) => {
                    attempts += 1;
                    let permanent = e.is_permanent();
                    let message = format!(
                        "loading questions {}-{} failed (attempt {attempts}): {e}",
                        head.offset + 1,
                        head.offset + head.count
                    );
                    tracing::warn!(session = %inner.id, "{message}");
                    {
                        let mut state = inner.state.lock().unwrap();
                        state.last_error = Some(message.clone());
                    }
                    inner.observer.on_non_fatal_error(&message);

                    if permanent || attempts > inner.config.max_fetch_retries {
                        let mut state = inner.state.lock().unwrap();
                        state.loader_failed = true;
                        tracing::error!(
                            session = %inner.id,
                            attempts,
                            permanent,
                            "loader giving up; remaining slots stay pending"
                        );
                        return;
                    }

                    // Honor a server-provided retry hint over the backoff.
                    let wait = e
                        .retry_after_ms()
                        .map(Duration::from_millis)
                        .unwrap_or(delay);
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }
}
