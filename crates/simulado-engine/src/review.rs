//! Turbo review: a short remediation session seeded from a finished
//! session's weak topics.

use std::sync::Arc;

use simulado_core::error::EngineError;
use simulado_core::model::ExamConfig;
use simulado_core::scorer::ExamPerformance;

use crate::session::{ExamEngine, SessionHandle, SessionObserver};

/// Build the remediation config for a finished performance record. The
/// topic list keeps the performance's first-seen order.
pub fn remediation_config(
    performance: &ExamPerformance,
    slots: usize,
    duration_secs: u64,
) -> ExamConfig {
    ExamConfig::remediation(performance.weak_topics.clone(), slots, duration_secs)
}

impl ExamEngine {
    /// Start a turbo review session targeting the weak topics of a
    /// finished session. Fails with `InvalidConfig` when the performance
    /// has no weak topics to drill.
    pub async fn start_review(
        &self,
        performance: &ExamPerformance,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, EngineError> {
        let config = remediation_config(
            performance,
            self.config().review_slots,
            self.config().review_duration_secs,
        );
        tracing::info!(topics = config.focus_topics.len(), "starting turbo review");
        self.start(config, observer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use simulado_core::model::{Area, ExamMode};

    fn performance(weak_topics: Vec<String>) -> ExamPerformance {
        ExamPerformance {
            area_scores: Vec::new(),
            aggregate: 500.0,
            correct_count: 0,
            total_loaded: 0,
            essay: None,
            cutoffs: None,
            weak_topics,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn review_config_targets_the_general_bucket() {
        let perf = performance(vec!["fractions".into(), "ecology".into()]);
        let config = remediation_config(&perf, 10, 900);

        assert_eq!(config.mode, ExamMode::Remediation);
        assert_eq!(config.areas, vec![Area::General]);
        assert_eq!(config.total_slots, 10);
        assert_eq!(config.duration_secs, 900);
        assert_eq!(
            config.focus_topics,
            vec!["fractions".to_string(), "ecology".to_string()]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn review_without_weak_topics_fails_validation() {
        let config = remediation_config(&performance(Vec::new()), 10, 900);
        assert!(config.validate().is_err());
    }
}
