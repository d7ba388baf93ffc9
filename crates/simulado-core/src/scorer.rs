//! Final scoring: aggregates objective answers, essay grading, and cutoff
//! estimates into one immutable performance record.
//!
//! The objective part is pure; the essay and cutoff calls go out to the
//! content generator and any failure there degrades to an absent field —
//! finalize itself always completes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    Area, CutoffComparison, EssayPrompt, EssayResult, ExamConfig, QuestionSlot,
};
use crate::traits::ContentGenerator;

/// Floor of the simplified TRI-like scale.
pub const SCALE_FLOOR: f64 = 300.0;

/// Span of the simplified TRI-like scale above the floor.
pub const SCALE_SPAN: f64 = 600.0;

/// Minimum essay length, in characters, sent out for grading. Shorter
/// essays yield an absent essay result.
pub const MIN_ESSAY_CHARS: usize = 100;

/// Score of one knowledge area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaScore {
    pub area: Area,
    /// `300 + correct/loaded × 600`.
    pub score: f64,
    pub correct: usize,
    /// Loaded questions in this area. Slots that never arrived are not
    /// counted here.
    pub loaded: usize,
}

/// The immutable record produced once, at finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamPerformance {
    /// One entry per area that had at least one loaded question, in slot
    /// order.
    pub area_scores: Vec<AreaScore>,
    /// Arithmetic mean of section values: each objective area contributes
    /// one value and the essay, when graded, one more. Sections weigh
    /// equally no matter how many questions they had.
    pub aggregate: f64,
    pub correct_count: usize,
    /// Loaded objective questions across all areas.
    pub total_loaded: usize,
    pub essay: Option<EssayResult>,
    pub cutoffs: Option<Vec<CutoffComparison>>,
    /// Topics of loaded questions answered wrongly or left blank,
    /// deduplicated in first-seen order.
    pub weak_topics: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

/// Objective-section breakdown, computed without any external calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveBreakdown {
    pub area_scores: Vec<AreaScore>,
    pub correct_count: usize,
    pub total_loaded: usize,
    pub weak_topics: Vec<String>,
}

/// Score the objective sections of a slot/answer snapshot.
///
/// Unloaded slots are excluded from their area's denominator entirely;
/// loaded-but-unanswered slots stay in the denominator without counting as
/// correct. The asymmetry is deliberate.
pub fn score_objective(
    slots: &[QuestionSlot],
    answers: &BTreeMap<usize, usize>,
) -> ObjectiveBreakdown {
    let mut tallies: Vec<(Area, usize, usize)> = Vec::new();
    let mut weak_topics: Vec<String> = Vec::new();

    for (index, slot) in slots.iter().enumerate() {
        let Some(question) = slot.question() else {
            continue;
        };
        let tally = match tallies.iter_mut().find(|(a, _, _)| *a == question.area) {
            Some(t) => t,
            None => {
                tallies.push((question.area, 0, 0));
                tallies.last_mut().unwrap()
            }
        };
        tally.1 += 1;
        let correct = answers.get(&index) == Some(&question.correct_index);
        if correct {
            tally.2 += 1;
        } else if !weak_topics.contains(&question.topic) {
            weak_topics.push(question.topic.clone());
        }
    }

    let area_scores: Vec<AreaScore> = tallies
        .iter()
        .map(|&(area, loaded, correct)| AreaScore {
            area,
            score: SCALE_FLOOR + (correct as f64 / loaded as f64) * SCALE_SPAN,
            correct,
            loaded,
        })
        .collect();

    ObjectiveBreakdown {
        correct_count: tallies.iter().map(|t| t.2).sum(),
        total_loaded: tallies.iter().map(|t| t.1).sum(),
        area_scores,
        weak_topics,
    }
}

/// Compute the final performance record.
///
/// Called exactly once per session, after the status transitioned to
/// finalizing; `slots` and `answers` must be a snapshot taken under the
/// session lock so background writes cannot race the reads here. The essay
/// grading and cutoff estimation calls run concurrently; either failing
/// leaves its field absent.
pub async fn score_session(
    config: &ExamConfig,
    slots: &[QuestionSlot],
    answers: &BTreeMap<usize, usize>,
    essay_text: &str,
    essay_prompt: Option<&EssayPrompt>,
    generator: &dyn ContentGenerator,
) -> ExamPerformance {
    let objective = score_objective(slots, answers);

    let essay_fut = async {
        if !config.mode.has_essay() || essay_text.chars().count() < MIN_ESSAY_CHARS {
            return None;
        }
        match generator.grade_essay(essay_text, essay_prompt).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!("essay grading failed, result omitted: {e}");
                None
            }
        }
    };

    let cutoffs_fut = async {
        if config.target_courses.is_empty() {
            return None;
        }
        match generator.estimate_cutoffs(&config.target_courses).await {
            Ok(estimates) => Some(estimates),
            Err(e) => {
                tracing::warn!("cutoff estimation failed, comparisons omitted: {e}");
                None
            }
        }
    };

    let (essay, estimates) = futures::join!(essay_fut, cutoffs_fut);

    let mut sections: Vec<f64> = objective.area_scores.iter().map(|a| a.score).collect();
    if let Some(result) = &essay {
        sections.push(f64::from(result.total));
    }
    let aggregate = if sections.is_empty() {
        0.0
    } else {
        sections.iter().sum::<f64>() / sections.len() as f64
    };

    let cutoffs = estimates.map(|list| {
        list.into_iter()
            .map(|estimate| CutoffComparison {
                admitted: aggregate >= estimate.cutoff,
                achieved: aggregate,
                course: estimate.course,
                cutoff: estimate.cutoff,
            })
            .collect()
    });

    ExamPerformance {
        area_scores: objective.area_scores,
        aggregate,
        correct_count: objective.correct_count,
        total_loaded: objective.total_loaded,
        essay,
        cutoffs,
        weak_topics: objective.weak_topics,
        finished_at: Utc::now(),
    }
}
