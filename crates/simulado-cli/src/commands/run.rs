//! The `simulado run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use simulado_core::model::{Area, ExamConfig, ExamMode, ForeignLanguage};
use simulado_providers::load_config_from;

use super::interactive::{build_engine, drive, ConsoleObserver};

/// Default slot counts and durations per mode, applied when the flags are
/// not given. The full-day numbers match the real exam (90 questions in
/// 5h30).
fn mode_defaults(mode: ExamMode) -> (usize, u64) {
    match mode {
        ExamMode::FullDayA | ExamMode::FullDayB => (90, 19_800),
        ExamMode::AreaTraining => (30, 7_200),
        ExamMode::EssayOnly => (0, 3_600),
        ExamMode::Remediation => (10, 900),
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    mode: ExamMode,
    slots: Option<usize>,
    duration_secs: Option<u64>,
    language: Option<ForeignLanguage>,
    area: Option<Area>,
    courses: Option<String>,
    topics: Option<String>,
    mock: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let settings = load_config_from(config_path.as_deref())?;

    let (default_slots, default_duration) = mode_defaults(mode);
    let total_slots = slots.unwrap_or(default_slots);
    let duration_secs = duration_secs.unwrap_or(default_duration);

    let mut exam = match mode {
        ExamMode::FullDayA => ExamConfig::full_day_a(total_slots, duration_secs, language),
        ExamMode::FullDayB => ExamConfig::full_day_b(total_slots, duration_secs),
        ExamMode::Remediation => {
            ExamConfig::remediation(split_list(topics), total_slots, duration_secs)
        }
        ExamMode::AreaTraining => ExamConfig {
            mode,
            target_courses: Vec::new(),
            areas: vec![area.unwrap_or(Area::Mathematics)],
            duration_secs,
            total_slots,
            language: None,
            focus_topics: Vec::new(),
        },
        ExamMode::EssayOnly => ExamConfig {
            mode,
            target_courses: Vec::new(),
            areas: Vec::new(),
            duration_secs,
            total_slots,
            language: None,
            focus_topics: Vec::new(),
        },
    };
    exam.target_courses = split_list(courses);
    if exam.target_courses.is_empty() {
        exam.target_courses = settings.target_courses.clone();
    }

    let engine = build_engine(&settings, mock)?;
    tracing::info!(mode = %exam.mode, slots = exam.total_slots, "starting session");
    eprintln!(
        "Starting a {} session: {} questions, {} minutes.",
        exam.mode,
        exam.total_slots,
        exam.duration_secs / 60
    );

    let handle = engine.start(exam, Arc::new(ConsoleObserver)).await?;
    drive(handle).await
}
