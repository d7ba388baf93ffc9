//! Batch planning: turns an exam configuration into the ordered list of
//! content-fetch requests that covers every question slot exactly once.
//!
//! The planner is pure and deterministic; resuming a session never
//! replans, it just keeps draining the persisted queue.

use crate::model::{Area, ExamConfig, ExamMode, ForeignLanguage};
use crate::session::BatchRequest;

/// Size of the opening request of each area. Kept at one question so the
/// user can start answering with minimal latency.
pub const PROBE_BATCH: usize = 1;

/// Batch size for every request after an area's probe.
pub const FULL_BATCH: usize = 3;

/// Slots at the head of the first area reserved for the foreign-language
/// micro-section when a language is configured.
pub const FOREIGN_SECTION_SLOTS: usize = 5;

/// Build the ordered batch queue for a config.
///
/// Slots are split contiguously across the configured areas in order; each
/// area opens with a single-question probe and continues in fixed-size
/// chunks. Remediation collapses everything into one general bucket where
/// every request carries the topic filter.
pub fn plan_batches(config: &ExamConfig) -> Vec<BatchRequest> {
    if config.total_slots == 0 {
        return Vec::new();
    }

    match config.mode {
        ExamMode::Remediation => chunked_run(
            Area::General,
            0,
            config.total_slots,
            None,
            Some(config.focus_topics.clone()),
            true,
        ),
        ExamMode::FullDayA | ExamMode::FullDayB | ExamMode::AreaTraining | ExamMode::EssayOnly => {
            let mut requests = Vec::new();
            let mut offset = 0;
            for (idx, (area, len)) in area_spans(config).into_iter().enumerate() {
                let language = if idx == 0 { config.language } else { None };
                requests.extend(plan_area(area, offset, len, language));
                offset += len;
            }
            requests
        }
    }
}

/// Contiguous `(area, slot count)` spans in config order. The total is
/// split evenly, remainder going to the earlier areas.
fn area_spans(config: &ExamConfig) -> Vec<(Area, usize)> {
    if config.areas.is_empty() {
        return vec![(Area::General, config.total_slots)];
    }
    let n = config.areas.len();
    let base = config.total_slots / n;
    let remainder = config.total_slots % n;
    config
        .areas
        .iter()
        .enumerate()
        .map(|(i, area)| (*area, base + usize::from(i < remainder)))
        .collect()
}

/// Plan one area: language micro-section first (when configured), then the
/// remainder. Chunk boundaries never straddle the micro-section edge.
fn plan_area(
    area: Area,
    offset: usize,
    len: usize,
    language: Option<ForeignLanguage>,
) -> Vec<BatchRequest> {
    match language {
        Some(_) => {
            let foreign_len = FOREIGN_SECTION_SLOTS.min(len);
            let mut requests = chunked_run(area, offset, foreign_len, language, None, true);
            requests.extend(chunked_run(
                area,
                offset + foreign_len,
                len - foreign_len,
                None,
                None,
                false,
            ));
            requests
        }
        None => chunked_run(area, offset, len, None, None, true),
    }
}

/// Emit requests covering `[offset, offset + len)`: an optional probe of
/// one question followed by `FULL_BATCH`-sized chunks (final chunk may be
/// smaller).
fn chunked_run(
    area: Area,
    offset: usize,
    len: usize,
    language: Option<ForeignLanguage>,
    topic_filter: Option<Vec<String>>,
    with_probe: bool,
) -> Vec<BatchRequest> {
    let mut requests = Vec::new();
    let end = offset + len;
    let mut pos = offset;
    if len == 0 {
        return requests;
    }
    if with_probe {
        requests.push(BatchRequest {
            area,
            count: PROBE_BATCH,
            offset: pos,
            language,
            topic_filter: topic_filter.clone(),
        });
        pos += PROBE_BATCH;
    }
    while pos < end {
        let count = FULL_BATCH.min(end - pos);
        requests.push(BatchRequest {
            area,
            count,
            offset: pos,
            language,
            topic_filter: topic_filter.clone(),
        });
        pos += count;
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExamConfig;

    /// Requests must tile `[0, total_slots)` exactly once, in offset order.
    fn assert_covers_exactly(requests: &[BatchRequest], total_slots: usize) {
        let mut expected_offset = 0;
        for request in requests {
            assert_eq!(
                request.offset, expected_offset,
                "gap or overlap at offset {expected_offset}"
            );
            assert!(request.count > 0);
            expected_offset += request.count;
        }
        assert_eq!(expected_offset, total_slots);
    }

    #[test]
    fn full_day_covers_all_slots_without_gaps() {
        let config = ExamConfig::full_day_a(90, 19_800, Some(ForeignLanguage::English));
        let requests = plan_batches(&config);
        assert_covers_exactly(&requests, 90);
    }

    #[test]
    fn first_request_per_area_is_minimal() {
        let config = ExamConfig::full_day_b(90, 18_000);
        let requests = plan_batches(&config);
        assert_covers_exactly(&requests, 90);

        for area in &config.areas {
            let first = requests.iter().find(|r| r.area == *area).unwrap();
            assert_eq!(first.count, PROBE_BATCH, "area {area} probe");
        }
        // Everything after an area's probe uses the full batch size,
        // except possibly the area's last chunk.
        for area in &config.areas {
            let of_area: Vec<_> = requests.iter().filter(|r| r.area == *area).collect();
            for r in &of_area[1..of_area.len() - 1] {
                assert_eq!(r.count, FULL_BATCH);
            }
        }
    }

    #[test]
    fn language_probe_opens_the_plan() {
        let config = ExamConfig::full_day_a(90, 19_800, Some(ForeignLanguage::Spanish));
        let requests = plan_batches(&config);

        let first = &requests[0];
        assert_eq!(first.count, PROBE_BATCH);
        assert_eq!(first.offset, 0);
        assert_eq!(first.language, Some(ForeignLanguage::Spanish));

        // Exactly the micro-section carries the language tag.
        let tagged: usize = requests
            .iter()
            .filter(|r| r.language.is_some())
            .map(|r| r.count)
            .sum();
        assert_eq!(tagged, FOREIGN_SECTION_SLOTS);

        // The second area never carries the tag.
        assert!(requests
            .iter()
            .filter(|r| r.area == Area::Humanities)
            .all(|r| r.language.is_none()));
    }

    #[test]
    fn no_language_means_no_tagged_requests() {
        let config = ExamConfig::full_day_a(90, 19_800, None);
        assert!(plan_batches(&config).iter().all(|r| r.language.is_none()));
    }

    #[test]
    fn remediation_collapses_to_general_with_topic_filter() {
        let topics = vec!["thermodynamics".into(), "fractions".into()];
        let config = ExamConfig::remediation(topics.clone(), 10, 900);
        let requests = plan_batches(&config);
        assert_covers_exactly(&requests, 10);

        for request in &requests {
            assert_eq!(request.area, Area::General);
            assert_eq!(request.topic_filter.as_deref(), Some(topics.as_slice()));
        }
        assert_eq!(requests[0].count, PROBE_BATCH);
    }

    #[test]
    fn uneven_split_gives_remainder_to_earlier_areas() {
        let mut config = ExamConfig::full_day_b(91, 18_000);
        config.areas = vec![Area::NaturalSciences, Area::Mathematics];
        let requests = plan_batches(&config);
        assert_covers_exactly(&requests, 91);

        let sciences: usize = requests
            .iter()
            .filter(|r| r.area == Area::NaturalSciences)
            .map(|r| r.count)
            .sum();
        assert_eq!(sciences, 46);
    }

    #[test]
    fn single_slot_config_is_one_probe() {
        let mut config = ExamConfig::full_day_b(1, 600);
        config.areas = vec![Area::Mathematics];
        let requests = plan_batches(&config);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].count, 1);
        assert_eq!(requests[0].offset, 0);
    }

    #[test]
    fn zero_slots_plans_nothing() {
        let config = ExamConfig {
            mode: ExamMode::EssayOnly,
            target_courses: Vec::new(),
            areas: Vec::new(),
            duration_secs: 3600,
            total_slots: 0,
            language: None,
            focus_topics: Vec::new(),
        };
        assert!(plan_batches(&config).is_empty());
    }

    #[test]
    fn planning_is_deterministic() {
        let config = ExamConfig::full_day_a(45, 9000, Some(ForeignLanguage::English));
        assert_eq!(plan_batches(&config), plan_batches(&config));
    }
}
