use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use simulado_core::model::{Area, ExamConfig, ForeignLanguage, Question, QuestionSlot};
use simulado_core::planner::plan_batches;
use simulado_core::scorer::score_objective;

fn loaded_slot(area: Area, index: usize) -> QuestionSlot {
    QuestionSlot::Loaded {
        question: Question {
            area,
            subject: "bench".into(),
            prompt: format!("question {index}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            correct_index: index % 5,
            topic: format!("topic-{}", index % 12),
            source: "bench".into(),
        },
    }
}

fn full_exam(total: usize) -> (Vec<QuestionSlot>, BTreeMap<usize, usize>) {
    let slots: Vec<QuestionSlot> = (0..total)
        .map(|i| {
            let area = if i < total / 2 {
                Area::Languages
            } else {
                Area::Humanities
            };
            loaded_slot(area, i)
        })
        .collect();
    // Half the answers correct, a quarter wrong, a quarter blank.
    let answers = (0..total)
        .filter(|i| i % 4 != 3)
        .map(|i| (i, if i % 4 == 2 { (i + 1) % 5 } else { i % 5 }))
        .collect();
    (slots, answers)
}

fn bench_plan_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_batches");

    let day1 = ExamConfig::full_day_a(90, 19_800, Some(ForeignLanguage::English));
    group.bench_function("full_day_a_90", |b| {
        b.iter(|| plan_batches(black_box(&day1)))
    });

    let review = ExamConfig::remediation(
        (0..10).map(|i| format!("topic-{i}")).collect(),
        10,
        900,
    );
    group.bench_function("remediation_10", |b| {
        b.iter(|| plan_batches(black_box(&review)))
    });

    group.finish();
}

fn bench_score_objective(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_objective");

    let (slots, answers) = full_exam(90);
    group.bench_function("90_questions", |b| {
        b.iter(|| score_objective(black_box(&slots), black_box(&answers)))
    });

    let (slots, answers) = full_exam(180);
    group.bench_function("180_questions", |b| {
        b.iter(|| score_objective(black_box(&slots), black_box(&answers)))
    });

    group.finish();
}

criterion_group!(benches, bench_plan_batches, bench_score_objective);
criterion_main!(benches);
