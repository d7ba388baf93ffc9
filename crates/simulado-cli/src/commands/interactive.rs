//! Shared pieces of the interactive exam loop used by `run`, `resume`,
//! and `review`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};
use tokio::io::AsyncBufReadExt;

use simulado_core::model::{EssayPrompt, QuestionSlot};
use simulado_core::scorer::ExamPerformance;
use simulado_core::traits::ContentGenerator;
use simulado_engine::{EngineConfig, ExamEngine, SessionHandle, SessionObserver};
use simulado_providers::{create_generator, create_store, MockGenerator, SimuladoConfig};

/// Build the engine from the loaded settings; `--mock` swaps the real
/// generator for the deterministic offline one.
pub fn build_engine(settings: &SimuladoConfig, mock: bool) -> Result<ExamEngine> {
    let generator: Arc<dyn ContentGenerator> = if mock {
        Arc::new(MockGenerator::new())
    } else {
        create_generator(&settings.generator)?
    };
    let store = create_store(settings);
    let engine_config = EngineConfig {
        autosave_interval: Duration::from_secs(settings.autosave_interval_secs),
        fetch_timeout: Duration::from_secs(settings.fetch_timeout_secs),
        max_fetch_retries: settings.max_fetch_retries,
        retry_delay: Duration::from_millis(settings.retry_delay_ms),
        review_slots: settings.review_slots,
        review_duration_secs: settings.review_duration_secs,
    };
    Ok(ExamEngine::new(generator, store, engine_config))
}

/// Console session observer.
pub struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_slots_loaded(&self, offset: usize, count: usize) {
        eprintln!("  Loaded questions {}-{}", offset + 1, offset + count);
    }

    fn on_essay_prompt(&self, prompt: &EssayPrompt) {
        eprintln!("  Essay theme: {}", prompt.theme);
    }

    fn on_tick(&self, seconds_remaining: u64) {
        if seconds_remaining > 0 && seconds_remaining % 600 == 0 {
            eprintln!("  {} minutes remaining", seconds_remaining / 60);
        } else if seconds_remaining == 60 {
            eprintln!("  One minute remaining!");
        }
    }

    fn on_non_fatal_error(&self, message: &str) {
        eprintln!("  Warning: {message}");
    }

    fn on_finished(&self, performance: &ExamPerformance) {
        eprintln!("  Time is up. Aggregate score: {:.0}", performance.aggregate);
    }
}

/// Drive a session from stdin until it finishes, is saved, or is
/// cancelled. Closing stdin suspends the session.
pub async fn drive(handle: SessionHandle) -> Result<()> {
    eprintln!(
        "Session {}. Commands: show <n> | answer <n> <a-e> | essay [text] | status | finish | save | cancel",
        handle.id()
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        // The timer may have finished the session while we waited.
        if let Some(performance) = handle.performance() {
            print_performance(&performance);
            return Ok(());
        }

        let Some(line) = lines.next_line().await? else {
            return suspend(&handle).await;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, ' ');
        let command = parts.next().unwrap_or_default();

        match command {
            "show" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(number) if number >= 1 => show_question(&handle, number - 1),
                _ => eprintln!("usage: show <question number>"),
            },
            "answer" => {
                let number = parts.next().and_then(|n| n.parse::<usize>().ok());
                let option = parts.next().and_then(parse_option);
                match (number, option) {
                    (Some(number), Some(option)) if number >= 1 => {
                        match handle.answer(number - 1, option) {
                            Ok(()) => eprintln!("  Recorded answer for question {number}"),
                            Err(e) => eprintln!("  {e}"),
                        }
                    }
                    _ => eprintln!("usage: answer <question number> <a-e>"),
                }
            }
            "essay" => {
                let rest = line.strip_prefix("essay").unwrap_or_default().trim();
                if rest.is_empty() {
                    show_essay_prompt(&handle);
                } else if let Err(e) = handle.set_essay_text(rest) {
                    eprintln!("  {e}");
                }
            }
            "status" => print_status(&handle),
            "finish" => {
                let performance = handle.finalize().await?;
                print_performance(&performance);
                return Ok(());
            }
            "save" => {
                return suspend(&handle).await;
            }
            "cancel" => {
                handle.cancel().await?;
                eprintln!("Session cancelled and deleted.");
                return Ok(());
            }
            _ => eprintln!(
                "commands: show <n> | answer <n> <a-e> | essay [text] | status | finish | save | cancel"
            ),
        }
    }
}

async fn suspend(handle: &SessionHandle) -> Result<()> {
    match handle.save_and_exit().await {
        Ok(()) => {
            eprintln!(
                "Session saved. Resume it with: simulado resume --session {}",
                handle.id()
            );
            Ok(())
        }
        // The timer beat us to the end of the session.
        Err(e) => {
            if let Some(performance) = handle.performance() {
                print_performance(&performance);
                Ok(())
            } else {
                Err(e.into())
            }
        }
    }
}

fn parse_option(token: &str) -> Option<usize> {
    match token.trim().to_lowercase().as_str() {
        "a" => Some(0),
        "b" => Some(1),
        "c" => Some(2),
        "d" => Some(3),
        "e" => Some(4),
        _ => None,
    }
}

fn show_question(handle: &SessionHandle, slot: usize) {
    let state = handle.snapshot();
    match state.slots.get(slot) {
        Some(QuestionSlot::Loaded { question }) => {
            eprintln!("\nQuestion {} [{}]", slot + 1, question.topic);
            eprintln!("{}", question.prompt);
            for (i, option) in question.options.iter().enumerate() {
                let letter = (b'a' + i as u8) as char;
                eprintln!("  {letter}) {option}");
            }
            if let Some(answer) = state.answers.get(&slot) {
                let letter = (b'a' + *answer as u8) as char;
                eprintln!("  (your answer: {letter})");
            }
        }
        Some(QuestionSlot::Pending) => eprintln!("  Question {} is still loading.", slot + 1),
        None => eprintln!(
            "  No question {}; this session has {} slots.",
            slot + 1,
            state.slots.len()
        ),
    }
}

fn show_essay_prompt(handle: &SessionHandle) {
    let state = handle.snapshot();
    match &state.essay_prompt {
        Some(prompt) => {
            eprintln!("\nEssay theme: {}", prompt.theme);
            if !prompt.supporting_text.is_empty() {
                eprintln!("{}", prompt.supporting_text);
            }
            eprintln!("({} characters written so far)", state.essay_text.chars().count());
        }
        None => eprintln!("  This session has no essay."),
    }
}

fn print_status(handle: &SessionHandle) {
    let state = handle.snapshot();
    eprintln!(
        "  {}/{} questions loaded, {} answered, {}m{:02}s remaining",
        state.loaded_count(),
        state.slots.len(),
        state.answers.len(),
        state.seconds_remaining / 60,
        state.seconds_remaining % 60,
    );
    if state.loader_failed {
        eprintln!("  Question loading stopped; unloaded questions will not count.");
    } else if let Some(error) = &state.last_error {
        eprintln!("  Last warning: {error}");
    }
}

/// Print the final performance record.
pub fn print_performance(performance: &ExamPerformance) {
    let mut table = Table::new();
    table.set_header(vec!["Area", "Score", "Correct", "Questions"]);
    for area in &performance.area_scores {
        table.add_row(vec![
            Cell::new(area.area),
            Cell::new(format!("{:.0}", area.score)),
            Cell::new(area.correct),
            Cell::new(area.loaded),
        ]);
    }
    eprintln!("\n{table}");

    if let Some(essay) = &performance.essay {
        eprintln!("Essay: {}/1000", essay.total);
        if !essay.feedback.is_empty() {
            eprintln!("  {}", essay.feedback);
        }
    }

    eprintln!(
        "Aggregate: {:.0} ({}/{} objective questions correct)",
        performance.aggregate, performance.correct_count, performance.total_loaded
    );

    if let Some(cutoffs) = &performance.cutoffs {
        let mut table = Table::new();
        table.set_header(vec!["Course", "Cutoff", "Result"]);
        for comparison in cutoffs {
            table.add_row(vec![
                Cell::new(&comparison.course),
                Cell::new(format!("{:.0}", comparison.cutoff)),
                Cell::new(if comparison.admitted {
                    "admitted"
                } else {
                    "below cutoff"
                }),
            ]);
        }
        eprintln!("\n{table}");
    }

    if !performance.weak_topics.is_empty() {
        eprintln!("\nTopics to review: {}", performance.weak_topics.join(", "));
        eprintln!("Drill them with: simulado review --session <id>");
    }
}
