//! The `simulado resume` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use simulado_providers::load_config_from;

use super::interactive::{build_engine, drive, ConsoleObserver};

pub async fn execute(session: Uuid, mock: bool, config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_config_from(config_path.as_deref())?;
    let engine = build_engine(&settings, mock)?;

    let handle = engine.resume(session, Arc::new(ConsoleObserver)).await?;
    let state = handle.snapshot();
    eprintln!(
        "Resumed session {}: {}/{} questions loaded, {} answered, {}m{:02}s remaining.",
        session,
        state.loaded_count(),
        state.slots.len(),
        state.answers.len(),
        state.seconds_remaining / 60,
        state.seconds_remaining % 60,
    );
    drive(handle).await
}
