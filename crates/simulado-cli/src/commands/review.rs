//! The `simulado review` command: turbo review over a finished session's
//! weak topics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use simulado_core::traits::SessionStore;
use simulado_providers::{create_store, load_config_from};

use super::interactive::{build_engine, drive, ConsoleObserver};

pub async fn execute(session: Uuid, mock: bool, config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_config_from(config_path.as_deref())?;

    let store = create_store(&settings);
    let snapshot = store
        .load(session)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no such session: {session}"))?;
    let performance = snapshot
        .performance
        .ok_or_else(|| anyhow::anyhow!("session {session} has not finished yet"))?;
    anyhow::ensure!(
        !performance.weak_topics.is_empty(),
        "session {session} has no weak topics to review"
    );

    let engine = build_engine(&settings, mock)?;
    eprintln!(
        "Reviewing {} weak topics: {}",
        performance.weak_topics.len(),
        performance.weak_topics.join(", ")
    );

    let handle = engine
        .start_review(&performance, Arc::new(ConsoleObserver))
        .await?;
    drive(handle).await
}
