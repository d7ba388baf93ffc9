//! The `simulado init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("simulado.toml").exists() {
        println!("simulado.toml already exists, skipping.");
    } else {
        std::fs::write("simulado.toml", SAMPLE_CONFIG)?;
        println!("Created simulado.toml");
    }

    println!("\nNext steps:");
    println!("  1. Set SIMULADO_OPENAI_KEY (or edit simulado.toml)");
    println!("  2. Run: simulado run --mode full-day-a");
    println!("  3. Or try it offline: simulado run --mock");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# simulado configuration

sessions_dir = "./simulado-sessions"
autosave_interval_secs = 30
fetch_timeout_secs = 30
max_fetch_retries = 5
retry_delay_ms = 1000
review_slots = 10
review_duration_secs = 900

# Courses whose SISU cutoffs every report compares against.
target_courses = []

[generator]
type = "openai"
api_key = "${SIMULADO_OPENAI_KEY}"
# model = "gpt-4.1-mini"
"#;
